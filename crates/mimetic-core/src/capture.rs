//! Running accumulation over one expression's capture window.

use crate::expressions::Expression;
use crate::landmarks::{FaceLandmarks, LandmarkError};
use crate::result::{round_to, ResultRecord, Status};

/// Per-expression accumulator: frame count, activation count and the sum of
/// measurements, reduced to a [`ResultRecord`] when the window closes.
#[derive(Debug)]
pub struct ExpressionCapture {
    expression: &'static Expression,
    frames: usize,
    activated: usize,
    total_measure: f64,
}

impl ExpressionCapture {
    pub fn new(expression: &'static Expression) -> Self {
        Self {
            expression,
            frames: 0,
            activated: 0,
            total_measure: 0.0,
        }
    }

    pub fn expression(&self) -> &'static Expression {
        self.expression
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn activated(&self) -> usize {
        self.activated
    }

    pub fn total_measure(&self) -> f64 {
        self.total_measure
    }

    /// Feed one frame with a detected face.
    ///
    /// The frame is counted even when the measurement or the detector fails.
    /// A measurement error leaves the sum and the activation count untouched;
    /// a detector error after a successful measurement keeps the measured
    /// value in the sum.
    pub fn observe(&mut self, landmarks: &FaceLandmarks) -> Result<(), LandmarkError> {
        self.frames += 1;
        let value = (self.expression.measure)(landmarks)?;
        self.total_measure += value;
        if (self.expression.detect)(landmarks)? {
            self.activated += 1;
        }
        Ok(())
    }

    /// Discard everything observed so far (repeat key).
    pub fn reset(&mut self) {
        self.frames = 0;
        self.activated = 0;
        self.total_measure = 0.0;
    }

    pub fn average(&self) -> f64 {
        self.total_measure / self.frames.max(1) as f64
    }

    pub fn finish(&self) -> ResultRecord {
        let average = self.average();
        let percent = self.activated as f64 / self.frames.max(1) as f64 * 100.0;
        ResultRecord {
            expression: self.expression.name.to_string(),
            muscle: self.expression.muscle.to_string(),
            activation_percent: round_to(percent, 2),
            status: Status::classify(average, self.expression.threshold),
            measured_value: round_to(average, 5),
            expected_threshold: self.expression.threshold,
        }
    }
}
