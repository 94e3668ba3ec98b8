use serde::{Deserialize, Serialize};

/// Classification of one muscle after its capture window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Active,
    Paralyzed,
}

impl Status {
    /// `Paralyzed` iff the average measurement falls below the threshold.
    pub fn classify(average: f64, threshold: f64) -> Self {
        if average < threshold {
            Status::Paralyzed
        } else {
            Status::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "Active",
            Status::Paralyzed => "Paralyzed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one expression, serialized verbatim into the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub expression: String,
    pub muscle: String,
    /// Percentage of observed frames where the detector fired, 2 decimals.
    pub activation_percent: f64,
    pub status: Status,
    /// Average measurement over observed frames, 5 decimals.
    pub measured_value: f64,
    pub expected_threshold: f64,
}

/// Round to `decimals` places the way Python's `round` does: the exact
/// binary value is rounded to the nearest decimal, ties to even.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.decimals$}").parse().unwrap_or(value)
}
