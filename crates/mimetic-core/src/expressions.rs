//! The fixed expression battery.
//!
//! Each expression pairs a facial muscle with a detector predicate (is the
//! movement visible in this frame?) and a scalar measurement whose average
//! over the capture window is compared against a fixed threshold. Indices
//! refer to the 468-point face mesh topology.

use crate::landmarks::{FaceLandmarks, LandmarkError};

/// Boolean detector over one frame of landmarks.
pub type DetectFn = fn(&FaceLandmarks) -> Result<bool, LandmarkError>;

/// Scalar measurement over one frame of landmarks.
pub type MeasureFn = fn(&FaceLandmarks) -> Result<f64, LandmarkError>;

/// One entry of the battery. Static and immutable.
#[derive(Debug)]
pub struct Expression {
    /// Instruction shown and spoken to the patient.
    pub name: &'static str,
    /// Anatomical muscle (or muscle group) exercised.
    pub muscle: &'static str,
    pub detect: DetectFn,
    /// Landmarks drawn on the preview for this expression.
    pub highlight: &'static [usize],
    pub measure: MeasureFn,
    /// Average measurement below this value classifies the muscle as paralyzed.
    pub threshold: f64,
}

pub fn brow_diff(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    Ok(lm.dy(70, 63)? + lm.dy(300, 293)?)
}

pub fn mouth_corner_diff(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    lm.dist(61, 291)
}

pub fn lip_pucker(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    lm.dist(13, 14)
}

pub fn eye_openness(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    Ok((lm.dist(159, 145)? + lm.dist(386, 374)?) / 2.0)
}

pub fn nose_lift(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    lm.dy(2, 98)
}

pub fn nostril_flare(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    lm.dist(35, 265)
}

pub fn chin_raise(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    lm.dy(152, 200)
}

pub fn mouth_corner_drop(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    Ok(lm.dy(61, 146)? + lm.dy(291, 375)?)
}

/// Mean height of the brows above the upper eyelids.
pub fn brow_raise(lm: &FaceLandmarks) -> Result<f64, LandmarkError> {
    Ok((lm.y(159)? - lm.y(105)? + lm.y(386)? - lm.y(334)?) / 2.0)
}

fn brows_above_eyes(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(lm.y(105)? < lm.y(159)? && lm.y(334)? < lm.y(386)?)
}

fn is_frowning(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(brow_diff(lm)? < 0.02)
}

fn is_smiling(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(mouth_corner_diff(lm)? > 0.03)
}

fn is_pouting(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(lip_pucker(lm)? > 0.015)
}

fn is_squinting(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(eye_openness(lm)? < 0.01)
}

fn is_nose_lifted(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(nose_lift(lm)? > 0.01)
}

fn is_nostril_flared(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(nostril_flare(lm)? > 0.015)
}

fn is_chin_raised(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(chin_raise(lm)? > 0.01)
}

fn is_mouth_corner_dropped(lm: &FaceLandmarks) -> Result<bool, LandmarkError> {
    Ok(mouth_corner_drop(lm)? > 0.01)
}

pub static EXPRESSIONS: [Expression; 9] = [
    Expression {
        name: "Raising eyebrows",
        muscle: "Frontalis",
        detect: brows_above_eyes,
        highlight: &[105, 159, 334, 386],
        measure: brow_raise,
        threshold: 0.005,
    },
    Expression {
        name: "Frowning",
        muscle: "Corrugator supercilii / Procerus",
        detect: is_frowning,
        highlight: &[70, 63, 300, 293],
        measure: brow_diff,
        threshold: 0.02,
    },
    Expression {
        name: "Smiling",
        muscle: "Zygomaticus major / minor",
        detect: is_smiling,
        highlight: &[61, 291],
        measure: mouth_corner_diff,
        threshold: 0.03,
    },
    Expression {
        name: "Pouting",
        muscle: "Orbicularis oris",
        detect: is_pouting,
        highlight: &[13, 14],
        measure: lip_pucker,
        threshold: 0.015,
    },
    Expression {
        name: "Squinting",
        muscle: "Orbicularis oculi",
        detect: is_squinting,
        highlight: &[159, 145, 386, 374],
        measure: eye_openness,
        threshold: 0.01,
    },
    Expression {
        name: "Showing disgust",
        muscle: "Levator labii superioris",
        detect: is_nose_lifted,
        highlight: &[2, 98],
        measure: nose_lift,
        threshold: 0.01,
    },
    Expression {
        name: "Flaring nostrils",
        muscle: "Nasalis",
        detect: is_nostril_flared,
        highlight: &[35, 265],
        measure: nostril_flare,
        threshold: 0.015,
    },
    Expression {
        name: "Puckering chin",
        muscle: "Mentalis",
        detect: is_chin_raised,
        highlight: &[152, 200],
        measure: chin_raise,
        threshold: 0.01,
    },
    Expression {
        name: "Depressing mouth corners",
        muscle: "Depressor anguli oris",
        detect: is_mouth_corner_dropped,
        highlight: &[61, 146, 291, 375],
        measure: mouth_corner_drop,
        threshold: 0.01,
    },
];

/// Look up an expression by its display name.
pub fn find(name: &str) -> Option<&'static Expression> {
    EXPRESSIONS.iter().find(|e| e.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, FACE_MESH_POINTS};

    fn neutral_face() -> Vec<Landmark> {
        vec![Landmark::new(0.5, 0.5, 0.0); FACE_MESH_POINTS]
    }

    fn set(points: &mut [Landmark], index: usize, x: f32, y: f32) {
        points[index] = Landmark::new(x, y, 0.0);
    }

    #[test]
    fn test_battery_order_and_thresholds() {
        let names: Vec<_> = EXPRESSIONS.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            [
                "Raising eyebrows",
                "Frowning",
                "Smiling",
                "Pouting",
                "Squinting",
                "Showing disgust",
                "Flaring nostrils",
                "Puckering chin",
                "Depressing mouth corners",
            ]
        );
        let thresholds: Vec<_> = EXPRESSIONS.iter().map(|e| e.threshold).collect();
        assert_eq!(
            thresholds,
            [0.005, 0.02, 0.03, 0.015, 0.01, 0.01, 0.015, 0.01, 0.01]
        );
    }

    #[test]
    fn test_highlights_within_mesh() {
        for expr in &EXPRESSIONS {
            assert!(!expr.highlight.is_empty());
            assert!(expr.highlight.iter().all(|&i| i < FACE_MESH_POINTS));
        }
    }

    #[test]
    fn test_raising_eyebrows() {
        let mut pts = neutral_face();
        set(&mut pts, 105, 0.4, 0.30);
        set(&mut pts, 159, 0.4, 0.34);
        set(&mut pts, 334, 0.6, 0.31);
        set(&mut pts, 386, 0.6, 0.34);
        let face = FaceLandmarks::new(pts);
        let expr = find("Raising eyebrows").unwrap();

        assert!((expr.detect)(&face).unwrap());
        // ((0.34 - 0.30) + (0.34 - 0.31)) / 2 = 0.035
        assert!(((expr.measure)(&face).unwrap() - 0.035).abs() < 1e-6);
    }

    #[test]
    fn test_raising_eyebrows_requires_both_sides() {
        let mut pts = neutral_face();
        set(&mut pts, 105, 0.4, 0.30);
        set(&mut pts, 159, 0.4, 0.34);
        // right brow level with the eyelid
        set(&mut pts, 334, 0.6, 0.34);
        set(&mut pts, 386, 0.6, 0.34);
        let face = FaceLandmarks::new(pts);
        assert!(!(find("Raising eyebrows").unwrap().detect)(&face).unwrap());
    }

    #[test]
    fn test_smiling_distance() {
        let mut pts = neutral_face();
        set(&mut pts, 61, 0.40, 0.70);
        set(&mut pts, 291, 0.43, 0.74);
        let face = FaceLandmarks::new(pts);
        let expr = find("Smiling").unwrap();
        let value = (expr.measure)(&face).unwrap();
        assert!((value - 0.05).abs() < 1e-6);
        assert!((expr.detect)(&face).unwrap());
    }

    #[test]
    fn test_frowning_detects_small_brow_diff() {
        let mut pts = neutral_face();
        set(&mut pts, 70, 0.3, 0.300);
        set(&mut pts, 63, 0.3, 0.305);
        set(&mut pts, 300, 0.7, 0.300);
        set(&mut pts, 293, 0.7, 0.305);
        let face = FaceLandmarks::new(pts);
        let expr = find("Frowning").unwrap();
        assert!(((expr.measure)(&face).unwrap() - 0.01).abs() < 1e-6);
        assert!((expr.detect)(&face).unwrap());
    }

    #[test]
    fn test_squinting_eye_openness() {
        let mut pts = neutral_face();
        set(&mut pts, 159, 0.4, 0.400);
        set(&mut pts, 145, 0.4, 0.404);
        set(&mut pts, 386, 0.6, 0.400);
        set(&mut pts, 374, 0.6, 0.408);
        let face = FaceLandmarks::new(pts);
        let expr = find("Squinting").unwrap();
        assert!(((expr.measure)(&face).unwrap() - 0.006).abs() < 1e-6);
        assert!((expr.detect)(&face).unwrap());
    }

    #[test]
    fn test_mouth_corner_drop_sums_both_sides() {
        let mut pts = neutral_face();
        set(&mut pts, 61, 0.4, 0.70);
        set(&mut pts, 146, 0.4, 0.72);
        set(&mut pts, 291, 0.6, 0.70);
        set(&mut pts, 375, 0.6, 0.71);
        let face = FaceLandmarks::new(pts);
        assert!((mouth_corner_drop(&face).unwrap() - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_single_axis_metrics() {
        let mut pts = neutral_face();
        set(&mut pts, 2, 0.5, 0.60);
        set(&mut pts, 98, 0.45, 0.58);
        set(&mut pts, 35, 0.45, 0.55);
        set(&mut pts, 265, 0.55, 0.55);
        set(&mut pts, 152, 0.5, 0.90);
        set(&mut pts, 200, 0.5, 0.86);
        set(&mut pts, 13, 0.5, 0.70);
        set(&mut pts, 14, 0.5, 0.72);
        let face = FaceLandmarks::new(pts);
        assert!((nose_lift(&face).unwrap() - 0.02).abs() < 1e-6);
        assert!((nostril_flare(&face).unwrap() - 0.10).abs() < 1e-6);
        assert!((chin_raise(&face).unwrap() - 0.04).abs() < 1e-6);
        assert!((lip_pucker(&face).unwrap() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_short_landmark_set_errors() {
        let face = FaceLandmarks::new(vec![Landmark::default(); 10]);
        for expr in &EXPRESSIONS {
            assert!((expr.measure)(&face).is_err(), "{}", expr.name);
        }
    }
}
