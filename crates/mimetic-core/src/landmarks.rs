//! Face-mesh landmark types and the distance primitives used by the
//! expression measurements.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in the base face mesh.
pub const FACE_MESH_POINTS: usize = 468;

/// Number of points in the face mesh with iris refinement.
pub const REFINED_FACE_MESH_POINTS: usize = 478;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("landmark index {index} out of range ({len} landmarks)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A single landmark. `x` and `y` are normalized to the frame width and
/// height; `z` is depth relative to the face centre, roughly the same scale
/// as `x`.
///
/// Serialized as a compact `[x, y, z]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Landmark> for [f32; 3] {
    fn from(lm: Landmark) -> Self {
        [lm.x, lm.y, lm.z]
    }
}

/// Landmarks of one detected face in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    points: Vec<Landmark>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Checked lookup. Recordings and partial model outputs can carry fewer
    /// points than the full mesh.
    pub fn get(&self, index: usize) -> Result<Landmark, LandmarkError> {
        self.points
            .get(index)
            .copied()
            .ok_or(LandmarkError::IndexOutOfRange {
                index,
                len: self.points.len(),
            })
    }

    /// Vertical coordinate of landmark `index`, widened for measurement math.
    pub fn y(&self, index: usize) -> Result<f64, LandmarkError> {
        Ok(f64::from(self.get(index)?.y))
    }

    /// 2D Euclidean distance between two landmarks (x and y only).
    pub fn dist(&self, a: usize, b: usize) -> Result<f64, LandmarkError> {
        Ok(dist(self.get(a)?, self.get(b)?))
    }

    /// Absolute vertical offset between two landmarks.
    pub fn dy(&self, a: usize, b: usize) -> Result<f64, LandmarkError> {
        Ok((self.y(a)? - self.y(b)?).abs())
    }
}

impl From<Vec<Landmark>> for FaceLandmarks {
    fn from(points: Vec<Landmark>) -> Self {
        Self::new(points)
    }
}

/// 2D Euclidean distance, ignoring depth.
pub fn dist(p1: Landmark, p2: Landmark) -> f64 {
    let dx = f64::from(p1.x) - f64::from(p2.x);
    let dy = f64::from(p1.y) - f64::from(p2.y);
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dist_ignores_depth() {
        let a = Landmark::new(0.0, 0.0, 0.0);
        let b = Landmark::new(0.3, 0.4, 9.0);
        assert!((dist(a, b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_get_out_of_range() {
        let face = FaceLandmarks::new(vec![Landmark::default(); 3]);
        let err = face.get(3).unwrap_err();
        assert_eq!(err, LandmarkError::IndexOutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn test_dy_is_absolute() {
        let face = FaceLandmarks::new(vec![
            Landmark::new(0.0, 0.25, 0.0),
            Landmark::new(0.0, 0.75, 0.0),
        ]);
        assert!((face.dy(0, 1).unwrap() - 0.5).abs() < 1e-9);
        assert!((face.dy(1, 0).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_landmark_serializes_as_triple() {
        let face = FaceLandmarks::new(vec![Landmark::new(0.5, 0.25, -0.125)]);
        let json = serde_json::to_string(&face).unwrap();
        assert_eq!(json, "[[0.5,0.25,-0.125]]");
        let back: FaceLandmarks = serde_json::from_str(&json).unwrap();
        assert_eq!(back, face);
    }
}
