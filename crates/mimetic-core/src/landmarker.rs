//! Face-mesh landmark inference via ONNX Runtime.
//!
//! Runs the MediaPipe face landmark network (192x192 RGB in, 468 or 478
//! 3D points plus a face-presence logit out) on the centred square crop of
//! each frame. Works when the face fills most of the frame, which is the
//! setup for a seated assessment in front of the camera.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use thiserror::Error;

use crate::landmarks::{FaceLandmarks, Landmark, FACE_MESH_POINTS, REFINED_FACE_MESH_POINTS};

/// Network input edge length in pixels.
pub const INPUT_SIZE: u32 = 192;

#[derive(Error, Debug)]
pub enum LandmarkerError {
    #[error("failed to load model {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("frame buffer is {got} bytes, expected {expected} for {width}x{height} RGB")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced no landmark tensor")]
    MissingLandmarks,
}

/// Square region of the frame fed to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenterCrop {
    pub x0: u32,
    pub y0: u32,
    pub side: u32,
}

impl CenterCrop {
    pub fn for_frame(width: u32, height: u32) -> Self {
        let side = width.min(height);
        Self {
            x0: (width - side) / 2,
            y0: (height - side) / 2,
            side,
        }
    }
}

pub struct FaceMeshLandmarker {
    session: Session,
    face_threshold: f32,
}

impl FaceMeshLandmarker {
    pub fn load(model_path: &str, face_threshold: f32) -> Result<Self, LandmarkerError> {
        let session = Session::builder()
            .map_err(|e| load_error(model_path, e))?
            .with_intra_threads(2)
            .map_err(|e| load_error(model_path, e))?
            .commit_from_file(model_path)
            .map_err(|e| load_error(model_path, e))?;

        tracing::debug!(path = model_path, face_threshold, "face mesh model loaded");
        Ok(Self {
            session,
            face_threshold,
        })
    }

    /// Landmarks of the face in an RGB frame, or `None` when the
    /// face-presence score is under the threshold.
    pub fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<FaceLandmarks>, LandmarkerError> {
        let crop = CenterCrop::for_frame(width, height);
        let input = preprocess(rgb, width, height, crop)?;
        let size = i64::from(INPUT_SIZE);
        let tensor = Tensor::from_array((vec![1i64, size, size, 3], input))
            .map_err(|e| LandmarkerError::Inference(format!("tensor creation error: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| LandmarkerError::Inference(e.to_string()))?;

        let mut raw_points = None;
        let mut face_logit = None;
        for (_name, value) in outputs.iter() {
            let (_shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| LandmarkerError::Inference(format!("tensor extraction failed: {e}")))?;
            match data.len() {
                n if n == FACE_MESH_POINTS * 3 || n == REFINED_FACE_MESH_POINTS * 3 => {
                    raw_points = Some(data.to_vec())
                }
                1 => face_logit = Some(data[0]),
                _ => {}
            }
        }

        let raw_points = raw_points.ok_or(LandmarkerError::MissingLandmarks)?;
        if let Some(logit) = face_logit {
            let score = sigmoid(logit);
            if score < self.face_threshold {
                tracing::trace!(score, "no face in frame");
                return Ok(None);
            }
        }

        Ok(Some(decode_landmarks(&raw_points, crop, width, height)))
    }
}

fn load_error(path: &str, e: impl std::fmt::Display) -> LandmarkerError {
    LandmarkerError::Load {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Crop, resize to the network input and scale to `[0, 1]`, NHWC order.
pub fn preprocess(
    rgb: &[u8],
    width: u32,
    height: u32,
    crop: CenterCrop,
) -> Result<Vec<f32>, LandmarkerError> {
    let expected = width as usize * height as usize * 3;
    let invalid = || LandmarkerError::InvalidFrame {
        width,
        height,
        expected,
        got: rgb.len(),
    };
    if rgb.len() != expected {
        return Err(invalid());
    }
    let frame = RgbImage::from_raw(width, height, rgb.to_vec()).ok_or_else(invalid)?;
    let cropped = imageops::crop_imm(&frame, crop.x0, crop.y0, crop.side, crop.side).to_image();
    let resized = imageops::resize(&cropped, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    Ok(resized
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect())
}

/// Map network-space points (pixels of the 192x192 input) back to
/// coordinates normalized over the full frame.
pub fn decode_landmarks(raw: &[f32], crop: CenterCrop, width: u32, height: u32) -> FaceLandmarks {
    let scale = crop.side as f32 / INPUT_SIZE as f32;
    let (w, h) = (width as f32, height as f32);
    let points = raw
        .chunks_exact(3)
        .map(|p| {
            Landmark::new(
                (crop.x0 as f32 + p[0] * scale) / w,
                (crop.y0 as f32 + p[1] * scale) / h,
                p[2] * scale / w,
            )
        })
        .collect();
    FaceLandmarks::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_crop_landscape() {
        let crop = CenterCrop::for_frame(640, 480);
        assert_eq!(
            crop,
            CenterCrop {
                x0: 80,
                y0: 0,
                side: 480
            }
        );
    }

    #[test]
    fn test_center_crop_portrait() {
        let crop = CenterCrop::for_frame(480, 640);
        assert_eq!(crop.x0, 0);
        assert_eq!(crop.y0, 80);
        assert_eq!(crop.side, 480);
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let rgb = vec![255u8; 320 * 240 * 3];
        let input = preprocess(&rgb, 320, 240, CenterCrop::for_frame(320, 240)).unwrap();
        assert_eq!(input.len(), (INPUT_SIZE * INPUT_SIZE * 3) as usize);
        assert!(input.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_preprocess_rejects_short_buffer() {
        let err = preprocess(&[0u8; 10], 320, 240, CenterCrop::for_frame(320, 240)).unwrap_err();
        assert!(matches!(err, LandmarkerError::InvalidFrame { got: 10, .. }));
    }

    #[test]
    fn test_decode_maps_to_full_frame() {
        let crop = CenterCrop::for_frame(640, 480);
        // Centre of the network input and its top-left corner.
        let raw = [96.0, 96.0, 0.0, 0.0, 0.0, 19.2];
        let face = decode_landmarks(&raw, crop, 640, 480);
        assert_eq!(face.len(), 2);

        let centre = face.get(0).unwrap();
        assert!((centre.x - 0.5).abs() < 1e-6);
        assert!((centre.y - 0.5).abs() < 1e-6);

        let corner = face.get(1).unwrap();
        assert!((corner.x - 80.0 / 640.0).abs() < 1e-6);
        assert!(corner.y.abs() < 1e-6);
        // 19.2 px at 2.5x scale = 48 px of a 640 px frame
        assert!((corner.z - 0.075).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
