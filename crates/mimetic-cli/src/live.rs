//! Live landmark source: camera frames through the face mesh model.

use std::time::{Duration, Instant};

use mimetic_core::landmarker::LandmarkerError;
use mimetic_core::{FaceLandmarks, FaceMeshLandmarker, Frame, LandmarkSource};
use mimetic_hw::{Camera, CameraError};
use thiserror::Error;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("landmarker error: {0}")]
    Landmarker(#[from] LandmarkerError),
}

pub struct CameraSource {
    camera: Camera,
    landmarker: FaceMeshLandmarker,
    started: Instant,
    frames: u64,
    faces: u64,
    bad_frames: u64,
}

impl CameraSource {
    /// Open the camera and load the model. Fails fast if either is unavailable.
    pub fn open(config: &Config) -> Result<Self, LiveError> {
        let mut camera = Camera::open(&config.camera_device)?;
        camera.mirror = config.mirror;
        tracing::info!(
            device = %config.camera_device,
            width = camera.width,
            height = camera.height,
            fourcc = %camera.fourcc,
            "camera opened"
        );

        let model_path = config.landmark_model_path();
        let landmarker = FaceMeshLandmarker::load(&model_path, config.face_threshold)?;
        tracing::info!(path = %model_path, "face mesh model loaded");

        if config.warmup_frames > 0 {
            tracing::info!(count = config.warmup_frames, "discarding warmup frames");
            camera.warm_up(config.warmup_frames)?;
        }

        Ok(Self {
            camera,
            landmarker,
            started: Instant::now(),
            frames: 0,
            faces: 0,
            bad_frames: 0,
        })
    }

    /// Fraction of frames so far in which a face was found.
    pub fn face_rate(&self) -> f64 {
        self.faces as f64 / self.frames.max(1) as f64
    }

    pub fn bad_frames(&self) -> u64 {
        self.bad_frames
    }
}

/// A frame that could not be decoded or run through the model counts as a
/// frame without a face.
fn to_frame<E: std::fmt::Display>(
    detected: Result<Option<FaceLandmarks>, E>,
    bad_frames: &mut u64,
) -> Frame {
    match detected {
        Ok(Some(landmarks)) => Frame::Face(landmarks),
        Ok(None) => Frame::NoFace,
        Err(e) => {
            *bad_frames += 1;
            tracing::warn!(error = %e, bad_frames = *bad_frames, "unusable frame, treated as no face");
            Frame::NoFace
        }
    }
}

impl LandmarkSource for CameraSource {
    type Error = LiveError;

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, LiveError> {
        let detected = match self.camera.capture_frame() {
            Ok(frame) => self
                .landmarker
                .detect(&frame.data, frame.width, frame.height)
                .map_err(LiveError::from),
            Err(CameraError::Capture(e)) => {
                tracing::error!(error = %e, "camera read failed, ending capture");
                return Ok(None);
            }
            Err(e) => Err(LiveError::from(e)),
        };
        self.frames += 1;

        let frame = to_frame(detected, &mut self.bad_frames);
        if frame.face().is_some() {
            self.faces += 1;
        }
        Ok(Some(frame))
    }
}
