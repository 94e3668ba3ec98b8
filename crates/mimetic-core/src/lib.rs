//! Mimetic core: facial muscle activation assessment from face-mesh landmarks.

pub mod capture;
pub mod expressions;
pub mod landmarker;
pub mod landmarks;
pub mod recording;
pub mod result;
pub mod session;

pub use capture::ExpressionCapture;
pub use expressions::{Expression, EXPRESSIONS};
pub use landmarker::FaceMeshLandmarker;
pub use landmarks::{FaceLandmarks, Landmark, LandmarkError};
pub use recording::{RecordedSource, RecordingError, RecordingSource};
pub use result::{ResultRecord, Status};
pub use session::{
    run_session, Command, Frame, FrameStatus, LandmarkSource, SessionConfig, SessionOutcome,
    SessionUi,
};

use std::path::PathBuf;

/// Default model directory.
///
/// `/var/lib/mimetic/models` for system installs, otherwise
/// `$XDG_DATA_HOME/mimetic/models` (`~/.local/share/mimetic/models`).
pub fn default_model_dir() -> PathBuf {
    let system = PathBuf::from("/var/lib/mimetic/models");
    if system.exists() {
        return system;
    }
    let data_home = std::env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.local/share")
    });
    PathBuf::from(data_home).join("mimetic/models")
}
