use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Assessment configuration: defaults, then an optional TOML file, then
/// `OUTPUT_DIR` / `MIMETIC_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory the JSON and PDF reports are written to.
    pub output_dir: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Capture window per expression, in seconds.
    pub expression_secs: u64,
    /// Number of warmup frames to discard at startup (camera AGC/AE stabilization).
    pub warmup_frames: usize,
    /// Minimum face-presence score for a frame to count as containing a face.
    pub face_threshold: f32,
    /// Whether frames are flipped horizontally before inference.
    pub mirror: bool,
    /// Whether prompts are spoken aloud.
    pub speech_enabled: bool,
    /// Text-to-speech program; receives the prompt as its only argument.
    pub speech_command: String,
}

/// On-disk shape of the TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    output_dir: Option<PathBuf>,
    camera_device: Option<String>,
    model_dir: Option<PathBuf>,
    expression_secs: Option<u64>,
    warmup_frames: Option<usize>,
    face_threshold: Option<f32>,
    mirror: Option<bool>,
    speech_enabled: Option<bool>,
    speech_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            camera_device: "/dev/video0".to_string(),
            model_dir: mimetic_core::default_model_dir(),
            expression_secs: 10,
            warmup_frames: 4,
            face_threshold: 0.5,
            mirror: true,
            speech_enabled: true,
            speech_command: "espeak-ng".to_string(),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let file: FileConfig = toml::from_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?;
            config.apply_file(file);
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = file.camera_device {
            self.camera_device = v;
        }
        if let Some(v) = file.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = file.expression_secs {
            self.expression_secs = v;
        }
        if let Some(v) = file.warmup_frames {
            self.warmup_frames = v;
        }
        if let Some(v) = file.face_threshold {
            self.face_threshold = v;
        }
        if let Some(v) = file.mirror {
            self.mirror = v;
        }
        if let Some(v) = file.speech_enabled {
            self.speech_enabled = v;
        }
        if let Some(v) = file.speech_command {
            self.speech_command = v;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("MIMETIC_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = var("MIMETIC_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        self.expression_secs = parse_or(&var, "MIMETIC_EXPRESSION_SECS", self.expression_secs);
        self.warmup_frames = parse_or(&var, "MIMETIC_WARMUP_FRAMES", self.warmup_frames);
        self.face_threshold = parse_or(&var, "MIMETIC_FACE_THRESHOLD", self.face_threshold);
        if let Some(v) = var("MIMETIC_MIRROR") {
            self.mirror = v != "0";
        }
        if let Some(v) = var("MIMETIC_SPEECH_ENABLED") {
            self.speech_enabled = v != "0";
        }
        if let Some(v) = var("MIMETIC_SPEECH_COMMAND") {
            self.speech_command = v;
        }
    }

    pub fn expression_duration(&self) -> Duration {
        Duration::from_secs(self.expression_secs)
    }

    /// Path to the face mesh landmark model.
    pub fn landmark_model_path(&self) -> String {
        self.model_dir
            .join(mimetic_models::FACE_LANDMARK_MODEL)
            .to_string_lossy()
            .into_owned()
    }
}

/// Parse a typed env value, keeping `current` when unset or unparsable.
fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    current: T,
) -> T {
    match var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable config value");
            current
        }),
        None => current,
    }
}
