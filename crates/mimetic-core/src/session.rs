//! The timed capture session: one window per expression, driven by a
//! landmark source and a user interface that can skip, repeat or abort.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::ExpressionCapture;
use crate::expressions::Expression;
use crate::landmarks::FaceLandmarks;
use crate::result::ResultRecord;

pub const DEFAULT_EXPRESSION_DURATION: Duration = Duration::from_secs(10);

pub const INTRO_PROMPT: &str =
    "Starting facial paralysis detection. Please follow the instructions on the screen.";

/// One frame from a landmark source.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Face(FaceLandmarks),
    NoFace,
}

impl Frame {
    pub fn face(&self) -> Option<&FaceLandmarks> {
        match self {
            Frame::Face(lm) => Some(lm),
            Frame::NoFace => None,
        }
    }
}

/// Produces one frame of landmarks at a time and owns the session clock.
pub trait LandmarkSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Time elapsed on this source's clock. Live sources use wall time;
    /// recordings report the timestamp of the last line read.
    fn elapsed(&self) -> Duration;

    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;

    /// A capture window opens or restarts. Returns the window's start time.
    fn begin_window(&mut self) -> Result<Duration, Self::Error> {
        Ok(self.elapsed())
    }

    /// The user issued `command` right after the last frame.
    fn command_issued(&mut self, _command: Command) -> Result<(), Self::Error> {
        Ok(())
    }

    /// A command stored with the stream that follows the last frame.
    fn replayed_command(&mut self) -> Result<Option<Command>, Self::Error> {
        Ok(None)
    }
}

/// Keyboard commands accepted during a capture window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// End the current window without recording a result.
    Skip,
    /// Restart the current window from zero.
    Repeat,
    /// Stop the session, keeping the results recorded so far.
    Abort,
}

/// What the user sees while an expression is being captured.
#[derive(Debug)]
pub struct FrameStatus<'a> {
    pub expression: &'static Expression,
    pub remaining_secs: u64,
    pub face: Option<&'a FaceLandmarks>,
    pub frames: usize,
}

/// Prompts, per-frame feedback and key polling.
pub trait SessionUi {
    /// Speak or print an instruction. Blocks until delivered.
    fn announce(&mut self, text: &str);

    fn show_frame(&mut self, status: &FrameStatus<'_>);

    /// Non-blocking poll for a pending command.
    fn poll_command(&mut self) -> Option<Command>;
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub expression_duration: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expression_duration: DEFAULT_EXPRESSION_DURATION,
        }
    }
}

/// Results of a full session.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    pub records: Vec<ResultRecord>,
    /// Names of expressions skipped by the user.
    pub skipped: Vec<&'static str>,
    pub aborted: bool,
    /// The frame stream ran out before the battery finished.
    pub stream_ended: bool,
    /// Why the source stopped delivering frames, when it failed.
    pub source_error: Option<String>,
    /// Frames where a measurement or detector could not be evaluated.
    pub metric_errors: usize,
}

enum WindowEnd {
    Elapsed,
    Skipped,
    Aborted,
    StreamEnded,
}

/// Run every expression in order and collect one record per completed window.
///
/// Once the stream ends, or the source fails, every remaining expression is
/// still announced and recorded with no frames observed.
pub fn run_session<S, U>(
    expressions: &'static [Expression],
    source: &mut S,
    ui: &mut U,
    config: &SessionConfig,
) -> SessionOutcome
where
    S: LandmarkSource,
    U: SessionUi,
{
    let mut outcome = SessionOutcome::default();
    ui.announce(INTRO_PROMPT);

    for expression in expressions {
        ui.announce(&format!("Please perform: {}", expression.name));
        let mut capture = ExpressionCapture::new(expression);

        let end = if outcome.stream_ended {
            WindowEnd::StreamEnded
        } else {
            match run_window(&mut capture, source, ui, config, &mut outcome.metric_errors) {
                Ok(end) => end,
                Err(e) => {
                    tracing::error!(
                        expression = expression.name,
                        error = %e,
                        "landmark source failed, ending capture"
                    );
                    outcome.source_error = Some(e.to_string());
                    WindowEnd::StreamEnded
                }
            }
        };

        match end {
            WindowEnd::Elapsed => {
                let record = capture.finish();
                tracing::info!(
                    expression = expression.name,
                    frames = capture.frames(),
                    activation_percent = record.activation_percent,
                    measured_value = record.measured_value,
                    status = %record.status,
                    "expression captured"
                );
                outcome.records.push(record);
            }
            WindowEnd::Skipped => {
                tracing::info!(expression = expression.name, "expression skipped");
                outcome.skipped.push(expression.name);
            }
            WindowEnd::Aborted => {
                tracing::warn!(expression = expression.name, "session aborted");
                outcome.aborted = true;
                break;
            }
            WindowEnd::StreamEnded => {
                if !outcome.stream_ended {
                    tracing::warn!(
                        expression = expression.name,
                        frames = capture.frames(),
                        "frame stream ended"
                    );
                    outcome.stream_ended = true;
                }
                outcome.records.push(capture.finish());
            }
        }
    }

    outcome
}

fn run_window<S, U>(
    capture: &mut ExpressionCapture,
    source: &mut S,
    ui: &mut U,
    config: &SessionConfig,
    metric_errors: &mut usize,
) -> Result<WindowEnd, S::Error>
where
    S: LandmarkSource,
    U: SessionUi,
{
    let duration = config.expression_duration;
    let expression = capture.expression();
    let mut start = source.begin_window()?;

    while source.elapsed().saturating_sub(start) < duration {
        let Some(frame) = source.next_frame()? else {
            return Ok(WindowEnd::StreamEnded);
        };

        if let Frame::Face(landmarks) = &frame {
            if let Err(e) = capture.observe(landmarks) {
                *metric_errors += 1;
                tracing::warn!(expression = expression.name, error = %e, "measurement failed");
            }
        }

        let elapsed_secs = source.elapsed().saturating_sub(start).as_secs();
        ui.show_frame(&FrameStatus {
            expression,
            remaining_secs: duration.as_secs().saturating_sub(elapsed_secs),
            face: frame.face(),
            frames: capture.frames(),
        });

        let command = match source.replayed_command()? {
            Some(command) => Some(command),
            None => ui.poll_command(),
        };
        let Some(command) = command else {
            continue;
        };
        source.command_issued(command)?;

        match command {
            Command::Skip => return Ok(WindowEnd::Skipped),
            Command::Abort => return Ok(WindowEnd::Aborted),
            Command::Repeat => {
                tracing::debug!(expression = expression.name, "window restarted");
                start = source.begin_window()?;
                capture.reset();
            }
        }
    }

    Ok(WindowEnd::Elapsed)
}
