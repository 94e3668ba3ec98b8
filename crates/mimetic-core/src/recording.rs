//! Landmark recordings: JSON Lines, one frame or session event per line.
//!
//! ```text
//! {"t_ms":2140,"event":"window_start"}
//! {"t_ms":2173,"face":[[0.51,0.42,-0.03], ...]}
//! {"t_ms":2206,"face":null}
//! {"t_ms":2206,"event":"skip"}
//! ```
//!
//! A recording made during a live session replays through the same session
//! driver with the same results: window starts and key commands are stored
//! with the frames, and the recorded timestamps become the session clock.
//! Recordings without events start each window at the next frame.

use std::io::{BufRead, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmarks::FaceLandmarks;
use crate::session::{Command, Frame, LandmarkSource};

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("recording I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed recording at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("timestamps go backwards at line {line}")]
    NonMonotonic { line: usize },
    #[error("{0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Event {
    WindowStart,
    Skip,
    Repeat,
    Abort,
}

impl From<Command> for Event {
    fn from(command: Command) -> Self {
        match command {
            Command::Skip => Event::Skip,
            Command::Repeat => Event::Repeat,
            Command::Abort => Event::Abort,
        }
    }
}

impl Event {
    fn command(self) -> Option<Command> {
        match self {
            Event::WindowStart => None,
            Event::Skip => Some(Command::Skip),
            Event::Repeat => Some(Command::Repeat),
            Event::Abort => Some(Command::Abort),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RecordedLine {
    Event { t_ms: u64, event: Event },
    Frame { t_ms: u64, face: Option<FaceLandmarks> },
}

impl RecordedLine {
    fn at(&self) -> Duration {
        match self {
            RecordedLine::Event { t_ms, .. } | RecordedLine::Frame { t_ms, .. } => {
                Duration::from_millis(*t_ms)
            }
        }
    }
}

fn millis(t: Duration) -> u64 {
    u64::try_from(t.as_millis()).unwrap_or(u64::MAX)
}

/// `t` truncated to the millisecond resolution of the file.
fn whole_millis(t: Duration) -> Duration {
    Duration::from_millis(millis(t))
}

/// Replays a recording as a [`LandmarkSource`].
pub struct RecordedSource<R> {
    reader: R,
    line: usize,
    last_read: Duration,
    clock: Duration,
    peeked: Option<RecordedLine>,
    buf: String,
}

impl<R: BufRead> RecordedSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            last_read: Duration::ZERO,
            clock: Duration::ZERO,
            peeked: None,
            buf: String::new(),
        }
    }

    fn read_line(&mut self) -> Result<Option<RecordedLine>, RecordingError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            let parsed: RecordedLine =
                serde_json::from_str(text).map_err(|source| RecordingError::Parse {
                    line: self.line,
                    source,
                })?;
            if parsed.at() < self.last_read {
                return Err(RecordingError::NonMonotonic { line: self.line });
            }
            self.last_read = parsed.at();
            return Ok(Some(parsed));
        }
    }

    fn peek(&mut self) -> Result<Option<&RecordedLine>, RecordingError> {
        if self.peeked.is_none() {
            self.peeked = self.read_line()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn take(&mut self) -> Result<Option<RecordedLine>, RecordingError> {
        match self.peeked.take() {
            Some(line) => Ok(Some(line)),
            None => self.read_line(),
        }
    }
}

impl<R: BufRead> LandmarkSource for RecordedSource<R> {
    type Error = RecordingError;

    fn elapsed(&self) -> Duration {
        self.clock
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, RecordingError> {
        // Events the session did not ask for are stepped over.
        while let Some(line) = self.take()? {
            self.clock = line.at();
            if let RecordedLine::Frame { face, .. } = line {
                return Ok(Some(match face {
                    Some(lm) => Frame::Face(lm),
                    None => Frame::NoFace,
                }));
            }
        }
        Ok(None)
    }

    fn begin_window(&mut self) -> Result<Duration, RecordingError> {
        let (marker, at) = match self.peek()? {
            Some(
                line @ RecordedLine::Event {
                    event: Event::WindowStart,
                    ..
                },
            ) => (true, Some(line.at())),
            Some(line @ RecordedLine::Frame { .. }) => (false, Some(line.at())),
            _ => (false, None),
        };
        if marker {
            self.peeked = None;
        }
        if let Some(at) = at {
            self.clock = at;
        }
        Ok(self.clock)
    }

    fn replayed_command(&mut self) -> Result<Option<Command>, RecordingError> {
        let command = match self.peek()? {
            Some(RecordedLine::Event { event, .. }) => event.command(),
            _ => None,
        };
        if command.is_some() {
            if let Some(line) = self.take()? {
                self.clock = line.at();
            }
        }
        Ok(command)
    }
}

/// Tees every frame and session event of an inner source into a recording.
///
/// The session clock seen through the tee is the time of the last line
/// written, so a replay of the recording makes the same timing decisions.
pub struct RecordingSource<S, W> {
    inner: S,
    writer: W,
    clock: Duration,
}

impl<S: LandmarkSource, W: Write> RecordingSource<S, W> {
    pub fn new(inner: S, writer: W) -> Self {
        let clock = whole_millis(inner.elapsed());
        Self {
            inner,
            writer,
            clock,
        }
    }

    pub fn into_parts(self) -> (S, W) {
        (self.inner, self.writer)
    }

    fn write_line(&mut self, line: &RecordedLine) -> Result<(), RecordingError> {
        serde_json::to_writer(&mut self.writer, line).map_err(RecordingError::Encode)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn write_event(&mut self, event: Event) -> Result<(), RecordingError> {
        self.write_line(&RecordedLine::Event {
            t_ms: millis(self.clock),
            event,
        })
    }
}

impl<S: LandmarkSource, W: Write> LandmarkSource for RecordingSource<S, W> {
    type Error = RecordingError;

    fn elapsed(&self) -> Duration {
        self.clock
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, RecordingError> {
        let frame = self
            .inner
            .next_frame()
            .map_err(|e| RecordingError::Source(Box::new(e)))?;

        match &frame {
            Some(frame) => {
                self.clock = whole_millis(self.inner.elapsed()).max(self.clock);
                self.write_line(&RecordedLine::Frame {
                    t_ms: millis(self.clock),
                    face: frame.face().cloned(),
                })?;
            }
            None => self.writer.flush()?,
        }

        Ok(frame)
    }

    fn begin_window(&mut self) -> Result<Duration, RecordingError> {
        let start = self
            .inner
            .begin_window()
            .map_err(|e| RecordingError::Source(Box::new(e)))?;
        self.clock = whole_millis(start).max(self.clock);
        self.write_event(Event::WindowStart)?;
        Ok(self.clock)
    }

    fn command_issued(&mut self, command: Command) -> Result<(), RecordingError> {
        self.inner
            .command_issued(command)
            .map_err(|e| RecordingError::Source(Box::new(e)))?;
        self.write_event(command.into())
    }

    fn replayed_command(&mut self) -> Result<Option<Command>, RecordingError> {
        self.inner
            .replayed_command()
            .map_err(|e| RecordingError::Source(Box::new(e)))
    }
}
