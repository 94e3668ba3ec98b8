//! Terminal front end for a capture session: prompts, a live status line,
//! and single-key commands read in raw mode.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, queue};
use mimetic_core::{Command, FrameStatus, SessionUi};

use crate::console;
use crate::speech::Speaker;

pub const KEY_HELP: &str = "Press S to skip, R to repeat, Esc to stop";

/// Map a key press to a session command.
pub fn command_for_key(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Command::Abort)
        }
        KeyCode::Char('s') | KeyCode::Char('S') => Some(Command::Skip),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Repeat),
        KeyCode::Esc => Some(Command::Abort),
        _ => None,
    }
}

/// One-line summary of the current frame, including the normalized
/// position of each highlighted landmark.
pub fn status_line(status: &FrameStatus<'_>) -> String {
    let expr = status.expression;
    let detail = match status.face {
        Some(face) => {
            let value = match (expr.measure)(face) {
                Ok(value) => format!("value {value:.4} / {}", expr.threshold),
                Err(_) => "value n/a".to_string(),
            };
            let points: Vec<String> = expr
                .highlight
                .iter()
                .map(|&i| match face.get(i) {
                    Ok(p) => format!("{i} ({:.2},{:.2})", p.x, p.y),
                    Err(_) => format!("{i} n/a"),
                })
                .collect();
            format!("{value} | {}", points.join(" "))
        }
        None => "no face".to_string(),
    };
    format!(
        "{} ({}) - {}s | {} | frames {}",
        expr.name, expr.muscle, status.remaining_secs, detail, status.frames
    )
}

/// Restores cooked mode when dropped. Log output is held while raw mode is
/// on and written out afterwards.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        console::hold();
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        console::release();
    }
}

/// Interactive UI for live sessions.
pub struct TerminalUi {
    speaker: Speaker,
    out: Stdout,
    status_shown: bool,
    _raw: RawModeGuard,
}

impl TerminalUi {
    pub fn new(speaker: Speaker) -> io::Result<Self> {
        let raw = RawModeGuard::enable()?;
        Ok(Self {
            speaker,
            out: io::stdout(),
            status_shown: false,
            _raw: raw,
        })
    }

    fn end_status_line(&mut self) {
        if self.status_shown {
            let _ = self.out.write_all(b"\r\n");
            self.status_shown = false;
        }
    }
}

impl SessionUi for TerminalUi {
    fn announce(&mut self, text: &str) {
        self.end_status_line();
        let _ = write!(self.out, "{text}\r\n{KEY_HELP}\r\n");
        let _ = self.out.flush();
        self.speaker.say(text);
    }

    fn show_frame(&mut self, status: &FrameStatus<'_>) {
        let line = status_line(status);
        let _ = queue!(
            self.out,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        );
        let _ = self.out.write_all(line.as_bytes());
        let _ = self.out.flush();
        self.status_shown = true;
    }

    fn poll_command(&mut self) -> Option<Command> {
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    tracing::debug!(error = %e, "key poll failed");
                    return None;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) => {
                    if let Some(command) = command_for_key(key) {
                        return Some(command);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "key read failed");
                    return None;
                }
            }
        }
    }
}

impl Drop for TerminalUi {
    fn drop(&mut self) {
        self.end_status_line();
        let _ = self.out.flush();
    }
}

/// Non-interactive UI for replays: prompts are printed, frames are silent.
pub struct ConsoleUi {
    speaker: Speaker,
}

impl ConsoleUi {
    pub fn new(speaker: Speaker) -> Self {
        Self { speaker }
    }
}

impl SessionUi for ConsoleUi {
    fn announce(&mut self, text: &str) {
        println!("{text}");
        self.speaker.say(text);
    }

    fn show_frame(&mut self, status: &FrameStatus<'_>) {
        tracing::trace!("{}", status_line(status));
    }

    fn poll_command(&mut self) -> Option<Command> {
        None
    }
}
