//! Spoken prompts through an external text-to-speech program.

use std::process::{Command, Stdio};

pub struct Speaker {
    command: Option<String>,
}

impl Speaker {
    pub fn new(command: &str, enabled: bool) -> Self {
        Self {
            command: enabled.then(|| command.to_string()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.command.is_some()
    }

    /// Speak `text` and wait for the utterance to finish. A program that
    /// cannot be started disables speech for the rest of the session.
    pub fn say(&mut self, text: &str) {
        let Some(program) = &self.command else {
            return;
        };

        let status = Command::new(program)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => {}
            Ok(s) => tracing::debug!(program = %program, status = %s, "speech exited with failure"),
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "speech unavailable, continuing without it");
                self.command = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_disables_speech() {
        let mut speaker = Speaker::new("mimetic-no-such-tts-program", true);
        assert!(speaker.is_enabled());
        speaker.say("hello");
        assert!(!speaker.is_enabled());
    }

    #[test]
    fn test_disabled_is_silent() {
        let mut speaker = Speaker::new("espeak-ng", false);
        assert!(!speaker.is_enabled());
        speaker.say("hello");
        assert!(!speaker.is_enabled());
    }
}
