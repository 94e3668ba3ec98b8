//! Log output on stderr, held back while the terminal is in raw mode so
//! that log lines do not tear through the live status line.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

static HELD: Mutex<Option<Vec<u8>>> = Mutex::new(None);

fn held() -> MutexGuard<'static, Option<Vec<u8>>> {
    HELD.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer handed to the tracing subscriber.
pub struct LogWriter;

pub fn log_writer() -> LogWriter {
    LogWriter
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut held = held();
        match held.as_mut() {
            Some(bytes) => {
                bytes.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Keep log output in memory until [`release`].
pub fn hold() {
    held().get_or_insert_with(Vec::new);
}

/// Write out everything held since [`hold`] and go back to direct output.
pub fn release() {
    let bytes = held().take();
    if let Some(bytes) = bytes {
        let mut stderr = io::stderr();
        let _ = stderr.write_all(&bytes);
        let _ = stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_held_until_release() {
        hold();
        LogWriter.write_all(b"WARN measurement failed\n").unwrap();
        LogWriter.write_all(b"WARN frame stream ended\n").unwrap();
        assert_eq!(
            held().as_deref(),
            Some(&b"WARN measurement failed\nWARN frame stream ended\n"[..])
        );

        release();
        assert!(held().is_none());
    }
}
