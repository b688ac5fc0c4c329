//! Terminal bell as the alarm's audio output.
//!
//! The frequency and length of a tone cannot be controlled through a
//! terminal, so each beep is a single BEL character on stderr. Terminals
//! that flash instead of ringing still give a visible cue.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use gasmon_core::{AudioOutput, Error, Result, Tone};

const BEL: &[u8] = b"\x07";

/// Rings the terminal bell on stderr.
#[derive(Debug)]
pub struct TerminalBell {
    require_tty: bool,
    rings: AtomicU64,
}

impl TerminalBell {
    /// A bell that refuses to resume when stderr is not a terminal.
    pub fn new() -> Self {
        Self {
            require_tty: true,
            rings: AtomicU64::new(0),
        }
    }

    /// A bell that rings even when stderr is redirected.
    #[cfg(test)]
    pub fn unchecked() -> Self {
        Self {
            require_tty: false,
            rings: AtomicU64::new(0),
        }
    }

    /// Number of beeps played so far.
    #[cfg(test)]
    pub fn rings(&self) -> u64 {
        self.rings.load(Ordering::Relaxed)
    }
}

impl Default for TerminalBell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for TerminalBell {
    async fn resume(&self) -> Result<()> {
        if self.require_tty && !io::stderr().is_terminal() {
            return Err(Error::Audio("stderr is not a terminal".to_string()));
        }
        Ok(())
    }

    fn beep(&self, _tone: Tone) {
        self.rings.fetch_add(1, Ordering::Relaxed);
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(BEL).and_then(|()| stderr.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unchecked_bell_resumes_and_counts() {
        let bell = TerminalBell::unchecked();
        bell.resume().await.unwrap();
        bell.beep(Tone::ALARM);
        bell.beep(Tone::ALARM);
        assert_eq!(bell.rings(), 2);
    }

    #[tokio::test]
    async fn test_checked_bell_matches_terminal() {
        let bell = TerminalBell::new();
        assert_eq!(bell.resume().await.is_ok(), io::stderr().is_terminal());
    }
}
