//! The display side of the terminal, as the core sees it: write-only.
//!
//! - `TerminalSurface`: the primitive the bridge implements (raw-mode stdout).
//! - `RecordingSurface`: in-memory surface for headless use and tests.

use std::sync::{Mutex, MutexGuard};

/// Move left one column and clear to end of line.
pub const ERASE_CHAR: &str = "\x1b[D\x1b[K";
/// Clear the whole current line and return to column 0.
pub const ERASE_LINE: &str = "\x1b[2K\r";
pub const NEWLINE: &str = "\r\n";

pub trait TerminalSurface: Send + Sync {
    fn write(&self, text: &str);

    fn write_line(&self, text: &str) {
        self.write(text);
        self.write(NEWLINE);
    }

    fn clear(&self);
}

#[derive(Debug, Default)]
struct Recorded {
    transcript: String,
    clears: usize,
}

/// Keeps everything written to it. `clear()` is counted, not applied.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    inner: Mutex<Recorded>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn transcript(&self) -> String {
        self.inner().transcript.clone()
    }

    pub fn clear_count(&self) -> usize {
        self.inner().clears
    }

    /// Drop the transcript so far (clear count is kept).
    pub fn reset(&self) {
        self.inner().transcript.clear();
    }
}

impl TerminalSurface for RecordingSurface {
    fn write(&self, text: &str) {
        self.inner().transcript.push_str(text);
    }

    fn clear(&self) {
        self.inner().clears += 1;
    }
}
