use crossterm::cursor::MoveTo;
use crossterm::terminal::{self, Clear, ClearType, SetTitle};
use crossterm::{execute, queue};
use runbox_core::{RunState, TerminalSurface};
use std::io::{self, Stdout, Write};
use std::sync::Mutex;

/// Stdout as the session sees it. Every write is flushed immediately so
/// echoed keystrokes show up without waiting for a newline.
pub struct CrosstermSurface {
    out: Mutex<Stdout>,
}

impl Default for CrosstermSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermSurface {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(io::stdout()),
        }
    }

    fn with_out(&self, f: impl FnOnce(&mut Stdout) -> io::Result<()>) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = f(&mut out) {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }

    /// Window title follows the run state, standing in for a run button.
    pub fn show_state(&self, state: RunState) {
        let title = match state {
            RunState::Idle => "runbox",
            RunState::Running => "runbox (running)",
        };
        self.with_out(|out| execute!(out, SetTitle(title)));
    }
}

impl TerminalSurface for CrosstermSurface {
    fn write(&self, text: &str) {
        self.with_out(|out| {
            out.write_all(text.as_bytes())?;
            out.flush()
        });
    }

    fn clear(&self) {
        self.with_out(|out| {
            queue!(out, Clear(ClearType::All), Clear(ClearType::Purge), MoveTo(0, 0))?;
            out.flush()
        });
    }
}

/// Raw mode for as long as this lives.
pub struct RawMode;

impl RawMode {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
