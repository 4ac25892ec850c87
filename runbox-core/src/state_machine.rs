use crate::error::{Result, SessionError};

use chrono::{DateTime, Utc};
use runbox_script::CancelFlag;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
}

/// The single-flight gate in front of the runtimes.
///
/// `Idle → Running` is one compare-and-swap, so two callers can never both
/// win, no matter how their requests interleave. The returned [`RunGuard`]
/// is the only way back to `Idle`.
#[derive(Debug)]
pub struct RunController {
    running: AtomicBool,
    cancel: CancelFlag,
    started_at: Mutex<Option<DateTime<Utc>>>,
    state_tx: watch::Sender<RunState>,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(RunState::Idle);
        Self {
            running: AtomicBool::new(false),
            cancel: CancelFlag::new(),
            started_at: Mutex::new(None),
            state_tx,
        }
    }

    /// Claim the run slot. Fails with `AlreadyRunning` without touching the
    /// current run.
    pub fn try_begin(self: &Arc<Self>) -> Result<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SessionError::AlreadyRunning)?;

        self.cancel.reset();
        *self.started_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Utc::now());
        self.state_tx.send_replace(RunState::Running);
        tracing::debug!("run started");

        Ok(RunGuard {
            controller: Arc::clone(self),
        })
    }

    /// Raise the cancel flag if a run is active. Returns whether it was.
    pub fn request_cancel(&self) -> bool {
        if self.is_running() {
            self.cancel.cancel();
            tracing::info!("cancellation requested");
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> RunState {
        if self.is_running() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Follow state changes, e.g. to grey out a run button.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Holds the run slot. Dropping it clears the cancel flag and returns to `Idle`.
#[derive(Debug)]
pub struct RunGuard {
    controller: Arc<RunController>,
}

impl RunGuard {
    pub fn cancel_flag(&self) -> CancelFlag {
        self.controller.cancel_flag()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let c = &self.controller;
        let started = c
            .started_at
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        c.cancel.reset();
        c.running.store(false, Ordering::SeqCst);
        c.state_tx.send_replace(RunState::Idle);
        if let Some(started) = started {
            let elapsed = Utc::now() - started;
            tracing::debug!(elapsed_ms = elapsed.num_milliseconds(), "run finished");
        }
    }
}
