//! Seams between the adapters and whoever consumes their output.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which stream a block of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stdout,
    Stderr,
    /// Messages produced by the engine itself (install notices, banners).
    System,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
            Channel::System => "system",
        }
    }
}

/// Receives text emitted while code runs.
///
/// A block may contain several lines; splitting is the receiver's job.
pub trait OutputSink: Send + Sync {
    fn emit(&self, channel: Channel, text: &str);
}

/// Advisory cancellation flag shared between the session and a running adapter.
///
/// Setting it does not stop anything by itself. Adapters poll it at their own
/// checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
