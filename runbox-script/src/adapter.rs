use crate::error::Result;
use crate::sink::{CancelFlag, OutputSink};
use async_trait::async_trait;
use std::sync::Arc;

/// How a single evaluation ended, as seen by the session.
///
/// Errors thrown by user code are already on the stderr channel by the time
/// an adapter returns `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// The adapter observed the cancel flag at one of its checkpoints.
    Cancelled,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Lifecycle of a runtime handle: `Uninitialized → Loading → Ready`.
///
/// `Failed` is terminal; there is no automatic retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

/// Everything an adapter needs from the caller for one evaluation.
#[derive(Clone)]
pub struct ExecContext {
    pub sink: Arc<dyn OutputSink>,
    pub cancel: CancelFlag,
}

impl ExecContext {
    pub fn new(sink: Arc<dyn OutputSink>, cancel: CancelFlag) -> Self {
        Self { sink, cancel }
    }
}

/// A pluggable code-execution backend.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &'static str;

    fn status(&self) -> RuntimeStatus;

    fn is_ready(&self) -> bool {
        self.status() == RuntimeStatus::Ready
    }

    /// Bring the runtime up. Calling it again while loading or once loaded
    /// (or after a failure) is a no-op.
    async fn initialize(&self) -> Result<()>;

    /// Evaluate `source`. `name` identifies the source in traces and, for
    /// runtimes with a workspace, is the file it gets stored under.
    async fn execute_source(&self, source: &str, name: &str, ctx: &ExecContext)
        -> Result<RunOutcome>;
}
