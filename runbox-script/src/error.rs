use thiserror::Error;

/// Failures a runtime adapter reports to its caller.
///
/// Errors raised *by the evaluated code* are not represented here: adapters
/// catch them, write the trace to the stderr channel and return
/// [`RunOutcome::Failed`](crate::RunOutcome::Failed).
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The runtime has not finished (or never finished) loading.
    #[error("runtime not ready")]
    NotReady,

    /// Loading the runtime failed. The adapter stays unusable afterwards.
    #[error("runtime initialization failed: {0}")]
    InitializationFailed(String),

    /// Workspace or process I/O failed before evaluation could start.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine itself (not the user's code) misbehaved.
    #[error("engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
