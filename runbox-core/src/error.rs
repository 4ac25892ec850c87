use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Everything the session can refuse or fail at.
///
/// By the time one of these reaches the caller, the matching message has
/// already been written to the terminal.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The Python backend is still loading, or never loaded.
    #[error("Python runtime is not ready")]
    RuntimeNotReady,

    /// A run is in progress. The new request was dropped, not queued.
    #[error("code is already running")]
    AlreadyRunning,

    /// Recognized syntax the engine deliberately does not implement.
    #[error("not supported: {0}")]
    UnsupportedCommand(String),

    /// Unknown first token.
    #[error("command not found: {0}")]
    UnrecognizedCommand(String),

    /// Recognized command with missing or malformed arguments.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("unsupported file type: .{0}")]
    UnsupportedFileType(String),

    #[error("runtime failed to load: {0}")]
    InitializationFailure(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
