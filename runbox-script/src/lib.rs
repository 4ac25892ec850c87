//! Code-execution backends for runbox.
//!
//! Two adapters share the [`RuntimeAdapter`] interface:
//! - [`PythonRuntime`]: an external interpreter, loaded once, stateful workspace,
//!   best-effort dependency installation.
//! - [`ScriptRuntime`]: embedded QuickJS, stateless and synchronous.

pub mod adapter;
pub mod error;
pub mod imports;
pub mod python;
pub mod quickjs;
pub mod sink;

pub use adapter::{ExecContext, RunOutcome, RuntimeAdapter, RuntimeStatus};
pub use error::{AdapterError, Result};
pub use imports::scan_imports;
pub use python::{InstallOutcome, PythonConfig, PythonRuntime};
pub use quickjs::{ConsoleChannel, ConsoleRedirect, Evaluation, ScriptRuntime};
pub use sink::{CancelFlag, Channel, OutputSink};
