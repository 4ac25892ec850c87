pub mod builtins;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod line_editor;
pub mod metrics;
pub mod output;
pub mod runner;
pub mod runtime;
pub mod scrollback;
pub mod state_machine;
pub mod style;
pub mod term;

// Re-export the main struct so users can just use `runbox_core::Session`
pub use engine::Session;

pub use config::Config;
pub use error::{Result, SessionError};
pub use history::CommandHistory;
pub use line_editor::{EditorAction, InputEvent, LineEditor};
pub use metrics::{MetricCallback, MetricEvent, MetricExtractor, MetricSeries, MetricSummary};
pub use output::OutputPipeline;
pub use runner::{Dispatch, Language, RunHandle};
pub use runtime::{Command, CommandParser};
pub use scrollback::{Scrollback, ScrollbackLine};
pub use state_machine::{RunController, RunState};
pub use term::{RecordingSurface, TerminalSurface};

pub use runbox_script::{Channel, RunOutcome, RuntimeStatus};
