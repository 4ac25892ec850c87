use crate::config::Config;
use crate::error::Result;
use crate::history::CommandHistory;
use crate::line_editor::{EditorAction, InputEvent, LineEditor};
use crate::metrics::MetricCallback;
use crate::output::OutputPipeline;
use crate::runner::{Dispatch, RunHandle, Runner};
use crate::runtime::CommandParser;
use crate::scrollback::ScrollbackLine;
use crate::state_machine::{RunController, RunState};
use crate::style::Tone;
use crate::term::{TerminalSurface, NEWLINE};

use chrono::{DateTime, Utc};
use runbox_script::{PythonRuntime, RuntimeAdapter, RuntimeStatus, ScriptRuntime};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

const BANNER: [&str; 3] = [
    "╔════════════════════════════════════════╗",
    "║     runbox Execution Engine Ready      ║",
    "╚════════════════════════════════════════╝",
];

/// One interactive terminal session.
///
/// The front end feeds it [`InputEvent`]s; everything visible goes to the
/// [`TerminalSurface`] it was built with. Runs execute on background tasks,
/// so the session keeps taking input while code runs.
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    runner: Arc<Runner>,
    editor: LineEditor,
    history: CommandHistory,
}

impl Session {
    pub fn new(config: Config, surface: Arc<dyn TerminalSurface>) -> Self {
        let output = Arc::new(OutputPipeline::new(surface, config.scrollback_capacity));
        let runner = Runner::new(
            config.prompt.clone(),
            output,
            Arc::new(RunController::new()),
            Arc::new(PythonRuntime::new(config.python)),
            Arc::new(ScriptRuntime::new()),
        );
        let id = Uuid::new_v4();
        tracing::info!(session = %id, "session created");

        Self {
            id,
            created_at: Utc::now(),
            runner: Arc::new(runner),
            editor: LineEditor::new(config.prompt),
            history: CommandHistory::new(),
        }
    }

    /// Create the session, print the banner and load Python in the
    /// background. Must be called from within a tokio runtime.
    pub fn start(config: Config, surface: Arc<dyn TerminalSurface>) -> Self {
        let session = Self::new(config, surface);
        session.banner();

        let runner = Arc::clone(&session.runner);
        tokio::spawn(async move {
            // Already reported on the terminal.
            let _ = runner.load_python().await;
        });
        session
    }

    pub fn banner(&self) {
        for line in BANNER {
            self.runner.output().system(Tone::Banner, line);
        }
    }

    /// Load the Python runtime and wait for it.
    pub async fn initialize_runtime(&self) -> Result<()> {
        self.runner.load_python().await
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ---- Input ----

    pub async fn handle_event(&mut self, event: InputEvent) -> Result<Dispatch> {
        let surface = Arc::clone(self.runner.output().surface());
        match self
            .editor
            .handle(event, &mut self.history, surface.as_ref())
        {
            EditorAction::None => Ok(Dispatch::Nothing),
            EditorAction::Submit(line) => self.submit(&line).await,
            EditorAction::Interrupt => {
                self.interrupt();
                Ok(Dispatch::Nothing)
            }
        }
    }

    /// Route one command line. Non-blank lines are recorded in history
    /// whether or not the command succeeds.
    pub async fn submit(&mut self, line: &str) -> Result<Dispatch> {
        let Some(command) = CommandParser::parse(line) else {
            self.runner.show_prompt();
            return Ok(Dispatch::Nothing);
        };

        self.history.push(line.trim());
        tracing::debug!(session = %self.id, ?command, "dispatching");

        let result = self.runner.dispatch(command).await;
        if let Err(e) = &result {
            tracing::debug!(session = %self.id, error = %e, "command failed");
        }
        if !matches!(result, Ok(Dispatch::Started(_))) {
            self.runner.show_prompt();
        }
        result
    }

    /// Ctrl+C. Raises the cancel flag if something runs; the adapter decides
    /// when (and whether) it notices.
    pub fn interrupt(&mut self) {
        self.editor.clear();
        self.history.reset_browse();
        let surface = self.runner.output().surface();
        if self.runner.controller().request_cancel() {
            surface.write_line("^C");
        } else {
            surface.write(NEWLINE);
        }
        self.runner.show_prompt();
    }

    // ---- Programmatic runs ----

    /// Run `source` as if it were the file `filename`. The extension picks
    /// the runtime; `on_metric` receives metric events while this run lasts.
    pub fn run(
        &self,
        filename: &str,
        source: impl Into<String>,
        on_metric: Option<MetricCallback>,
    ) -> Result<RunHandle> {
        self.runner.run_file(filename, source.into(), on_metric)
    }

    // ---- Queries ----

    pub fn is_running(&self) -> bool {
        self.runner.controller().is_running()
    }

    pub fn state(&self) -> RunState {
        self.runner.controller().state()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.runner.controller().subscribe()
    }

    pub fn scrollback(&self) -> Vec<ScrollbackLine> {
        self.runner.output().scrollback()
    }

    pub fn clear_terminal(&self) {
        self.runner.clear_terminal();
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn buffer(&self) -> &str {
        self.editor.buffer()
    }

    pub fn python_status(&self) -> RuntimeStatus {
        self.runner.python().status()
    }

    pub fn installed_packages(&self) -> Vec<String> {
        self.runner.python().installed_packages()
    }

    pub fn show_prompt(&self) {
        self.runner.show_prompt();
    }
}
