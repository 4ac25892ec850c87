use crate::builtins::{self, human_size, Lines};
use crate::error::{Result, SessionError};
use crate::metrics::MetricCallback;
use crate::output::OutputPipeline;
use crate::runtime::{Command, PythonInvocation};
use crate::state_machine::{RunController, RunGuard};
use crate::style::{self, Tone};
use crate::term::TerminalSurface;

use runbox_script::{
    AdapterError, ExecContext, OutputSink, PythonRuntime, RunOutcome, RuntimeAdapter,
    ScriptRuntime,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Workspace file name for `python -c` code.
pub const INLINE_SOURCE_NAME: &str = "terminal.py";

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    JavaScript,
}

impl Language {
    /// `py` → Python, `js`/`javascript` → JavaScript, by the text after the
    /// last dot (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "py" => Ok(Language::Python),
            "js" | "javascript" => Ok(Language::JavaScript),
            _ => Err(SessionError::UnsupportedFileType(ext)),
        }
    }
}

/// One piece of code to run under the single-flight guard.
pub struct RunRequest {
    pub language: Language,
    pub source: String,
    pub name: String,
    pub on_metric: Option<MetricCallback>,
    /// Frame the output with an "Executing" header, rules and a footer.
    pub announce: bool,
}

/// A run in flight. Awaiting it yields the outcome once the session is
/// back to `Idle`.
#[derive(Debug)]
pub struct RunHandle(JoinHandle<RunOutcome>);

impl RunHandle {
    pub async fn wait(self) -> RunOutcome {
        self.0.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "run task did not finish");
            RunOutcome::Failed
        })
    }
}

/// What a dispatched command turned into.
#[derive(Debug)]
pub enum Dispatch {
    /// Blank line.
    Nothing,
    /// Handled in place; the prompt is already back.
    Local,
    /// A run was started in the background. It redraws the prompt when done.
    Started(RunHandle),
}

/// Routes parsed commands and owns everything a run touches.
pub struct Runner {
    prompt: String,
    output: Arc<OutputPipeline>,
    controller: Arc<RunController>,
    python: Arc<PythonRuntime>,
    script: Arc<ScriptRuntime>,
}

impl Runner {
    pub fn new(
        prompt: impl Into<String>,
        output: Arc<OutputPipeline>,
        controller: Arc<RunController>,
        python: Arc<PythonRuntime>,
        script: Arc<ScriptRuntime>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            output,
            controller,
            python,
            script,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn output(&self) -> &Arc<OutputPipeline> {
        &self.output
    }

    pub fn controller(&self) -> &Arc<RunController> {
        &self.controller
    }

    pub fn python(&self) -> &Arc<PythonRuntime> {
        &self.python
    }

    pub fn script(&self) -> &Arc<ScriptRuntime> {
        &self.script
    }

    fn surface(&self) -> &Arc<dyn TerminalSurface> {
        self.output.surface()
    }

    pub fn show_prompt(&self) {
        self.surface().write(&style::prompt(&self.prompt));
    }

    fn show(&self, lines: Lines) {
        for (tone, text) in lines {
            self.output.system(tone, &text);
        }
    }

    /// Wipe the display and the scrollback behind it.
    pub fn clear_terminal(&self) {
        self.surface().clear();
        self.output.clear_scrollback();
    }

    // ----------------------------------------------------------------
    // Command routing
    // ----------------------------------------------------------------

    /// Act on a parsed command. Every failure has been reported on the
    /// terminal before it is returned.
    pub async fn dispatch(self: &Arc<Self>, command: Command) -> Result<Dispatch> {
        match command {
            Command::Python(invocation) => self.python_command(invocation),
            Command::Node(invocation) => {
                let installed = self.python.installed_packages();
                self.show(builtins::node_lines(&invocation, &installed));
                Ok(Dispatch::Local)
            }
            Command::ListDir => self.list_dir().await.map(|_| Dispatch::Local),
            Command::Pwd => self.pwd().map(|_| Dispatch::Local),
            Command::Clear => {
                self.clear_terminal();
                Ok(Dispatch::Local)
            }
            Command::Help => {
                self.show(builtins::help_lines());
                Ok(Dispatch::Local)
            }
            Command::Unrecognized(cmd) => {
                self.output.system(
                    Tone::Warning,
                    &format!("⚠ Command not found or not supported: {}", cmd),
                );
                self.output
                    .system(Tone::Plain, "Type \"help\" for available commands");
                Err(SessionError::UnrecognizedCommand(cmd))
            }
        }
    }

    fn python_command(self: &Arc<Self>, invocation: PythonInvocation) -> Result<Dispatch> {
        match invocation {
            PythonInvocation::Inline(code) => {
                let handle = self.start_run(RunRequest {
                    language: Language::Python,
                    source: code,
                    name: INLINE_SOURCE_NAME.to_string(),
                    on_metric: None,
                    announce: false,
                })?;
                Ok(Dispatch::Started(handle))
            }
            PythonInvocation::Module(module) => {
                self.output.system(
                    Tone::Warning,
                    &format!("⚠ Module execution not supported: {}", module),
                );
                Err(SessionError::UnsupportedCommand(format!("python -m {}", module)))
            }
            PythonInvocation::File(file) => {
                self.output
                    .system(Tone::Warning, "⚠ File execution requires file upload");
                Err(SessionError::UnsupportedCommand(format!("python {}", file)))
            }
            PythonInvocation::Repl => {
                self.output
                    .system(Tone::Warning, ">>> (Python REPL not supported)");
                Err(SessionError::UnsupportedCommand("python REPL".to_string()))
            }
            PythonInvocation::Invalid => {
                self.output.system(Tone::Error, "✘ Invalid Python command");
                Err(SessionError::InvalidCommand("python".to_string()))
            }
        }
    }

    fn python_not_ready(&self) -> SessionError {
        self.output.system(Tone::Error, "✘ Python not ready");
        SessionError::RuntimeNotReady
    }

    async fn list_dir(&self) -> Result<()> {
        let files = match self.python.workspace_files().await {
            Ok(files) => files,
            Err(AdapterError::NotReady) => return Err(self.python_not_ready()),
            Err(e) => {
                self.output.system(Tone::Error, &format!("✘ Error: {}", e));
                return Err(SessionError::Io(std::io::Error::other(e.to_string())));
            }
        };

        self.output.system(Tone::Info, "📁 Project files:");
        if files.is_empty() {
            self.output.system(Tone::Plain, "  (empty)");
        }
        for (name, size) in files {
            self.output
                .system(Tone::Plain, &format!("  {:<22} {}", name, human_size(size)));
        }
        Ok(())
    }

    fn pwd(&self) -> Result<()> {
        let dir = self.python.workspace().ok_or_else(|| self.python_not_ready())?;
        self.output.system(Tone::Plain, &dir.display().to_string());
        Ok(())
    }

    // ----------------------------------------------------------------
    // Runs
    // ----------------------------------------------------------------

    /// Programmatic entry: pick the runtime by extension and run `source`
    /// with a header and footer.
    pub fn run_file(
        self: &Arc<Self>,
        filename: &str,
        source: String,
        on_metric: Option<MetricCallback>,
    ) -> Result<RunHandle> {
        let language = Language::from_filename(filename).inspect_err(|e| {
            if let SessionError::UnsupportedFileType(ext) = e {
                self.output
                    .system(Tone::Error, &format!("✘ Unsupported file type: .{}", ext));
            }
        })?;
        self.start_run(RunRequest {
            language,
            source,
            name: filename.to_string(),
            on_metric,
            announce: true,
        })
    }

    /// Claim the run slot and drive the request on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_run(self: &Arc<Self>, request: RunRequest) -> Result<RunHandle> {
        if request.language == Language::Python && !self.python.is_ready() {
            return Err(self.python_not_ready());
        }

        let guard = self.controller.try_begin().inspect_err(|_| {
            tracing::warn!(name = %request.name, "run rejected, another run is active");
            self.output
                .system(Tone::Warning, "⚠ Code is already running");
        })?;

        tracing::info!(name = %request.name, language = ?request.language, "run started");
        let runner = Arc::clone(self);
        Ok(RunHandle(tokio::spawn(async move {
            runner.drive(request, guard).await
        })))
    }

    async fn drive(&self, request: RunRequest, guard: RunGuard) -> RunOutcome {
        let metrics = self.output.attach_metrics(request.on_metric.clone());

        if request.announce {
            self.output.blank();
            self.output
                .system(Tone::Heading, &format!("▶ Executing: {}", request.name));
            self.output.system(Tone::Plain, &"─".repeat(RULE_WIDTH));
        }

        let sink: Arc<dyn OutputSink> = self.output.clone();
        let ctx = ExecContext::new(sink, guard.cancel_flag());
        let adapter: &dyn RuntimeAdapter = match request.language {
            Language::Python => self.python.as_ref(),
            Language::JavaScript => self.script.as_ref(),
        };

        let outcome = match adapter
            .execute_source(&request.source, &request.name, &ctx)
            .await
        {
            Ok(outcome) => outcome,
            Err(AdapterError::NotReady) => {
                self.output.system(Tone::Error, "✘ Python engine not ready");
                RunOutcome::Failed
            }
            Err(e) => {
                tracing::error!(runtime = adapter.name(), error = %e, "adapter error");
                self.output.system(Tone::Error, &format!("✘ Error: {}", e));
                RunOutcome::Failed
            }
        };

        if outcome == RunOutcome::Cancelled {
            self.output.system(Tone::Warning, "⚠ Execution cancelled");
        }
        if request.announce {
            self.output.system(Tone::Plain, &"─".repeat(RULE_WIDTH));
            if outcome != RunOutcome::Cancelled {
                self.output.system(Tone::Success, "✔ Execution completed");
            }
        }

        tracing::info!(name = %request.name, ?outcome, "run finished");
        drop(metrics);
        drop(guard);
        self.show_prompt();
        outcome
    }

    // ----------------------------------------------------------------
    // Python runtime loading
    // ----------------------------------------------------------------

    /// Bring the interpreter up, narrating progress on the terminal.
    pub async fn load_python(&self) -> Result<()> {
        self.output
            .system(Tone::Warning, "⏳ Loading Python environment...");
        let preload = &self.python.config().preload_packages;
        if !preload.is_empty() {
            self.output.system(
                Tone::Warning,
                &format!("⏳ Pre-loading packages: {}", preload.join(", ")),
            );
        }

        match self.python.initialize().await {
            Ok(()) => {
                if let Some(version) = self.python.version() {
                    self.output.system(Tone::Plain, &version);
                }
                self.output.system(Tone::Success, "✔ Python 3 kernel ready");
                self.output
                    .system(Tone::Info, "▶ Type your Python code or run a file");
                self.output.blank();
                self.show_prompt();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "python runtime failed to load");
                self.output
                    .system(Tone::Error, &format!("✘ Failed to load Python: {}", e));
                self.output
                    .system(Tone::Warning, "ℹ JavaScript execution still available");
                self.show_prompt();
                Err(SessionError::InitializationFailure(e.to_string()))
            }
        }
    }
}
