//! The interpreted-language backend: an external Python interpreter.
//!
//! The interpreter is probed once, asynchronously. Sources are written into a
//! private workspace directory, missing third-party imports are installed on a
//! best-effort basis, and the file is then executed by a small bootstrap that
//! prints any traceback to stderr instead of letting it escape.

use crate::adapter::{ExecContext, RunOutcome, RuntimeAdapter, RuntimeStatus};
use crate::error::{AdapterError, Result};
use crate::imports::scan_imports;
use crate::sink::{Channel, OutputSink};

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Modules that ship with every interpreter and are never handed to pip.
pub const DEFAULT_ALWAYS_AVAILABLE: &[&str] = &[
    "sys",
    "os",
    "math",
    "random",
    "re",
    "json",
    "datetime",
    "collections",
    "itertools",
];

/// Runs the stored file in a fresh `__main__` namespace. Tracebacks go to
/// stderr and turn into a non-zero exit status.
const BOOTSTRAP: &str = r#"
import sys, traceback
_path = sys.argv[1]
sys.argv = sys.argv[1:]
try:
    with open(_path, "r", encoding="utf-8") as _f:
        _code = compile(_f.read(), _path, "exec")
    exec(_code, {"__name__": "__main__", "__file__": _path})
except SystemExit:
    raise
except BaseException:
    traceback.print_exc()
    sys.exit(1)
"#;

const PROBE_IMPORTABLE: &str =
    "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    /// Interpreter executable, looked up on `PATH` when not absolute.
    pub interpreter: String,
    /// Installed during initialization. Failures are logged and ignored.
    pub preload_packages: Vec<String>,
    pub always_available: Vec<String>,
    /// Fixed workspace directory. A temporary one is used when unset.
    pub workspace: Option<PathBuf>,
    /// Install missing imports before each run.
    pub auto_install: bool,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            preload_packages: Vec::new(),
            always_available: DEFAULT_ALWAYS_AVAILABLE
                .iter()
                .map(|s| s.to_string())
                .collect(),
            workspace: None,
            auto_install: true,
        }
    }
}

/// Result of a package installation attempt.
///
/// `Failed` is not an error: execution goes ahead without the module and the
/// code will most likely hit a `ModuleNotFoundError` of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyAvailable,
    Failed(String),
}

#[derive(Debug)]
enum Workspace {
    Temp(TempDir),
    Fixed(PathBuf),
}

impl Workspace {
    fn path(&self) -> &Path {
        match self {
            Workspace::Temp(dir) => dir.path(),
            Workspace::Fixed(path) => path,
        }
    }
}

#[derive(Debug)]
struct Loaded {
    version: String,
    workspace: Workspace,
}

#[derive(Debug)]
enum Handle {
    Uninitialized,
    Loading,
    Ready(Loaded),
    Failed(String),
}

#[derive(Debug)]
pub struct PythonRuntime {
    config: PythonConfig,
    handle: Mutex<Handle>,
    packages: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PythonRuntime {
    pub fn new(config: PythonConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(Handle::Uninitialized),
            packages: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &PythonConfig {
        &self.config
    }

    /// `python --version` output, once ready.
    pub fn version(&self) -> Option<String> {
        match &*lock(&self.handle) {
            Handle::Ready(loaded) => Some(loaded.version.clone()),
            _ => None,
        }
    }

    pub fn workspace(&self) -> Option<PathBuf> {
        match &*lock(&self.handle) {
            Handle::Ready(loaded) => Some(loaded.workspace.path().to_path_buf()),
            _ => None,
        }
    }

    /// Files in the workspace with their sizes, sorted by name.
    pub async fn workspace_files(&self) -> Result<Vec<(String, u64)>> {
        let dir = self.workspace().ok_or(AdapterError::NotReady)?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                files.push((entry.file_name().to_string_lossy().into_owned(), meta.len()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Sorted snapshot of the memoized package set.
    pub fn installed_packages(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.packages).iter().cloned().collect();
        names.sort();
        names
    }

    fn is_known(&self, module: &str) -> bool {
        self.config.always_available.iter().any(|m| m == module)
            || lock(&self.packages).contains(module)
    }

    fn remember(&self, module: &str) {
        lock(&self.packages).insert(module.to_string());
    }

    /// Make `module` importable: memoized, then probed, then installed with pip.
    pub async fn install_package(&self, module: &str) -> InstallOutcome {
        self.install_package_with(module, || {}).await
    }

    /// `install_package`, calling `before_pip` only when pip actually runs.
    async fn install_package_with(&self, module: &str, before_pip: impl FnOnce()) -> InstallOutcome {
        if self.is_known(module) {
            return InstallOutcome::AlreadyAvailable;
        }
        if self.importable(module).await {
            self.remember(module);
            return InstallOutcome::AlreadyAvailable;
        }
        before_pip();
        self.pip_install(module).await
    }

    async fn importable(&self, module: &str) -> bool {
        Command::new(&self.config.interpreter)
            .args(["-c", PROBE_IMPORTABLE, module])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn pip_install(&self, module: &str) -> InstallOutcome {
        let output = Command::new(&self.config.interpreter)
            .args([
                "-m",
                "pip",
                "install",
                "--quiet",
                "--disable-pip-version-check",
                module,
            ])
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                self.remember(module);
                tracing::info!(module, "package installed");
                InstallOutcome::Installed
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let reason = stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .map(|l| l.trim().to_string())
                    .unwrap_or_else(|| format!("pip exited with {}", out.status));
                InstallOutcome::Failed(reason)
            }
            Err(e) => InstallOutcome::Failed(format!("could not run pip: {}", e)),
        }
    }

    /// Installs what `source` imports and is not yet available.
    /// Every failure is swallowed here.
    async fn install_missing(&self, source: &str, sink: &dyn OutputSink) {
        for module in scan_imports(source) {
            let notice = || sink.emit(Channel::System, &format!("⏳ Installing {}...", module));
            match self.install_package_with(&module, notice).await {
                InstallOutcome::Failed(reason) => {
                    tracing::warn!(module = %module, %reason, "package install failed, continuing");
                }
                outcome => tracing::debug!(module = %module, ?outcome, "package ready"),
            }
        }
    }

    async fn load(&self) -> Result<Loaded> {
        let output = Command::new(&self.config.interpreter)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                AdapterError::InitializationFailed(format!(
                    "cannot start `{}`: {}",
                    self.config.interpreter, e
                ))
            })?;

        if !output.status.success() {
            return Err(AdapterError::InitializationFailed(format!(
                "`{} --version` exited with {}",
                self.config.interpreter, output.status
            )));
        }

        // Older interpreters print the version on stderr.
        let raw = if output.stdout.is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        let version = String::from_utf8_lossy(raw).trim().to_string();

        let workspace = match &self.config.workspace {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                Workspace::Fixed(dir.clone())
            }
            None => Workspace::Temp(tempfile::Builder::new().prefix("runbox-").tempdir()?),
        };

        for module in &self.config.preload_packages {
            match self.install_package(module).await {
                InstallOutcome::Failed(reason) => {
                    tracing::warn!(module = %module, %reason, "preload failed");
                }
                outcome => tracing::debug!(module = %module, ?outcome, "preloaded"),
            }
        }

        Ok(Loaded { version, workspace })
    }

    async fn evaluate(&self, path: &Path, workdir: &Path, ctx: &ExecContext) -> Result<RunOutcome> {
        let mut child = Command::new(&self.config.interpreter)
            .arg("-u")
            .arg("-c")
            .arg(BOOTSTRAP)
            .arg(path)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdapterError::Engine("child stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AdapterError::Engine("child stderr was not captured".into()))?;

        // Raw byte lines: output that is not UTF-8 must not stop the drain,
        // or a child blocked on a full pipe never exits.
        let mut out_lines = BufReader::new(stdout).split(b'\n');
        let mut err_lines = BufReader::new(stderr).split(b'\n');
        let (mut out_open, mut err_open) = (true, true);

        while out_open || err_open {
            // Checkpoint: only observed between output lines.
            if ctx.cancel.is_cancelled() {
                tracing::info!(file = %path.display(), "cancellation observed, stopping interpreter");
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Ok(RunOutcome::Cancelled);
            }

            tokio::select! {
                line = out_lines.next_segment(), if out_open => match line {
                    Ok(Some(raw)) => ctx.sink.emit(Channel::Stdout, &decode_line(&raw)),
                    Ok(None) => out_open = false,
                    Err(e) => {
                        tracing::warn!("stdout read failed: {}", e);
                        out_open = false;
                    }
                },
                line = err_lines.next_segment(), if err_open => match line {
                    Ok(Some(raw)) => ctx.sink.emit(Channel::Stderr, &decode_line(&raw)),
                    Ok(None) => err_open = false,
                    Err(e) => {
                        tracing::warn!("stderr read failed: {}", e);
                        err_open = false;
                    }
                },
            }
        }

        let status = child.wait().await?;
        tracing::debug!(file = %path.display(), %status, "interpreter exited");
        Ok(if status.success() {
            RunOutcome::Completed
        } else {
            RunOutcome::Failed
        })
    }
}

/// One output line without its `\r`, invalid UTF-8 replaced with U+FFFD.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Keeps only the final path component so sources never land outside the workspace.
fn workspace_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "main.py".to_string())
}

#[async_trait]
impl RuntimeAdapter for PythonRuntime {
    fn name(&self) -> &'static str {
        "python"
    }

    fn status(&self) -> RuntimeStatus {
        match &*lock(&self.handle) {
            Handle::Uninitialized => RuntimeStatus::Uninitialized,
            Handle::Loading => RuntimeStatus::Loading,
            Handle::Ready(_) => RuntimeStatus::Ready,
            Handle::Failed(reason) => RuntimeStatus::Failed(reason.clone()),
        }
    }

    async fn initialize(&self) -> Result<()> {
        {
            let mut handle = lock(&self.handle);
            if let Handle::Failed(reason) = &*handle {
                return Err(AdapterError::InitializationFailed(reason.clone()));
            }
            if !matches!(*handle, Handle::Uninitialized) {
                tracing::debug!("python runtime already initializing or ready");
                return Ok(());
            }
            *handle = Handle::Loading;
        }

        tracing::info!(interpreter = %self.config.interpreter, "loading python runtime");
        let loaded = self.load().await;

        let mut handle = lock(&self.handle);
        match loaded {
            Ok(loaded) => {
                tracing::info!(
                    version = %loaded.version,
                    workspace = %loaded.workspace.path().display(),
                    "python runtime ready"
                );
                *handle = Handle::Ready(loaded);
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    AdapterError::InitializationFailed(reason) => reason,
                    other => other.to_string(),
                };
                tracing::error!(%reason, "python runtime failed to load");
                *handle = Handle::Failed(reason.clone());
                Err(AdapterError::InitializationFailed(reason))
            }
        }
    }

    async fn execute_source(
        &self,
        source: &str,
        name: &str,
        ctx: &ExecContext,
    ) -> Result<RunOutcome> {
        let workdir = self.workspace().ok_or(AdapterError::NotReady)?;
        let path = workdir.join(workspace_file_name(name));
        tokio::fs::write(&path, source).await?;
        tracing::debug!(file = %path.display(), bytes = source.len(), "source stored");

        if self.config.auto_install {
            self.install_missing(source, ctx.sink.as_ref()).await;
        }

        self.evaluate(&path, &workdir, ctx).await
    }
}
