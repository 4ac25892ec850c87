//! The embedded-script backend: QuickJS, in process.
//!
//! Stateless: every evaluation gets its own runtime and a fresh global scope.
//! While an evaluation runs, the host console is pointed at the caller's
//! [`OutputSink`]; a [`ConsoleRedirect`] guard puts the previous target back
//! however the evaluation ends.

use crate::adapter::{ExecContext, RunOutcome, RuntimeAdapter, RuntimeStatus};
use crate::error::{AdapterError, Result};
use crate::sink::{Channel, OutputSink};

use async_trait::async_trait;
use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, FromJs, Function, Object, Runtime, Type, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// The host console. Writes to the active redirect target, or to the log
/// when nothing is redirected.
#[derive(Default)]
pub struct ConsoleChannel {
    target: Mutex<Option<Arc<dyn OutputSink>>>,
}

impl std::fmt::Debug for ConsoleChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleChannel")
            .field("redirected", &self.is_redirected())
            .finish()
    }
}

impl ConsoleChannel {
    fn target(&self) -> MutexGuard<'_, Option<Arc<dyn OutputSink>>> {
        self.target.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Point the console at `sink` until the returned guard is dropped.
    pub fn redirect(&self, sink: Arc<dyn OutputSink>) -> ConsoleRedirect<'_> {
        let previous = self.target().replace(sink);
        ConsoleRedirect {
            channel: self,
            previous,
        }
    }

    pub fn is_redirected(&self) -> bool {
        self.target().is_some()
    }

    pub fn write(&self, channel: Channel, text: &str) {
        let target = self.target().clone();
        match target {
            Some(sink) => sink.emit(channel, text),
            None if channel == Channel::Stderr => tracing::warn!("console: {}", text),
            None => tracing::info!("console: {}", text),
        }
    }
}

/// Restores the console's previous target on drop.
pub struct ConsoleRedirect<'a> {
    channel: &'a ConsoleChannel,
    previous: Option<Arc<dyn OutputSink>>,
}

impl Drop for ConsoleRedirect<'_> {
    fn drop(&mut self) {
        *self.channel.target() = self.previous.take();
    }
}

/// What a synchronous evaluation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Completion value of the script, rendered like `console.log` would.
    Returned(String),
    /// The script threw. Holds `Name: message` and the stack when available.
    Threw(String),
}

#[derive(Debug, Default)]
pub struct ScriptRuntime {
    console: Arc<ConsoleChannel>,
}

impl ScriptRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn console(&self) -> &ConsoleChannel {
        &self.console
    }

    /// Evaluate `source` on the calling thread with the console redirected to `sink`.
    pub fn evaluate(&self, source: &str, sink: Arc<dyn OutputSink>) -> Result<Evaluation> {
        evaluate_in(&self.console, source, sink)
    }
}

fn evaluate_in(
    console: &Arc<ConsoleChannel>,
    source: &str,
    sink: Arc<dyn OutputSink>,
) -> Result<Evaluation> {
    let _redirect = console.redirect(sink);

    let runtime = Runtime::new()
        .map_err(|e| AdapterError::Engine(format!("failed to create QuickJS runtime: {}", e)))?;
    let context = Context::full(&runtime)
        .map_err(|e| AdapterError::Engine(format!("failed to create QuickJS context: {}", e)))?;

    context.with(|ctx| {
        install_console(&ctx, console)
            .map_err(|e| AdapterError::Engine(format!("failed to install console: {}", e)))?;

        let mut options = rquickjs::context::EvalOptions::default();
        options.global = true;
        options.strict = false;

        match ctx.eval_with_options::<Value, _>(source.as_bytes(), options) {
            Ok(value) => Ok(Evaluation::Returned(render_value(&ctx, &value))),
            Err(err) => Ok(Evaluation::Threw(describe_error(&ctx, err))),
        }
    })
}

fn install_console(ctx: &Ctx<'_>, console: &Arc<ConsoleChannel>) -> rquickjs::Result<()> {
    let object = Object::new(ctx.clone())?;
    let methods = [
        ("log", Channel::Stdout),
        ("info", Channel::Stdout),
        ("debug", Channel::Stdout),
        ("warn", Channel::Stderr),
        ("error", Channel::Stderr),
    ];
    for (method, channel) in methods {
        let console = Arc::clone(console);
        object.set(
            method,
            Function::new(
                ctx.clone(),
                move |args: Rest<Value>| {
                    let parts: Vec<String> =
                        args.0.iter().map(|v| render_value(v.ctx(), v)).collect();
                    console.write(channel, &parts.join(" "));
                },
            )?,
        )?;
    }
    ctx.globals().set("console", object)?;
    Ok(())
}

fn render_value<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    match value.type_of() {
        Type::Undefined => "undefined".to_string(),
        Type::Null => "null".to_string(),
        Type::Bool => value.as_bool().map(|b| b.to_string()).unwrap_or_default(),
        Type::Int => value.as_int().map(|n| n.to_string()).unwrap_or_default(),
        // JS spelling: `Infinity`, `NaN`, `1e+21`.
        Type::Float => Coerced::<String>::from_js(ctx, value.clone())
            .map(|s| s.0)
            .unwrap_or_default(),
        Type::String => value
            .as_string()
            .and_then(|s| s.to_string().ok())
            .unwrap_or_default(),
        Type::Function | Type::Constructor => "[function]".to_string(),
        Type::Exception => value
            .as_object()
            .and_then(error_text)
            .unwrap_or_else(|| "[error]".to_string()),
        Type::Object | Type::Array => ctx
            .json_stringify(value.clone())
            .ok()
            .flatten()
            .and_then(|s| s.to_string().ok())
            .unwrap_or_else(|| "[object]".to_string()),
        _ => "[object]".to_string(),
    }
}

/// `Name: message` plus the stack, for objects that look like errors.
fn error_text(object: &Object<'_>) -> Option<String> {
    let message: Option<String> = object.get("message").ok();
    let name: Option<String> = object.get("name").ok();
    if message.is_none() && name.is_none() {
        return None;
    }
    let name = name.unwrap_or_else(|| "Error".to_string());
    let message = message.unwrap_or_default();
    let stack: String = object.get("stack").unwrap_or_default();
    if stack.trim().is_empty() {
        Some(format!("{}: {}", name, message))
    } else {
        Some(format!("{}: {}\n{}", name, message, stack.trim_end()))
    }
}

fn describe_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if err.is_exception() {
        let exception = ctx.catch();
        if let Some(text) = exception.as_object().and_then(error_text) {
            return text;
        }
        if !exception.is_undefined() && !exception.is_null() {
            return format!("Uncaught {}", render_value(ctx, &exception));
        }
    }
    err.to_string()
}

#[async_trait]
impl RuntimeAdapter for ScriptRuntime {
    fn name(&self) -> &'static str {
        "quickjs"
    }

    /// Nothing to load; the engine is linked in.
    fn status(&self) -> RuntimeStatus {
        RuntimeStatus::Ready
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn execute_source(
        &self,
        source: &str,
        name: &str,
        ctx: &ExecContext,
    ) -> Result<RunOutcome> {
        // One synchronous call: the cancel flag is never looked at.
        let console = Arc::clone(&self.console);
        let source = source.to_string();
        let sink = Arc::clone(&ctx.sink);
        let evaluation = tokio::task::spawn_blocking(move || evaluate_in(&console, &source, sink))
            .await
            .map_err(|e| AdapterError::Engine(format!("evaluation task failed: {}", e)))??;

        match evaluation {
            Evaluation::Returned(value) => {
                tracing::debug!(script = %name, %value, "script completed");
                Ok(RunOutcome::Completed)
            }
            Evaluation::Threw(trace) => {
                tracing::debug!(script = %name, "script threw");
                ctx.sink.emit(Channel::Stderr, &trace);
                Ok(RunOutcome::Failed)
            }
        }
    }
}
