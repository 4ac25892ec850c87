use runbox_script::{
    AdapterError, CancelFlag, Channel, Evaluation, ExecContext, OutputSink, PythonConfig,
    PythonRuntime, RunOutcome, RuntimeAdapter, RuntimeStatus, ScriptRuntime,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Collect(Mutex<Vec<(Channel, String)>>);

impl OutputSink for Collect {
    fn emit(&self, channel: Channel, text: &str) {
        self.0.lock().unwrap().push((channel, text.to_string()));
    }
}

impl Collect {
    fn on(&self, channel: Channel) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

fn context() -> (Arc<Collect>, ExecContext) {
    let sink = Arc::new(Collect::default());
    let ctx = ExecContext::new(sink.clone(), CancelFlag::new());
    (sink, ctx)
}

fn python_available() -> bool {
    which::which("python3").is_ok()
}

// ============================================================================
// ScriptRuntime (QuickJS) Tests
// ============================================================================

#[test]
fn test_script_console_log_reaches_sink() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    let result = rt
        .evaluate("console.log('loss:', 0.5, 'epoch', 3);", sink.clone())
        .unwrap();
    assert!(matches!(result, Evaluation::Returned(_)));
    assert_eq!(sink.on(Channel::Stdout), vec!["loss: 0.5 epoch 3"]);
}

#[test]
fn test_script_completion_value() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    assert_eq!(
        rt.evaluate("1 + 1", sink.clone()).unwrap(),
        Evaluation::Returned("2".to_string())
    );
    assert_eq!(
        rt.evaluate("'a' + 'b'", sink).unwrap(),
        Evaluation::Returned("ab".to_string())
    );
}

#[test]
fn test_script_numbers_print_like_js() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    rt.evaluate(
        "console.log(1 / 0, -1 / 0, 0 / 0, 0.5, 1e21, 2 ** 53)",
        sink.clone(),
    )
    .unwrap();
    assert_eq!(
        sink.on(Channel::Stdout),
        vec!["Infinity -Infinity NaN 0.5 1e+21 9007199254740992"]
    );
    assert_eq!(
        rt.evaluate("1 / 0", sink).unwrap(),
        Evaluation::Returned("Infinity".to_string())
    );
}

#[test]
fn test_script_objects_are_logged_as_json() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    rt.evaluate("console.log({a: 1, b: [1, 2]});", sink.clone())
        .unwrap();
    assert_eq!(sink.on(Channel::Stdout), vec![r#"{"a":1,"b":[1,2]}"#]);
}

#[test]
fn test_script_console_error_goes_to_stderr() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    rt.evaluate("console.error('bad'); console.warn('meh');", sink.clone())
        .unwrap();
    assert_eq!(sink.on(Channel::Stderr), vec!["bad", "meh"]);
    assert!(sink.on(Channel::Stdout).is_empty());
}

#[test]
fn test_script_throw_is_reported_and_console_restored() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    let result = rt
        .evaluate("console.log('before'); throw new Error('boom');", sink.clone())
        .unwrap();
    match result {
        Evaluation::Threw(trace) => assert!(trace.contains("Error: boom"), "{}", trace),
        other => panic!("expected Threw, got {:?}", other),
    }
    assert_eq!(sink.on(Channel::Stdout), vec!["before"]);
    assert!(!rt.console().is_redirected());
}

#[test]
fn test_script_thrown_non_error_value() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    match rt.evaluate("throw 'plain string';", sink).unwrap() {
        Evaluation::Threw(trace) => assert!(trace.contains("plain string")),
        other => panic!("expected Threw, got {:?}", other),
    }
}

#[test]
fn test_script_scope_is_fresh_each_call() {
    let rt = ScriptRuntime::new();
    let sink = Arc::new(Collect::default());
    rt.evaluate("var leaked = 42;", sink.clone()).unwrap();
    match rt.evaluate("leaked", sink).unwrap() {
        Evaluation::Threw(trace) => assert!(trace.contains("ReferenceError"), "{}", trace),
        other => panic!("expected ReferenceError, got {:?}", other),
    }
}

#[test]
fn test_script_console_redirect_nests_and_restores() {
    let rt = ScriptRuntime::new();
    let outer: Arc<dyn OutputSink> = Arc::new(Collect::default());
    let inner: Arc<dyn OutputSink> = Arc::new(Collect::default());
    {
        let _outer = rt.console().redirect(outer);
        {
            let _inner = rt.console().redirect(inner);
            assert!(rt.console().is_redirected());
        }
        assert!(rt.console().is_redirected());
    }
    assert!(!rt.console().is_redirected());
}

#[tokio::test]
async fn test_script_adapter_failed_outcome_writes_stderr() {
    let rt = ScriptRuntime::new();
    let (sink, ctx) = context();
    let outcome = rt
        .execute_source("undefinedFunction();", "main.js", &ctx)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Failed);
    let stderr = sink.on(Channel::Stderr).join("\n");
    assert!(stderr.contains("ReferenceError"), "{}", stderr);
    assert!(!rt.console().is_redirected());
}

#[tokio::test]
async fn test_script_adapter_is_always_ready() {
    let rt = ScriptRuntime::new();
    assert_eq!(rt.status(), RuntimeStatus::Ready);
    rt.initialize().await.unwrap();
    let (sink, ctx) = context();
    let outcome = rt
        .execute_source("console.log('hi')", "main.js", &ctx)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(sink.on(Channel::Stdout), vec!["hi"]);
}

#[tokio::test]
async fn test_script_adapter_ignores_cancel_flag() {
    let rt = ScriptRuntime::new();
    let (sink, ctx) = context();
    ctx.cancel.cancel();
    let outcome = rt
        .execute_source("console.log('still runs')", "main.js", &ctx)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(sink.on(Channel::Stdout), vec!["still runs"]);
}

// ============================================================================
// PythonRuntime Tests
// ============================================================================

#[tokio::test]
async fn test_python_execute_before_initialize_is_not_ready() {
    let rt = PythonRuntime::new(PythonConfig::default());
    let (sink, ctx) = context();
    let err = rt
        .execute_source("print(1)", "terminal.py", &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::NotReady));
    assert!(sink.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_python_missing_interpreter_fails_permanently() {
    let rt = PythonRuntime::new(PythonConfig {
        interpreter: "runbox-no-such-python-interpreter".to_string(),
        ..PythonConfig::default()
    });

    let err = rt.initialize().await.unwrap_err();
    assert!(matches!(err, AdapterError::InitializationFailed(_)));
    assert!(matches!(rt.status(), RuntimeStatus::Failed(_)));

    // No retry: the second call reports the same failure.
    let again = rt.initialize().await.unwrap_err();
    assert!(matches!(again, AdapterError::InitializationFailed(_)));

    let (_sink, ctx) = context();
    let err = rt.execute_source("print(1)", "x.py", &ctx).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotReady));
}

#[tokio::test]
async fn test_python_initialize_is_idempotent() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let rt = Arc::new(PythonRuntime::new(PythonConfig::default()));
    let (a, b) = tokio::join!(rt.initialize(), rt.initialize());
    assert!(a.is_ok());
    assert!(b.is_ok());
    rt.initialize().await.unwrap();
    assert_eq!(rt.status(), RuntimeStatus::Ready);
    assert!(rt.version().unwrap().contains("Python"));
}

#[tokio::test]
async fn test_python_stdout_lines_stream_to_sink() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let rt = PythonRuntime::new(PythonConfig::default());
    rt.initialize().await.unwrap();
    let (sink, ctx) = context();
    let outcome = rt
        .execute_source("import json\nprint('a')\nprint(json.dumps([1]))\n", "t.py", &ctx)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(sink.on(Channel::Stdout), vec!["a", "[1]"]);
    assert!(sink.on(Channel::System).is_empty(), "json is allow-listed");
}

#[tokio::test]
async fn test_python_invalid_utf8_line_does_not_end_the_stream() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let rt = PythonRuntime::new(PythonConfig::default());
    rt.initialize().await.unwrap();
    let (sink, ctx) = context();
    let source = "import sys\nprint('before')\nsys.stdout.buffer.write(b'\\xff\\n')\nsys.stdout.flush()\nprint('after')\nsys.stderr.buffer.write(b'\\xfeerr\\n')\nsys.stderr.flush()\nprint('err-after', file=sys.stderr)\n";
    let outcome = rt.execute_source(source, "bytes.py", &ctx).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(sink.on(Channel::Stdout), vec!["before", "\u{FFFD}", "after"]);
    assert_eq!(sink.on(Channel::Stderr), vec!["\u{FFFD}err", "err-after"]);
}

#[tokio::test]
async fn test_python_output_larger_than_pipe_buffer_is_drained() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let rt = PythonRuntime::new(PythonConfig::default());
    rt.initialize().await.unwrap();
    let (sink, ctx) = context();
    let source = "import sys\nsys.stdout.buffer.write(b'\\xff\\n')\nfor i in range(200000):\n    print(i)\n";
    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(60),
        rt.execute_source(source, "flood.py", &ctx),
    )
    .await
    .expect("run did not finish")
    .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    let stdout = sink.on(Channel::Stdout);
    assert_eq!(stdout.len(), 200_001);
    assert_eq!(stdout.last().map(String::as_str), Some("199999"));
}

#[tokio::test]
async fn test_python_exception_becomes_stderr_trace() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let rt = PythonRuntime::new(PythonConfig::default());
    rt.initialize().await.unwrap();
    let (sink, ctx) = context();
    let outcome = rt
        .execute_source("print('start')\n1 / 0\nprint('never')\n", "boom.py", &ctx)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Failed);
    assert_eq!(sink.on(Channel::Stdout), vec!["start"]);
    let stderr = sink.on(Channel::Stderr).join("\n");
    assert!(stderr.contains("Traceback"), "{}", stderr);
    assert!(stderr.contains("ZeroDivisionError"), "{}", stderr);
}

#[tokio::test]
async fn test_python_source_is_written_to_workspace() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let rt = PythonRuntime::new(PythonConfig {
        workspace: Some(dir.path().join("ws")),
        ..PythonConfig::default()
    });
    rt.initialize().await.unwrap();
    let (_sink, ctx) = context();
    rt.execute_source("x = 1\n", "model.py", &ctx).await.unwrap();

    let stored = std::fs::read_to_string(dir.path().join("ws").join("model.py")).unwrap();
    assert_eq!(stored, "x = 1\n");
    let files = rt.workspace_files().await.unwrap();
    assert_eq!(files, vec![("model.py".to_string(), 6)]);
}

#[tokio::test]
async fn test_python_stdlib_import_is_memoized_without_install() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let rt = PythonRuntime::new(PythonConfig::default());
    rt.initialize().await.unwrap();
    let (sink, ctx) = context();
    rt.execute_source("import string\nprint(string.digits)\n", "s.py", &ctx)
        .await
        .unwrap();
    assert!(sink.on(Channel::System).is_empty());
    assert_eq!(rt.installed_packages(), vec!["string".to_string()]);
    assert_eq!(sink.on(Channel::Stdout), vec!["0123456789"]);
}

#[tokio::test]
async fn test_python_cancel_checkpoint() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let rt = PythonRuntime::new(PythonConfig::default());
    rt.initialize().await.unwrap();
    let (_sink, ctx) = context();
    ctx.cancel.cancel();
    let outcome = rt
        .execute_source("while True:\n    print('tick')\n", "loop.py", &ctx)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);
}
