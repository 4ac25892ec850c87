use runbox_core::runner::Dispatch;
use runbox_core::{
    Channel, Config, InputEvent, MetricCallback, MetricEvent, RecordingSurface, RunOutcome,
    RunState, RuntimeStatus, Session, SessionError,
};
use runbox_script::PythonConfig;
use std::sync::{Arc, Mutex};

fn session_with(config: Config) -> (Arc<RecordingSurface>, Session) {
    let surface = Arc::new(RecordingSurface::new());
    let session = Session::new(config, surface.clone());
    (surface, session)
}

fn session() -> (Arc<RecordingSurface>, Session) {
    session_with(Config::default())
}

fn texts(session: &Session) -> Vec<String> {
    session.scrollback().into_iter().map(|l| l.text).collect()
}

fn collector() -> (Arc<Mutex<Vec<MetricEvent>>>, MetricCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: MetricCallback = Arc::new(move |e: MetricEvent| sink.lock().unwrap().push(e));
    (seen, callback)
}

fn python_available() -> bool {
    which::which("python3").is_ok()
}

const BUSY_JS: &str = "let s = 0; for (let i = 0; i < 2000000; i++) { s += i; } console.log('done');";

// ============================================================================
// Line editor + router
// ============================================================================

#[tokio::test]
async fn test_typed_characters_become_the_submitted_command() {
    let (surface, mut session) = session();
    for c in "help".chars() {
        session.handle_event(InputEvent::Char(c)).await.unwrap();
    }
    assert_eq!(session.buffer(), "help");

    let dispatch = session.handle_event(InputEvent::Enter).await.unwrap();
    assert!(matches!(dispatch, Dispatch::Local));
    assert_eq!(session.history().entries(), &["help".to_string()]);
    assert_eq!(session.buffer(), "");
    assert!(surface.transcript().starts_with("help\r\n"));
    assert!(texts(&session).iter().any(|l| l.contains("Terminal Help")));
}

#[tokio::test]
async fn test_history_round_trip_through_the_session() {
    let (_surface, mut session) = session();
    session.submit("ls").await.ok();

    session.handle_event(InputEvent::HistoryPrev).await.unwrap();
    assert_eq!(session.buffer(), "ls");
    session.handle_event(InputEvent::HistoryNext).await.unwrap();
    assert_eq!(session.buffer(), "");
    assert_eq!(session.history().browse_index(), None);
}

#[tokio::test]
async fn test_blank_line_is_not_recorded() {
    let (surface, mut session) = session();
    let dispatch = session.submit("   ").await.unwrap();
    assert!(matches!(dispatch, Dispatch::Nothing));
    assert!(session.history().is_empty());
    assert!(session.scrollback().is_empty());
    assert!(surface.transcript().contains("runbox:~/project$ "));
}

#[tokio::test]
async fn test_unrecognized_command_is_recorded_and_reported() {
    let (_surface, mut session) = session();
    let err = session.submit("cargo build").await.unwrap_err();
    assert!(matches!(err, SessionError::UnrecognizedCommand(ref c) if c == "cargo"));
    assert_eq!(session.history().entries(), &["cargo build".to_string()]);
    let lines = texts(&session);
    assert!(lines[0].contains("Command not found or not supported: cargo"));
    assert!(lines[1].contains("help"));
}

#[tokio::test]
async fn test_python_module_and_file_are_unsupported_even_when_not_ready() {
    let (_surface, mut session) = session();
    assert!(matches!(
        session.submit("python -m http.server").await,
        Err(SessionError::UnsupportedCommand(_))
    ));
    assert!(matches!(
        session.submit("python3 train.py").await,
        Err(SessionError::UnsupportedCommand(_))
    ));
    assert!(matches!(
        session.submit("python").await,
        Err(SessionError::UnsupportedCommand(_))
    ));
    assert!(matches!(
        session.submit("python -c").await,
        Err(SessionError::InvalidCommand(_))
    ));
}

#[tokio::test]
async fn test_npm_and_node_stubs() {
    let (_surface, mut session) = session();
    session.submit("npm").await.unwrap();
    session.submit("npm run build").await.unwrap();
    session.submit("node").await.unwrap();
    let lines = texts(&session);
    assert!(lines.contains(&"npm ERR! missing script".to_string()));
    assert!(lines.contains(&"ℹ Script not found in package.json".to_string()));
    assert!(lines.contains(&"(Node REPL not supported)".to_string()));
}

#[tokio::test]
async fn test_clear_wipes_display_and_scrollback() {
    let (surface, mut session) = session();
    session.submit("help").await.unwrap();
    assert!(!session.scrollback().is_empty());
    session.submit("clear").await.unwrap();
    assert_eq!(surface.clear_count(), 1);
    assert!(session.scrollback().is_empty());
}

// ============================================================================
// Session controller
// ============================================================================

#[tokio::test]
async fn test_python_before_ready_is_runtime_not_ready() {
    let (_surface, mut session) = session();
    assert_eq!(session.python_status(), RuntimeStatus::Uninitialized);

    let err = session.submit(r#"python -c "print(1)""#).await.unwrap_err();
    assert!(matches!(err, SessionError::RuntimeNotReady));
    assert_eq!(session.state(), RunState::Idle);
    assert_eq!(texts(&session), vec!["✘ Python not ready".to_string()]);
}

#[tokio::test]
async fn test_second_run_is_rejected_while_first_is_running() {
    let (_surface, session) = session();
    let first = session.run("busy.js", BUSY_JS, None).unwrap();
    assert!(session.is_running());

    let second = session.run("other.js", "console.log('never')", None);
    assert!(matches!(second, Err(SessionError::AlreadyRunning)));

    assert_eq!(first.wait().await, RunOutcome::Completed);
    assert!(!session.is_running());
    let lines = texts(&session);
    assert!(lines.contains(&"⚠ Code is already running".to_string()));
    assert!(lines.contains(&"done".to_string()));
    assert!(!lines.contains(&"never".to_string()));
}

#[tokio::test]
async fn test_throw_midway_still_returns_to_idle() {
    let (_surface, session) = session();
    let handle = session
        .run(
            "main.js",
            "console.log('a'); throw new Error('x'); console.log('b');",
            None,
        )
        .unwrap();
    assert_eq!(handle.wait().await, RunOutcome::Failed);
    assert_eq!(session.state(), RunState::Idle);

    let lines = session.scrollback();
    assert!(lines.iter().any(|l| l.text == "a" && l.channel == Channel::Stdout));
    assert!(lines
        .iter()
        .any(|l| l.channel == Channel::Stderr && l.text.contains("Error: x")));
    assert!(!lines.iter().any(|l| l.text == "b"));
    assert_eq!(lines.last().unwrap().text, "✔ Execution completed");

    // The slot is free again.
    let again = session.run("ok.js", "console.log('ok')", None).unwrap();
    assert_eq!(again.wait().await, RunOutcome::Completed);
}

#[tokio::test]
async fn test_run_frames_output_with_header_and_rules() {
    let (_surface, session) = session();
    session
        .run("hello.js", "console.log('hi')", None)
        .unwrap()
        .wait()
        .await;
    let lines = texts(&session);
    let rule = "─".repeat(50);
    assert_eq!(
        lines,
        vec![
            "▶ Executing: hello.js".to_string(),
            rule.clone(),
            "hi".to_string(),
            rule,
            "✔ Execution completed".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let (_surface, session) = session();
    let err = session.run("main.rb", "puts 1", None).unwrap_err();
    assert!(matches!(err, SessionError::UnsupportedFileType(ref ext) if ext == "rb"));
    assert!(!session.is_running());
    assert_eq!(texts(&session), vec!["✘ Unsupported file type: .rb".to_string()]);
}

#[tokio::test]
async fn test_interrupt_while_running_sets_flag_but_script_finishes() {
    let (surface, mut session) = session();
    let handle = session.run("busy.js", BUSY_JS, None).unwrap();
    session.interrupt();
    assert!(surface.transcript().contains("^C\r\n"));

    // The embedded runtime never checks the flag.
    assert_eq!(handle.wait().await, RunOutcome::Completed);
    assert_eq!(session.state(), RunState::Idle);
}

#[tokio::test]
async fn test_interrupt_while_idle_only_redraws_prompt() {
    let (surface, mut session) = session();
    for c in "pw".chars() {
        session.handle_event(InputEvent::Char(c)).await.unwrap();
    }
    session.handle_event(InputEvent::Interrupt).await.unwrap();
    assert_eq!(session.buffer(), "");
    assert!(!surface.transcript().contains("^C"));
    assert!(surface.transcript().ends_with("runbox:~/project$ \x1b[0m"));
}

#[tokio::test]
async fn test_state_changes_are_published() {
    let (_surface, session) = session();
    let rx = session.subscribe();
    let handle = session.run("a.js", "1", None).unwrap();
    assert_eq!(*rx.borrow(), RunState::Running);
    handle.wait().await;
    assert_eq!(*rx.borrow(), RunState::Idle);
}

// ============================================================================
// Output pipeline + metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_reach_the_callback_of_the_active_run_only() {
    let (_surface, session) = session();
    let (seen, callback) = collector();

    let outcome = session
        .run(
            "train.js",
            "console.log('epoch 1 loss: 0.5'); console.log('accuracy 0.9');",
            Some(callback),
        )
        .unwrap()
        .wait()
        .await;
    assert_eq!(outcome, RunOutcome::Completed);

    session
        .run("later.js", "console.log('loss 0.1')", None)
        .unwrap()
        .wait()
        .await;

    let events = seen.lock().unwrap();
    let got: Vec<(String, f64)> = events.iter().map(|e| (e.kind.clone(), e.value)).collect();
    assert_eq!(
        got,
        vec![
            ("loss".to_string(), 0.5),
            ("epoch".to_string(), 1.0),
            ("accuracy".to_string(), 0.9),
        ]
    );
}

#[tokio::test]
async fn test_scrollback_never_exceeds_capacity() {
    let (_surface, session) = session_with(Config {
        scrollback_capacity: 5,
        ..Config::default()
    });
    session
        .run(
            "many.js",
            "for (let i = 0; i < 20; i++) console.log('line ' + i);",
            None,
        )
        .unwrap()
        .wait()
        .await;
    let lines = texts(&session);
    assert_eq!(lines.len(), 5);
    assert_eq!(lines.last().unwrap(), "✔ Execution completed");
}

// ============================================================================
// Python runtime through the session
// ============================================================================

#[tokio::test]
async fn test_failed_python_load_leaves_javascript_usable() {
    let (_surface, mut session) = session_with(Config {
        python: PythonConfig {
            interpreter: "runbox-no-such-python-interpreter".to_string(),
            ..PythonConfig::default()
        },
        ..Config::default()
    });

    let err = session.initialize_runtime().await.unwrap_err();
    assert!(matches!(err, SessionError::InitializationFailure(_)));
    assert!(matches!(session.python_status(), RuntimeStatus::Failed(_)));
    assert!(texts(&session).contains(&"ℹ JavaScript execution still available".to_string()));

    assert!(matches!(
        session.submit("python -c 1").await,
        Err(SessionError::RuntimeNotReady)
    ));
    let outcome = session
        .run("still.js", "console.log('js ok')", None)
        .unwrap()
        .wait()
        .await;
    assert_eq!(outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_python_inline_command_runs_and_lists_workspace() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let (_surface, mut session) = session();
    session.initialize_runtime().await.unwrap();
    assert_eq!(session.python_status(), RuntimeStatus::Ready);

    let dispatch = session.submit(r#"python -c "print(6 * 7)""#).await.unwrap();
    let Dispatch::Started(handle) = dispatch else {
        panic!("expected a run to start");
    };
    assert_eq!(handle.wait().await, RunOutcome::Completed);
    assert!(texts(&session).contains(&"42".to_string()));

    session.submit("ls").await.unwrap();
    assert!(texts(&session).iter().any(|l| l.contains("terminal.py")));
    session.submit("pwd").await.unwrap();
}

#[tokio::test]
async fn test_python_run_extracts_metrics() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let (_surface, session) = session();
    session.initialize_runtime().await.unwrap();
    let (seen, callback) = collector();
    let source = "for e in range(2):\n    print(f'epoch {e} val_loss: {0.5 - e / 10}')\n";
    let outcome = session
        .run("train.py", source, Some(callback))
        .unwrap()
        .wait()
        .await;
    assert_eq!(outcome, RunOutcome::Completed);

    let kinds: Vec<String> = seen.lock().unwrap().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(kinds, vec!["epoch", "val_loss", "epoch", "val_loss"]);
}
