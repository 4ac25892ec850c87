use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{Event, EventStream};
use futures::StreamExt;

use runbox_bridge::cli::{Cli, Mode};
use runbox_bridge::export::MetricsRecorder;
use runbox_bridge::keyboard::{map_key, KeyAction};
use runbox_bridge::surface::{CrosstermSurface, RawMode};
use runbox_bridge::util::{init_tracing, init_tracing_to_file, install_panic_hook};
use runbox_core::{Config, Language, RunOutcome, Session, TerminalSurface};

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref()).context("failed to load configuration")?;
    match cli.command {
        None => init_tracing_to_file(&config.log_level, Config::log_path().as_deref()),
        Some(_) => init_tracing(&config.log_level),
    }
    install_panic_hook();

    match cli.command {
        None => {
            interactive(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Mode::Run { file, metrics_out }) => {
            let outcome = run_once(config, &file, metrics_out.as_deref()).await?;
            Ok(if outcome.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn interactive(config: Config) -> Result<()> {
    let _raw = RawMode::enter().context("cannot switch the terminal to raw mode")?;
    let surface = Arc::new(CrosstermSurface::new());
    let mut session = Session::start(config, surface.clone());
    tracing::info!(session = %session.id(), "interactive session started");

    let mut events = EventStream::new();
    let mut state_rx = session.subscribe();

    loop {
        tokio::select! {
            maybe_event = events.next() => {
                let key = match maybe_event {
                    Some(Ok(Event::Key(key))) => key,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e).context("terminal input failed"),
                    None => break,
                };
                match map_key(&key) {
                    Some(KeyAction::Input(input)) => {
                        // Failures are already on screen.
                        if let Err(e) = session.handle_event(input).await {
                            tracing::debug!(error = %e, "command failed");
                        }
                    }
                    Some(KeyAction::ClearScreen) => {
                        session.clear_terminal();
                        session.show_prompt();
                    }
                    Some(KeyAction::Quit) => break,
                    None => {}
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                surface.show_state(state);
            }
        }
    }

    surface.write_line("");
    Ok(())
}

/// `runbox run FILE`: one framed run, then the metrics summary.
async fn run_once(config: Config, file: &Path, metrics_out: Option<&Path>) -> Result<RunOutcome> {
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let surface = Arc::new(CrosstermSurface::new());
    let session = Session::new(config, surface.clone());

    if Language::from_filename(&filename)? == Language::Python {
        session
            .initialize_runtime()
            .await
            .context("Python runtime is unavailable")?;
    }

    let recorder = MetricsRecorder::new(metrics_out)?;
    let outcome = session
        .run(&filename, source, Some(recorder.callback()))?
        .wait()
        .await;
    recorder.flush()?;

    for line in recorder.summary_lines() {
        surface.write_line(&line);
    }
    tracing::info!(file = %filename, ?outcome, "run finished");
    Ok(outcome)
}
