use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Interactive Python/JavaScript execution terminal.
#[derive(Parser, Debug)]
#[command(name = "runbox", version, about)]
pub struct Cli {
    /// Config file (overrides $RUNBOX_CONFIG and the platform config dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Mode>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Mode {
    /// Run a .py or .js file once, then print a metrics summary
    Run {
        file: PathBuf,

        /// Append every metric event to this file as one JSON object per line
        #[arg(long, value_name = "PATH")]
        metrics_out: Option<PathBuf>,
    },
}
