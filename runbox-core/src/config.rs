//! Session configuration, read from TOML.
//!
//! Resolution order (first found wins):
//! 1. `--config <path>` on the command line
//! 2. `$RUNBOX_CONFIG`
//! 3. `config.toml` in the platform config dir (`~/.config/runbox/` on Linux)
//! 4. Built-in defaults
//!
//! A file named explicitly (1 or 2) must exist. The platform file is optional.

use crate::error::{Result, SessionError};
use crate::scrollback::DEFAULT_CAPACITY;

use directories::ProjectDirs;
use runbox_script::PythonConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "RUNBOX_CONFIG";
pub const DEFAULT_PROMPT: &str = "runbox:~/project$ ";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub prompt: String,
    /// Lines kept in scrollback before the oldest is evicted.
    pub scrollback_capacity: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    pub python: PythonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            scrollback_capacity: DEFAULT_CAPACITY,
            log_level: "warn".to_string(),
            python: PythonConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| SessionError::Config(format!("{}: {}", path.display(), e)))
    }

    /// `~/.config/runbox/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "runbox").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Where the interactive terminal writes its log, so log lines never
    /// land on the raw-mode display.
    pub fn log_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "runbox").map(|dirs| dirs.cache_dir().join("runbox.log"))
    }

    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve_from(explicit, env.as_deref(), Self::default_path().as_deref())
    }

    pub fn resolve_from(
        explicit: Option<&Path>,
        env: Option<&Path>,
        platform: Option<&Path>,
    ) -> Result<Self> {
        if let Some(path) = explicit.or(env) {
            tracing::info!(path = %path.display(), "loading config");
            return Self::load(path);
        }
        match platform {
            Some(path) if path.is_file() => {
                tracing::info!(path = %path.display(), "loading config");
                Self::load(path)
            }
            _ => {
                tracing::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }
}
