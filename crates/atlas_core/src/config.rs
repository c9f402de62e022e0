//! Application configuration file.
//!
//! # Responsibility
//! - Describe where the database, share database, session file and logs
//!   live, plus the log level and search limit.
//!
//! # Invariants
//! - Every field has a default; a missing file yields `AppConfig::default()`.
//! - Relative paths are resolved by callers against their working directory.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE_PATH: &str = "resource/creature.db";
const DEFAULT_SESSION_PATH: &str = "resource/last_model.txt";
const DEFAULT_SEARCH_LIMIT: u32 = 1000;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config file: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Shared database used by `sync`; unset disables syncing.
    pub share_database_path: Option<PathBuf>,
    pub session_path: PathBuf,
    /// Absolute log directory; unset leaves file logging off.
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub search_limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            share_database_path: None,
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            log_dir: None,
            log_level: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl AppConfig {
    /// Loads a JSON config file, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
