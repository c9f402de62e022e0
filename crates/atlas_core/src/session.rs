//! Last-viewed model sidecar file.
//!
//! # Invariants
//! - The file holds one decimal integer and nothing else.
//! - A missing file is not an error; it means no session yet.

use crate::model::identifier::ModelValue;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum SessionError {
    Io(std::io::Error),
    /// File exists but does not hold an integer.
    Corrupt(String),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "session file i/o failed: {err}"),
            Self::Corrupt(content) => write!(f, "session file is corrupt: `{content}`"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Reads and writes the last viewed model value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored raw value, unvalidated.
    ///
    /// Range checks are left to navigation so that a stale value still
    /// resolves through the regular jump path.
    pub fn load(&self) -> Result<Option<i64>, SessionError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let trimmed = content.trim();
        trimmed
            .parse::<i64>()
            .map(Some)
            .map_err(|_| SessionError::Corrupt(trimmed.chars().take(32).collect()))
    }

    pub fn save(&self, value: ModelValue) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, value.to_string())?;
        info!(
            "event=session_save module=session status=ok model_value={}",
            value
        );
        Ok(())
    }
}
