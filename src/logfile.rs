//! Read access to the service log for the webhook and admin log endpoints.

use crate::config::LogRotation;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or truncating the log file.
#[derive(Debug, Error)]
pub enum LogFileError {
    /// Filesystem access failed.
    #[error("log file I/O failed for {path}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Tail of the active log file.
#[derive(Debug, Clone)]
pub struct LogTail {
    /// File the lines were read from.
    pub path: PathBuf,
    /// Most recent lines, oldest first, with surrounding whitespace removed.
    pub lines: Vec<String>,
}

/// Handle on the configured log file, aware of the rolling appender's naming.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    rotation: LogRotation,
}

impl LogFile {
    /// Describe the log file at `path` written with the given rotation.
    pub fn new(path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        Self {
            path: path.into(),
            rotation,
        }
    }

    /// Configured base path (`LOG_FILE`).
    pub fn configured_path(&self) -> &Path {
        &self.path
    }

    /// File currently receiving log lines, if one exists.
    ///
    /// Rolling appenders write `<name>.<date>`; the newest such file wins. Date suffixes sort
    /// lexicographically in chronological order.
    pub async fn active_path(&self) -> Result<Option<PathBuf>, LogFileError> {
        if self.rotation == LogRotation::Never {
            return Ok(exists(&self.path).await?.then(|| self.path.clone()));
        }

        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Some(file_name) = self.path.file_name().and_then(|name| name.to_str()) else {
            return Ok(None);
        };
        let prefix = format!("{file_name}.");

        let mut entries = match tokio::fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LogFileError::Io {
                    path: directory,
                    source,
                });
            }
        };

        let read_error = |source| LogFileError::Io {
            path: directory.clone(),
            source,
        };
        let mut newest: Option<String> = None;
        while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && newest.as_ref().is_none_or(|current| name > *current) {
                newest = Some(name);
            }
        }

        match newest {
            Some(name) => Ok(Some(directory.join(name))),
            None => Ok(exists(&self.path).await?.then(|| self.path.clone())),
        }
    }

    /// Return the last `limit` lines of the active log, or `None` when no log exists yet.
    ///
    /// A `limit` of zero returns the whole file.
    pub async fn tail(&self, limit: usize) -> Result<Option<LogTail>, LogFileError> {
        let Some(path) = self.active_path().await? else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| LogFileError::Io {
                path: path.clone(),
                source,
            })?;
        let contents = String::from_utf8_lossy(&bytes);
        let all: Vec<&str> = contents.lines().collect();
        let start = match limit {
            0 => 0,
            limit => all.len().saturating_sub(limit),
        };
        let lines = all[start..]
            .iter()
            .map(|line| line.trim().to_string())
            .collect();
        Ok(Some(LogTail { path, lines }))
    }

    /// Truncate the active log. Returns `false` when there was nothing to clear.
    pub async fn clear(&self) -> Result<bool, LogFileError> {
        let Some(path) = self.active_path().await? else {
            return Ok(false);
        };
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|source| LogFileError::Io {
                path: path.clone(),
                source,
            })?;
        file.set_len(0)
            .await
            .map_err(|source| LogFileError::Io { path, source })?;
        Ok(true)
    }

    /// Size of the active log in bytes, zero when absent.
    pub async fn size(&self) -> Result<u64, LogFileError> {
        let Some(path) = self.active_path().await? else {
            return Ok(0);
        };
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| LogFileError::Io { path, source })?;
        Ok(metadata.len())
    }
}

async fn exists(path: &Path) -> Result<bool, LogFileError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|source| LogFileError::Io {
            path: path.to_path_buf(),
            source,
        })
}
