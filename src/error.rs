//! Error types for env-comparison runs.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for infrastructure failures.
///
/// Per-package failures (a test command exiting non-zero, failing to launch,
/// or timing out) are not errors: they are recorded as
/// [`RunOutcome`](crate::runner::RunOutcome) values in the report.
#[derive(Error, Debug)]
pub enum Error {
    /// A root or namespace directory could not be listed.
    #[error("failed to discover packages in {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report file could not be created, written or flushed.
    #[error("failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error outside of discovery and reporting.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Run configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Command template could not be parsed or rendered.
    #[error("invalid command template: {0}")]
    Template(String),

    /// A concurrent unit of work panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl Error {
    /// Returns true if this error was raised because a directory does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Discovery { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias for env-comparison operations.
pub type Result<T> = std::result::Result<T, Error>;
