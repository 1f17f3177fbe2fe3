//! Error types for simlogger.
//!
//! Only conditions that stop an operation are errors. Checksum verification
//! outcomes live in [`crate::fingerprint::VerifyOutcome`], and an incomplete
//! flight plan degrades to default text instead of failing.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for simlogger operations.
#[derive(Error, Debug)]
pub enum Error {
    // === File Errors ===
    /// A file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file could not be created or written.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Session Errors ===
    /// Too few position samples were recorded to produce a log.
    #[error("session too short: {recorded} position records, at least {minimum} required")]
    SessionTooShort {
        /// Number of samples accepted so far.
        recorded: usize,
        /// Minimum required to compose a log.
        minimum: usize,
    },

    /// A replayed telemetry sample has a field outside its valid range.
    #[error("telemetry line {line}: {field} out of range")]
    InvalidTelemetry {
        /// One-based line number in the telemetry input.
        line: usize,
        /// Name of the offending field.
        field: &'static str,
    },

    /// Another log composition is already running for this session.
    #[error("a log is already being composed for this session")]
    CompositionInProgress,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for simlogger operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a read error for `path`.
    #[must_use]
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a write error for `path`.
    #[must_use]
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is a local file problem.
    #[must_use]
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            Self::FileRead { .. } | Self::FileWrite { .. } | Self::DirectoryCreate { .. } | Self::Io(_)
        )
    }

    /// Check if this error only means the session was too short to save.
    ///
    /// Callers autosaving on quit usually discard these silently.
    #[must_use]
    pub fn is_session_too_short(&self) -> bool {
        matches!(self, Self::SessionTooShort { .. })
    }
}
