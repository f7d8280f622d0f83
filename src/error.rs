//! Error types for Stockbook sync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Only fatal conditions are represented here. Per-record skips during
//! decode or restore are reported through [`crate::sync::RecordError`] and
//! report counters, never through this enum.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stockbook operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,

    // Not Found (exit 3)
    ArchiveNotFound,
    DocumentMissing,

    // Validation (exit 4)
    InvalidArchive,
    InvalidDocument,
    InvalidArgument,

    // Auth (exit 5)
    NotAuthenticated,

    // Sync (exit 6)
    RemoteError,
    Cancelled,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ArchiveNotFound => "ARCHIVE_NOT_FOUND",
            Self::DocumentMissing => "DOCUMENT_MISSING",
            Self::InvalidArchive => "INVALID_ARCHIVE",
            Self::InvalidDocument => "INVALID_DOCUMENT",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::RemoteError => "REMOTE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::DatabaseError => 2,
            Self::ArchiveNotFound | Self::DocumentMissing => 3,
            Self::InvalidArchive | Self::InvalidDocument | Self::InvalidArgument => 4,
            Self::NotAuthenticated => 5,
            Self::RemoteError | Self::Cancelled => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// True for transient remote failures, lock contention and
    /// cancellations. False for malformed input or missing files.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteError | Self::Cancelled | Self::DatabaseError | Self::NotAuthenticated
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that abort a backup or restore operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: no database at {path}")]
    NotInitialized { path: PathBuf },

    #[error("Archive not found: {path}")]
    ArchiveNotFound { path: PathBuf },

    #[error("Archive has no {entry} entry: {path}")]
    DocumentMissing { path: PathBuf, entry: String },

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Invalid backup document: {0}")]
    InvalidDocument(String),

    #[error("Not authenticated: no current user")]
    NotAuthenticated,

    #[error("Remote storage error: {0}")]
    Remote(String),

    #[error("Operation cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::InvalidArchive(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(err.to_string())
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::ArchiveNotFound { .. } => ErrorCode::ArchiveNotFound,
            Self::DocumentMissing { .. } => ErrorCode::DocumentMissing,
            Self::InvalidArchive(_) => ErrorCode::InvalidArchive,
            Self::InvalidDocument(_) => ErrorCode::InvalidDocument,
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { path } => Some(format!(
                "No database at {}. Pass --db or set STOCKBOOK_DB.",
                path.display()
            )),
            Self::ArchiveNotFound { path } => Some(format!(
                "Check the archive path: {}",
                path.display()
            )),
            Self::DocumentMissing { entry, .. } => Some(format!(
                "The archive was not produced by `stockbook backup create` (missing {entry})."
            )),
            Self::NotAuthenticated => Some(
                "Sign in first, or pass --user / set STOCKBOOK_USER for this command.".to_string(),
            ),
            Self::Remote(_) => Some(
                "Check STOCKBOOK_STORAGE_URL and network connectivity, then retry.".to_string(),
            ),
            Self::Cancelled { .. } => {
                Some("Nothing was committed. Run the command again.".to_string())
            }
            Self::InvalidArchive(_)
            | Self::InvalidDocument(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
