//! Error types for mark.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for mark operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    StorageFault,

    // Not Found (exit 3)
    BookmarkNotFound,
    KeyNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidHostId,
    DuplicateKey,

    // Sync (exit 6)
    CorruptChangeLog,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::StorageFault => "STORAGE_FAULT",
            Self::BookmarkNotFound => "BOOKMARK_NOT_FOUND",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidHostId => "INVALID_HOST_ID",
            Self::DuplicateKey => "DUPLICATE_KEY",
            Self::CorruptChangeLog => "CORRUPT_CHANGE_LOG",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::StorageFault => 2,
            Self::BookmarkNotFound | Self::KeyNotFound => 3,
            Self::InvalidArgument | Self::InvalidHostId | Self::DuplicateKey => 4,
            Self::CorruptChangeLog => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying with corrected input can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::InvalidHostId | Self::DuplicateKey | Self::StorageFault
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in mark operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Version counter exhausted for row {row_id} column {column}")]
    ClockOverflow { row_id: i64, column: String },

    #[error("Bookmark not found: {url}")]
    BookmarkNotFound { url: String },

    #[error("Bookmark not found: {url} (did you mean: {})", similar.join(", "))]
    BookmarkNotFoundSimilar { url: String, similar: Vec<String> },

    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    #[error("Key already exists")]
    DuplicateKey,

    #[error("Invalid host identity '{host}': {reason}")]
    InvalidHostId { host: String, reason: String },

    #[error("Change log from {host} is corrupt: {reason}")]
    CorruptChangeLog { host: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store at {path} could not be prepared: {reason}")]
    StoreLayout { path: PathBuf, reason: String },
}

impl From<SyncError> for Error {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Database(e) => Self::Database(e),
            SyncError::Store(e) => *e,
            SyncError::Io(e) => Self::Io(e),
            SyncError::Json(e) => Self::Json(e),
            SyncError::CorruptChangeLog { host, reason } => Self::CorruptChangeLog {
                host: host.unwrap_or_else(|| "unknown host".to_string()),
                reason,
            },
            SyncError::InvalidHostId { host, reason } => Self::InvalidHostId { host, reason },
        }
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Database(_) | Self::ClockOverflow { .. } => ErrorCode::StorageFault,
            Self::BookmarkNotFound { .. } | Self::BookmarkNotFoundSimilar { .. } => {
                ErrorCode::BookmarkNotFound
            }
            Self::KeyNotFound { .. } => ErrorCode::KeyNotFound,
            Self::DuplicateKey => ErrorCode::DuplicateKey,
            Self::InvalidHostId { .. } => ErrorCode::InvalidHostId,
            Self::CorruptChangeLog { .. } => ErrorCode::CorruptChangeLog,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) | Self::StoreLayout { .. } => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
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
            Self::BookmarkNotFound { url } => Some(format!(
                "No bookmark with URL '{url}'. Use `mark search <terms>` to find the stored URL."
            )),
            Self::BookmarkNotFoundSimilar { similar, .. } => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }
            Self::KeyNotFound { .. } => {
                Some("Use `mark keys list` to see the keys on this host.".to_string())
            }
            Self::DuplicateKey => {
                Some("Generate a fresh key with `mark keys new`.".to_string())
            }
            Self::InvalidHostId { .. } => Some(
                "The host identity names this replica's change file. \
                 Set MARK_HOST_ID (or --host) to a plain file name such as `laptop`."
                    .to_string(),
            ),
            Self::CorruptChangeLog { host, .. } => Some(format!(
                "The change file for '{host}' will be rewritten the next time that host closes its store."
            )),
            Self::StoreLayout { .. } | Self::Config(_) => Some(
                "Point MARK_STORE_LOCATION (or --store) at a writable directory.".to_string(),
            ),
            Self::InvalidArgument(msg) => {
                if msg.contains("query") {
                    Some("Pass at least one search term, e.g. `mark search rust`.".to_string())
                } else if msg.contains("URL") {
                    Some("URLs need a scheme, e.g. https://example.com".to_string())
                } else {
                    None
                }
            }
            Self::Database(_) | Self::ClockOverflow { .. } | Self::Io(_) | Self::Json(_) => None,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        let not_found = Error::BookmarkNotFound {
            url: "https://x.com".into(),
        };
        assert_eq!(not_found.exit_code(), 3);
        assert_eq!(Error::InvalidArgument("query".into()).exit_code(), 4);
        assert_eq!(
            Error::CorruptChangeLog {
                host: "h3".into(),
                reason: "bad header".into()
            }
            .exit_code(),
            6
        );
    }

    #[test]
    fn test_structured_json_has_code_and_hint() {
        let err = Error::BookmarkNotFound {
            url: "https://x.com".into(),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "BOOKMARK_NOT_FOUND");
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("mark search"));
    }

    #[test]
    fn test_sync_error_conversion_keeps_corruption() {
        let err: Error = SyncError::CorruptChangeLog {
            host: Some("h3".into()),
            reason: "checksum mismatch".into(),
        }
        .into();
        assert_eq!(err.error_code(), ErrorCode::CorruptChangeLog);
        assert!(err.to_string().contains("h3"));
    }

    #[test]
    fn test_engine_errors_during_sync_are_storage_faults() {
        let err: Error = SyncError::from(rusqlite::Error::QueryReturnedNoRows).into();
        assert_eq!(err.error_code(), ErrorCode::StorageFault);
        assert_eq!(err.exit_code(), 2);

        let engine = Error::Database(rusqlite::Error::InvalidQuery);
        let wrapped: Error = SyncError::from(engine).into();
        assert_eq!(wrapped.error_code(), ErrorCode::StorageFault);
        assert_eq!(wrapped.exit_code(), 2);
    }

    #[test]
    fn test_store_errors_survive_sync_round_trip() {
        let err: Error = SyncError::from(Error::InvalidArgument("bad".into())).into();
        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_similar_urls_in_message() {
        let err = Error::BookmarkNotFoundSimilar {
            url: "https://x.co".into(),
            similar: vec!["https://x.com".into()],
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("did you mean: https://x.com"));
        assert!(err.hint().unwrap().contains("https://x.com"));
    }
}
