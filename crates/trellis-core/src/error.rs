//! Error type shared by the core query surface

use thiserror::Error;

/// Errors surfaced by single-item queries and snapshot handling.
///
/// Missing symbols or modules are never errors; lookups return `Option` or an
/// empty `Vec` instead.
#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Unknown search mode: {mode} (expected \"symbol\" or \"text\")")]
    UnknownSearchMode { mode: String },

    #[error("No text search backend is available: {message}")]
    TextSearchUnavailable { message: String },

    #[error("Snapshot encoding failed: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("Snapshot metadata error: {0}")]
    SnapshotMeta(#[from] serde_json::Error),

    #[error("Snapshot format version {found} does not match expected {expected}")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrellisError {
    pub fn invalid_query(message: impl Into<String>) -> Self {
        TrellisError::InvalidQuery {
            message: message.into(),
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, TrellisError>;
