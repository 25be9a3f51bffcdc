//! Error types for Bookshelf
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Unified error type for Bookshelf operations
#[derive(Debug, Error)]
pub enum ShelfError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal: the entry file is missing. Absorbed by `select`/`exists`.
    #[error("Entry file not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Book '{0}' has been destroyed")]
    Destroyed(String),

    #[error("Cannot destroy book '{0}': operations are in flight")]
    ConcurrentDestroy(String),

    #[error("Deferred worker terminated before replying")]
    WorkerGone,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShelfError {
    /// True for the internal missing-file case
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShelfError::NotFound(_))
    }
}
