//! Error types for isokv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using IsoError
pub type Result<T> = std::result::Result<T, IsoError>;

/// Unified error type for isokv operations
#[derive(Debug, Error)]
pub enum IsoError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transaction Errors
    // -------------------------------------------------------------------------
    /// A transaction committed after our snapshot wrote a key we read.
    #[error("Transaction conflict: a concurrently committed transaction wrote a key that was read")]
    Conflict,

    #[error("Empty write batch, nothing to commit")]
    EmptyBatch,

    #[error("Batch already contains the key: {0}")]
    DuplicateKeyInBatch(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Store is stopped, can not perform the operation")]
    StoreStopped,

    #[error("Timed out waiting for timestamp {timestamp}")]
    WaitTimedOut { timestamp: u64 },

    #[error("Wait for timestamp {timestamp} was cancelled")]
    WaitCancelled { timestamp: u64 },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IsoError {
    /// Whether re-running the whole transaction on a fresh snapshot may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IsoError::Conflict)
    }
}
