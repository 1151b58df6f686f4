//! Error types for TideKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TideError
pub type Result<T> = std::result::Result<T, TideError>;

/// Unified error type for TideKV operations
#[derive(Debug, Error)]
pub enum TideError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    #[error("WAL is shutting down")]
    ShuttingDown,

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("not found")]
    KeyNotFound,

    #[error("read-only replica: mutations are accepted only on the master")]
    ReadOnlyReplica,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Replication error: {0}")]
    Replication(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for TideError {
    fn from(err: bincode::Error) -> Self {
        TideError::Serialization(err.to_string())
    }
}
