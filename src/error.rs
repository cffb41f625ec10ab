//! Error types for the write-ahead log
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // Writer Errors
    // -------------------------------------------------------------------------
    #[error("WAL writer is not initialized")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("WAL writer is poisoned: unflushed bytes could not be discarded")]
    Poisoned,

    // -------------------------------------------------------------------------
    // Decode Errors (torn tail candidates)
    // -------------------------------------------------------------------------
    #[error("Corrupt header at offset {offset}: only {available} bytes available")]
    CorruptHeader { offset: u64, available: usize },

    #[error("Truncated payload at offset {offset}: expected {expected} bytes, got {available}")]
    TruncatedPayload {
        offset: u64,
        expected: usize,
        available: usize,
    },

    #[error("Invalid entry tag {tag} at offset {offset}")]
    InvalidTag { offset: u64, tag: u8 },

    #[error("Checksum mismatch at offset {offset}: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { offset: u64, expected: u32, actual: u32 },

    #[error("Malformed payload at offset {offset}: {reason}")]
    MalformedPayload { offset: u64, reason: String },

    // -------------------------------------------------------------------------
    // Recovery Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    // -------------------------------------------------------------------------
    // Database Handle Errors
    // -------------------------------------------------------------------------
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WalError {
    /// True for decode failures that replay treats as the end of valid history.
    pub fn is_torn_tail(&self) -> bool {
        matches!(
            self,
            WalError::CorruptHeader { .. }
                | WalError::TruncatedPayload { .. }
                | WalError::InvalidTag { .. }
                | WalError::ChecksumMismatch { .. }
                | WalError::MalformedPayload { .. }
        )
    }

    /// File offset of the entry a decode error refers to, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            WalError::CorruptHeader { offset, .. }
            | WalError::TruncatedPayload { offset, .. }
            | WalError::InvalidTag { offset, .. }
            | WalError::ChecksumMismatch { offset, .. }
            | WalError::MalformedPayload { offset, .. }
            | WalError::Corruption { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

impl From<bincode::Error> for WalError {
    fn from(err: bincode::Error) -> Self {
        WalError::Serialization(err.to_string())
    }
}
