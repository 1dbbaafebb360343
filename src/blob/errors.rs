//! # Blob Store Errors

use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Blob store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    #[error("Binary payload too large: {size} bytes (max: {limit})")]
    SizeLimit { size: u64, limit: u64 },

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlobError {
    pub fn code(&self) -> &'static str {
        match self {
            BlobError::SizeLimit { .. } => "EMBER_SIZE_LIMIT",
            BlobError::NotFound(_) => "EMBER_BLOB_NOT_FOUND",
            BlobError::InvalidPath(_) => "EMBER_BLOB_INVALID_PATH",
            BlobError::Io(_) => "EMBER_BLOB_IO",
            BlobError::Internal(_) => "EMBER_INTERNAL",
        }
    }
}
