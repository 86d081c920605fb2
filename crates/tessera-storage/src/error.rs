//! Error types for tessera-storage

use tessera_core::StoreError;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested blob was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload larger than the configured maximum
    #[error("Blob of {size} bytes exceeds the {max} byte limit")]
    CapacityExceeded { size: u64, max: u64 },

    /// Zero-length payloads are not stored
    #[error("Empty payload")]
    EmptyPayload,

    /// Content identifier that does not name a BLAKE3 blob
    #[error("Invalid content identifier: {0}")]
    InvalidCid(String),

    /// Stored bytes no longer match their hash
    #[error("Hash mismatch for {0}")]
    HashMismatch(String),

    /// Error while encoding or decoding the name index
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}

/// Invalid payloads are rejections; everything else means the store is unusable
impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EmptyPayload | StorageError::CapacityExceeded { .. } => {
                StoreError::Rejected(err.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}
