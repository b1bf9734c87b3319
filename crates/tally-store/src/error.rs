//! Error types for object-store operations.

use thiserror::Error;

/// Errors surfaced by [`crate::StorageClient`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {path}")]
    NotFound { path: String },

    /// Refused to read an object above the caller's size limit.
    #[error("too large: {path} is {size} > {limit}")]
    TooLarge { path: String, size: u64, limit: u64 },

    /// The payload handed to the uploader does not match the checksum
    /// the caller computed for it.
    #[error("crc32c mismatch for {path}: computed {computed:#010x}, declared {declared:#010x}")]
    ChecksumMismatch {
        path: String,
        computed: u32,
        declared: u32,
    },

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

impl StoreError {
    /// Returns true if this error indicates a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Map an `object_store` error, attributing NotFound to `path`.
    pub fn from_store(err: object_store::Error, path: &str) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                path: path.to_string(),
            },
            other => StoreError::ObjectStore(other),
        }
    }
}
