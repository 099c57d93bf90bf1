//! Storage error types.
//!
//! Defines errors that can occur during storage operations:
//! - `NotFound`: Requested file doesn't exist
//! - `InvalidName`: File name is empty or path-like
//! - `Io`: Underlying storage system errors

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// File not found
    #[error("file not found: {0}")]
    NotFound(String),

    /// File name rejected by validation
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// I/O error (file system, lock poisoning)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
