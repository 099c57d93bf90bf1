//! Blob storage for uploaded files.
//!
//! Trait-based abstraction keyed by file name. The trait is synchronous (no
//! async) to keep backends simple; uploads are small.

mod directory;
mod error;
mod memory;

pub use directory::DirectoryStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use qkd_proto::http::FileEntry;

/// Storage abstraction for uploaded files
///
/// Must be Clone (shared between request handlers), Send + Sync, and
/// synchronous. Implementations share internal state, so clones access the
/// same underlying files.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Store `bytes` under `name`, replacing any previous file of that name.
    ///
    /// # Invariants
    ///
    /// - Pre: `name` passes [`validate_name`]
    /// - Post: `get(name)` returns `bytes`
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// All stored files, sorted by name.
    fn list(&self) -> Result<Vec<FileEntry>, StorageError>;

    /// Contents of `name`.
    ///
    /// Returns [`StorageError::NotFound`] if no such file exists.
    fn get(&self, name: &str) -> Result<Vec<u8>, StorageError>;
}

/// Reject names that are empty or could escape a flat namespace.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let escapes = name == "." || name == ".." || name.contains(['/', '\\', '\0']);
    if name.is_empty() || escapes {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
