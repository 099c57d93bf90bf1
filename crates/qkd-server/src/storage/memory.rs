use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};

use qkd_proto::http::FileEntry;

use super::{Storage, StorageError, validate_name};

/// In-memory storage implementation for testing and simulation
///
/// Files live in a `BTreeMap`, so listing is already sorted. State is shared
/// through `Arc<RwLock<_>>`; a poisoned lock is recovered since the map holds
/// no invariants beyond its entries.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Storage for MemoryStorage {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;

        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list(&self) -> Result<Vec<FileEntry>, StorageError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        Ok(files
            .iter()
            .map(|(name, bytes)| FileEntry { name: name.clone(), size: bytes.len() as u64 })
            .collect())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.get(name).cloned().ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let storage = MemoryStorage::new();

        storage.put("scan.txt", b"hello").unwrap();

        assert_eq!(storage.get("scan.txt").unwrap(), b"hello");
        assert_eq!(storage.file_count(), 1);
    }

    #[test]
    fn put_overwrites() {
        let storage = MemoryStorage::new();

        storage.put("scan.txt", b"old").unwrap();
        storage.put("scan.txt", b"newer").unwrap();

        assert_eq!(storage.get("scan.txt").unwrap(), b"newer");
        assert_eq!(storage.list().unwrap(), vec![FileEntry { name: "scan.txt".into(), size: 5 }]);
    }

    #[test]
    fn list_is_sorted_by_name() {
        let storage = MemoryStorage::new();
        storage.put("b", b"22").unwrap();
        storage.put("a", b"1").unwrap();

        let names: Vec<_> = storage.list().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("nope"), Err(StorageError::NotFound("nope".to_string())));
    }

    #[test]
    fn clones_share_files() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();

        clone.put("shared", b"x").unwrap();
        assert_eq!(storage.get("shared").unwrap(), b"x");
    }

    #[test]
    fn invalid_name_is_rejected_before_write() {
        let storage = MemoryStorage::new();

        assert!(matches!(storage.put("../x", b"x"), Err(StorageError::InvalidName(_))));
        assert_eq!(storage.file_count(), 0);
    }
}
