//! Directory-backed storage.
//!
//! One file per upload in a flat directory. Names are validated before they
//! touch the file system, so a stored file can never land outside the root.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use qkd_proto::http::FileEntry;

use super::{Storage, StorageError, validate_name};

/// Production storage rooted at a directory.
#[derive(Clone, Debug)]
pub struct DirectoryStorage {
    root: Arc<PathBuf>,
}

impl DirectoryStorage {
    /// Open storage at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "directory storage opened");
        Ok(Self { root: Arc::new(root) })
    }

    /// Directory files are stored in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

impl Storage for DirectoryStorage {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<FileEntry>, StorageError> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(self.root.as_path())? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            // Non-UTF-8 names were not uploaded through us
            if let Ok(name) = entry.file_name().into_string() {
                entries.push(FileEntry { name, size: metadata.len() });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(name)?;

        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }
}
