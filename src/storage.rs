//! Object-store boundary for uploaded report files.
//!
//! The pipeline only needs `put` at upload and `fetch_bytes` in the job; the
//! physical store is behind the `ObjectStore` trait. `FsObjectStore` keeps
//! files under the data directory, `MemoryObjectStore` backs tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage locator: {0}")]
    InvalidLocator(String),

    #[error("Stored object {0} failed its integrity check")]
    Corrupt(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

pub trait ObjectStore: Send + Sync {
    /// Persist `bytes` and return an opaque locator.
    fn put(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError>;

    fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>, StorageError>;

    fn delete(&self, locator: &str) -> Result<(), StorageError>;
}

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Length of the hash prefix embedded in a locator.
const LOCATOR_HASH_LEN: usize = 16;

/// Filesystem store: `<root>/<hh>/<uuid>-<hash16>.<ext>`.
///
/// The embedded hash prefix is re-checked on every fetch.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let valid = !locator.is_empty()
            && !locator.starts_with('/')
            && locator
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..");
        if !valid {
            return Err(StorageError::InvalidLocator(locator.to_string()));
        }
        Ok(self.root.join(locator))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError> {
        let hash = content_hash(bytes);
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin")
            .to_ascii_lowercase();

        let shard = &hash[..2];
        let locator = format!(
            "{shard}/{}-{}.{extension}",
            Uuid::new_v4(),
            &hash[..LOCATOR_HASH_LEN]
        );

        let dir = self.root.join(shard);
        std::fs::create_dir_all(&dir)?;

        // Write to a temp file first so a crash never leaves a half-written object.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.resolve(&locator)?)
            .map_err(|e| StorageError::Io(e.error))?;

        tracing::debug!(locator = %locator, size = bytes.len(), "Object stored");
        Ok(locator)
    }

    fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(locator)?;
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(locator.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let expected = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.rsplit('-').next())
            .ok_or_else(|| StorageError::InvalidLocator(locator.to_string()))?;
        if !content_hash(&bytes).starts_with(expected) {
            return Err(StorageError::Corrupt(locator.to_string()));
        }
        Ok(bytes)
    }

    fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let path = self.resolve(locator)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
impl ObjectStore for MemoryObjectStore {
    fn put(&self, bytes: &[u8], _filename: &str) -> Result<String, StorageError> {
        let locator = format!("mem/{}", Uuid::new_v4());
        self.objects
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(locator.clone(), bytes.to_vec());
        Ok(locator)
    }

    fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }

    fn delete(&self, locator: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .remove(locator);
        Ok(())
    }
}
