//! File-backed key-value store
//!
//! Each key is stored as its own file under the store directory. Writes go
//! to a temp file first and are renamed into place, so a value file is never
//! left partially written.
//!
//! Storage location: `~/.local/share/quotesync/store/` (configurable via `Config`)

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{KeyValueStore, StorageError, StorageResult};

/// Durable [`KeyValueStore`] rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store in `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDirectory {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;

        match fs::read_to_string(&path) {
            Ok(value) => {
                debug!("Loaded {} bytes for key {}", value.len(), key);
                Ok(Some(value))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::ReadError { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        atomic_write(&path, value.as_bytes())?;
        debug!("Stored {} bytes for key {}", value.len(), key);
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
