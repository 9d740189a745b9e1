//! Storage error handling
//!
//! Provides typed errors for key-value persistence with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Key cannot be mapped to a file name
    #[error("Invalid storage key '{key}': only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidKey { key: String },

    /// Stored value could not be encoded
    #[error("Failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Atomic write failed during rename
    #[error("Atomic write failed: could not rename '{from}' to '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store is unavailable (e.g. poisoned lock)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } => {
                Some("Check file and directory permissions for the quotesync data directory.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
