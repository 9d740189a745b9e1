//! Storage layer
//!
//! Quotes and preferences are persisted through an opaque string key-value
//! interface ([`KeyValueStore`]).
//!
//! ## Implementations
//!
//! - [`FileStore`]: durable, one file per key, atomic writes
//! - [`MemoryStore`]: process-scoped, used for session state and tests

mod error;
mod file;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Synchronous get/set storage keyed by string
///
/// Values are opaque strings; callers decide the encoding.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}
