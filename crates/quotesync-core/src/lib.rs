//! quotesync core library
//!
//! A local quote collection kept in step with a remote endpoint.
//!
//! # Architecture
//!
//! - **Repository**: the in-memory quote list is the source of truth and is
//!   written through to a key-value store after every mutation
//! - **Sync**: a periodic cycle pulls remote quotes, merges them in and
//!   pushes the local list back. Network failures never reach the caller
//!
//! # Quick Start
//!
//! ```text
//! let store = Arc::new(FileStore::open(config.store_dir())?);
//! let mut repo = QuoteRepository::open(store);
//!
//! repo.add(Quote::new("Stay hungry.", "Motivation")?)?;
//! let quote = repo.random_quote("all");
//! ```
//!
//! # Modules
//!
//! - `repository`: quote list with persistence (main entry point)
//! - `models`: the `Quote` type
//! - `session`: last shown quote and last selected filter
//! - `storage`: key-value stores (file-backed and in-memory)
//! - `sync`: remote gateway, reconciler and sync orchestrator
//! - `config`: application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod session;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use error::{QuoteError, QuoteResult, TransportError};
pub use models::Quote;
pub use repository::{QuoteRepository, ALL_CATEGORIES};
pub use session::SessionState;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
