//! Remote sync
//!
//! - `gateway`: reads and writes the remote collection, failing open
//! - `reconciler`: folds remote quotes into the local repository
//! - `orchestrator`: runs the fetch, reconcile, push cycle on a timer
//!
//! ## Usage
//!
//! ```ignore
//! let gateway = Arc::new(HttpGateway::from_config(&config)?);
//! let orchestrator = Arc::new(SyncOrchestrator::new(
//!     repo,
//!     gateway,
//!     Reconciler::server_wins(),
//!     config.request_timeout(),
//! ));
//! let handle = orchestrator.spawn(config.sync_interval());
//! ```

mod gateway;
mod orchestrator;
mod reconciler;

pub use gateway::{
    map_payload, FetchOutcome, HttpGateway, PushOutcome, RemoteGateway, RemoteMapping,
};
pub use orchestrator::{
    CycleOutcome, SharedRepository, SyncCommand, SyncEvent, SyncHandle, SyncOrchestrator,
    SyncStatus,
};
pub use reconciler::{
    Conflict, ConflictMode, ConflictPolicy, ConflictResolver, MergeReport, Reconciler,
};
