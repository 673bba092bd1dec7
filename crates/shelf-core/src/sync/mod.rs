//! Sync with the remote metadata service
//!
//! The local store is authoritative while offline. A sync run pulls the
//! remote snapshot, merges it into the local store and pushes the merged
//! state back, so both sides converge after a successful run.
//!
//! ## Usage
//!
//! ```ignore
//! let remote = HttpRemote::from_config(&config)?;
//! let engine = SyncEngine::new(store, remote, config.sync_settings());
//! let outcome = engine.run_sync().await?;
//! ```

mod client;
mod diagnostic;
mod engine;
mod error;
mod message;
mod pusher;
pub mod resolver;
mod state;

pub use client::{HttpRemote, RemoteLibrary, SELECTOR_HEADER};
pub use diagnostic::describe_failure;
pub use engine::{SyncEngine, SyncOutcome, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use message::{PushBatch, RemoteSnapshot};
pub use pusher::{BatchPusher, PushReport, DEFAULT_BATCH_SIZE};
pub use resolver::{CollectionReport, MergeAction, MergeReport, TagCollisionPolicy};
pub use state::{OutcomeKind, SyncState};
