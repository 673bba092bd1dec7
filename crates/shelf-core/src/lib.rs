//! Shelf Core Library
//!
//! This crate provides the core functionality for Shelf, an offline-first
//! digital library that keeps book metadata, tags, annotations and reading
//! sessions in a local database and reconciles them with a remote metadata
//! service.
//!
//! # Architecture
//!
//! - **SQLite**: local source of truth, usable fully offline
//! - **Sync engine**: pull, merge (last-writer-wins), push in batches
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open()?;
//!
//! let book = Book::new("Dune");
//! store.add_book(&book).await?;
//!
//! let outcome = store.sync_engine()?.run_sync().await?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Books, tags, annotations and reading sessions
//! - `hydrate`: Timestamp parsing and formatting across the wire
//! - `storage`: Entity store trait and its SQLite/in-memory implementations
//! - `sync`: Remote client, conflict resolution, batch push, orchestration
//! - `config`: Application configuration

pub mod config;
pub mod hydrate;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;

pub use config::Config;
pub use models::{Annotation, Book, LibraryState, ReadingSession, ReadingStatus, Tag};
pub use storage::{LibraryCounts, LibraryStore, MemoryStore, SharedStore, SqliteStore, StorageError};
pub use store::{LibrarySync, Store};
pub use sync::{SyncEngine, SyncError, SyncOutcome, SyncState};
