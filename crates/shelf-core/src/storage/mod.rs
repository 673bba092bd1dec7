//! Storage layer
//!
//! The local entity store: one keyed collection per entity kind, accessed
//! through the [`LibraryStore`] trait so the sync engine can run against
//! either the on-disk store or an in-memory fake.
//!
//! ## Implementations
//!
//! - [`SqliteStore`]: persistent store backed by SQLite
//! - [`MemoryStore`]: in-memory store, used by tests
//!
//! Annotations and reading sessions have no delete operation: annotations
//! are removed by tombstone and sessions are append-only.

pub mod error;
pub mod memory;
pub mod persistence;
pub mod schema;
pub mod shared;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use persistence::atomic_write;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use shared::SharedStore;
pub use sqlite::SqliteStore;

use serde::Serialize;

use crate::models::{Annotation, Book, LibraryState, ReadingSession, Tag};

/// Record counts per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryCounts {
    pub books: usize,
    pub tags: usize,
    /// Live annotations (tombstones excluded)
    pub annotations: usize,
    pub reading_sessions: usize,
}

/// Keyed access to the four local collections
///
/// Every `put_*` is an upsert by id. Implementations apply each call on its
/// own; there is no transaction spanning several calls.
pub trait LibraryStore: Send {
    // ==================== Books ====================

    fn get_book(&self, id: &str) -> StorageResult<Option<Book>>;

    fn put_book(&mut self, book: &Book) -> StorageResult<()>;

    fn all_books(&self) -> StorageResult<Vec<Book>>;

    fn find_book_by_file_name(&self, file_name: &str) -> StorageResult<Option<Book>>;

    // ==================== Tags ====================

    fn get_tag(&self, id: &str) -> StorageResult<Option<Tag>>;

    fn put_tag(&mut self, tag: &Tag) -> StorageResult<()>;

    /// Remove a tag; returns false if it did not exist
    fn delete_tag(&mut self, id: &str) -> StorageResult<bool>;

    fn all_tags(&self) -> StorageResult<Vec<Tag>>;

    fn find_tag_by_name(&self, name: &str) -> StorageResult<Option<Tag>>;

    // ==================== Annotations ====================

    fn get_annotation(&self, id: &str) -> StorageResult<Option<Annotation>>;

    fn put_annotation(&mut self, annotation: &Annotation) -> StorageResult<()>;

    /// All annotations, tombstones included
    fn all_annotations(&self) -> StorageResult<Vec<Annotation>>;

    /// Annotations of one book, tombstones included
    fn annotations_for_book(&self, book_id: &str) -> StorageResult<Vec<Annotation>>;

    // ==================== Reading sessions ====================

    fn put_reading_session(&mut self, session: &ReadingSession) -> StorageResult<()>;

    fn all_reading_sessions(&self) -> StorageResult<Vec<ReadingSession>>;

    // ==================== Provided ====================

    /// Load every collection
    fn load_state(&self) -> StorageResult<LibraryState> {
        Ok(LibraryState {
            books: self.all_books()?,
            tags: self.all_tags()?,
            annotations: self.all_annotations()?,
            reading_sessions: self.all_reading_sessions()?,
        })
    }

    fn counts(&self) -> StorageResult<LibraryCounts> {
        Ok(LibraryCounts {
            books: self.all_books()?.len(),
            tags: self.all_tags()?.len(),
            annotations: self
                .all_annotations()?
                .iter()
                .filter(|a| !a.is_deleted())
                .count(),
            reading_sessions: self.all_reading_sessions()?.len(),
        })
    }
}
