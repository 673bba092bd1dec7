//! Unified storage interface
//!
//! The `Store` owns the SQLite-backed entity store and hands a shared
//! handle of it to the sync engine. All local actions go through here so
//! that every mutation bumps timestamps the same way.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open()?;
//!
//! let mut book = Book::new("Dune");
//! book.set_author(Some("Frank Herbert".into()));
//! store.add_book(&book).await?;
//!
//! let outcome = store.sync_engine()?.run_sync().await?;
//! ```

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::hydrate;
use crate::models::{Annotation, Book, ReadingSession, Tag};
use crate::storage::{LibraryCounts, LibraryStore, SharedStore, SqliteStore};
use crate::sync::{HttpRemote, SyncEngine, SyncResult, SyncState};

/// Sync engine over the on-disk store and the HTTP remote
pub type LibrarySync = SyncEngine<SqliteStore, HttpRemote>;

/// Unified storage interface for Shelf
pub struct Store {
    inner: SharedStore<SqliteStore>,
    config: Config,
}

impl Store {
    /// Open the store using the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        let sqlite = SqliteStore::open(&config).context("Failed to open SQLite database")?;
        debug!("Opened library at {:?}", config.sqlite_path());
        Ok(Self {
            inner: SharedStore::new(sqlite),
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the entity store
    ///
    /// Engines built over any clone of the handle share one sync flag.
    pub fn shared(&self) -> SharedStore<SqliteStore> {
        self.inner.clone()
    }

    /// Build a sync engine for the configured remote
    ///
    /// Fails with `NotConfigured` when no sync URL is set. Engines built by
    /// repeated calls still reject overlapping runs.
    pub fn sync_engine(&self) -> SyncResult<LibrarySync> {
        let remote = HttpRemote::from_config(&self.config)?;
        let engine = SyncEngine::new(self.shared(), remote, self.config.sync_settings());
        Ok(engine.with_state(self.load_sync_state()))
    }

    /// Persisted sync bookkeeping; unreadable files are replaced
    pub fn load_sync_state(&self) -> SyncState {
        let path = self.config.sync_state_path();
        match SyncState::with_path(path.clone()) {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring unreadable sync state {:?}: {}", path, e);
                let _ = std::fs::remove_file(&path);
                SyncState::with_path(path).unwrap_or_default()
            }
        }
    }

    // ==================== Book Operations ====================

    /// Add a new book
    ///
    /// Returns false without writing when a book with the same file name
    /// already exists.
    pub async fn add_book(&self, book: &Book) -> Result<bool> {
        let mut store = self.inner.lock().await;
        if let Some(file_name) = &book.file_name {
            if let Some(existing) = store.find_book_by_file_name(file_name)? {
                debug!("Skipping {}: already stored as {}", file_name, existing.id);
                return Ok(false);
            }
        }
        store.put_book(book).context("Failed to add book")?;
        Ok(true)
    }

    /// Save changes to an existing book
    pub async fn update_book(&self, book: &Book) -> Result<()> {
        self.inner
            .lock()
            .await
            .put_book(book)
            .context("Failed to update book")
    }

    pub async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        Ok(self.inner.lock().await.get_book(id)?)
    }

    pub async fn find_book_by_file_name(&self, file_name: &str) -> Result<Option<Book>> {
        Ok(self.inner.lock().await.find_book_by_file_name(file_name)?)
    }

    /// All books, ordered by title
    pub async fn get_all_books(&self) -> Result<Vec<Book>> {
        let mut books = self.inner.lock().await.all_books()?;
        books.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(books)
    }

    // ==================== Tag Operations ====================

    /// Get the tag with this name, creating it if needed
    pub async fn ensure_tag(&self, name: &str, color: Option<String>) -> Result<Tag> {
        let mut store = self.inner.lock().await;
        if let Some(existing) = store.find_tag_by_name(name)? {
            return Ok(existing);
        }
        let mut tag = Tag::new(name);
        tag.color = color;
        store.put_tag(&tag).context("Failed to add tag")?;
        Ok(tag)
    }

    pub async fn update_tag(&self, tag: &Tag) -> Result<()> {
        self.inner
            .lock()
            .await
            .put_tag(tag)
            .context("Failed to update tag")
    }

    pub async fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        Ok(self.inner.lock().await.get_tag(id)?)
    }

    /// All tags, ordered by name
    pub async fn get_all_tags(&self) -> Result<Vec<Tag>> {
        let mut tags = self.inner.lock().await.all_tags()?;
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    /// Tags with the number of books filed under each
    pub async fn get_tags_with_counts(&self) -> Result<Vec<(Tag, usize)>> {
        let store = self.inner.lock().await;
        let books = store.all_books()?;
        let mut tags = store.all_tags()?;
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags
            .into_iter()
            .map(|tag| {
                let count = books.iter().filter(|b| b.categories.contains(&tag.id)).count();
                (tag, count)
            })
            .collect())
    }

    // ==================== Annotation Operations ====================

    pub async fn add_annotation(&self, annotation: &Annotation) -> Result<()> {
        self.inner
            .lock()
            .await
            .put_annotation(annotation)
            .context("Failed to add annotation")
    }

    pub async fn get_annotation(&self, id: &str) -> Result<Option<Annotation>> {
        Ok(self.inner.lock().await.get_annotation(id)?)
    }

    /// Live annotations of a book, oldest first
    pub async fn get_annotations(&self, book_id: &str) -> Result<Vec<Annotation>> {
        let mut annotations: Vec<Annotation> = self
            .inner
            .lock()
            .await
            .annotations_for_book(book_id)?
            .into_iter()
            .filter(|a| !a.is_deleted())
            .collect();
        annotations.sort_by_key(|a| a.created_at);
        Ok(annotations)
    }

    /// All live annotations
    pub async fn get_all_annotations(&self) -> Result<Vec<Annotation>> {
        Ok(self
            .inner
            .lock()
            .await
            .all_annotations()?
            .into_iter()
            .filter(|a| !a.is_deleted())
            .collect())
    }

    /// Tombstone an annotation; returns false if it was not found or already deleted
    pub async fn delete_annotation(&self, id: &str) -> Result<bool> {
        let mut store = self.inner.lock().await;
        let Some(mut annotation) = store.get_annotation(id)? else {
            return Ok(false);
        };
        if annotation.is_deleted() {
            return Ok(false);
        }
        annotation.delete();
        store
            .put_annotation(&annotation)
            .context("Failed to delete annotation")?;
        Ok(true)
    }

    // ==================== Reading Sessions ====================

    /// Record a finished reading session ending now
    ///
    /// Also moves the book's `last_read_at` forward.
    pub async fn log_session(
        &self,
        book_id: &str,
        duration_seconds: u32,
        pages_read: Option<u32>,
    ) -> Result<ReadingSession> {
        let mut store = self.inner.lock().await;
        let mut book = store
            .get_book(book_id)?
            .ok_or_else(|| anyhow::anyhow!("Book not found: {}", book_id))?;

        let ended_at = hydrate::now();
        let started_at = ended_at - Duration::seconds(i64::from(duration_seconds));
        let mut session = ReadingSession::new(book_id, started_at, duration_seconds);
        session.pages_read = pages_read;

        store
            .put_reading_session(&session)
            .context("Failed to record reading session")?;
        book.record_reading(ended_at);
        store.put_book(&book).context("Failed to update book")?;
        Ok(session)
    }

    pub async fn get_sessions(&self, book_id: &str) -> Result<Vec<ReadingSession>> {
        let mut sessions: Vec<ReadingSession> = self
            .inner
            .lock()
            .await
            .all_reading_sessions()?
            .into_iter()
            .filter(|s| s.book_id == book_id)
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    // ==================== Stats ====================

    pub async fn counts(&self) -> Result<LibraryCounts> {
        Ok(self.inner.lock().await.counts()?)
    }
}
