//! In-memory entity store
//!
//! Keeps every collection in a `BTreeMap` keyed by id, so iteration order
//! is stable. Used as the injected store in sync engine tests.

use std::collections::BTreeMap;

use super::error::StorageResult;
use super::LibraryStore;
use crate::models::{Annotation, Book, LibraryState, ReadingSession, Tag};

/// In-memory implementation of [`LibraryStore`]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    books: BTreeMap<String, Book>,
    tags: BTreeMap<String, Tag>,
    annotations: BTreeMap<String, Annotation>,
    reading_sessions: BTreeMap<String, ReadingSession>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with the given state
    pub fn from_state(state: LibraryState) -> Self {
        let mut store = Self::new();
        for book in state.books {
            store.books.insert(book.id.clone(), book);
        }
        for tag in state.tags {
            store.tags.insert(tag.id.clone(), tag);
        }
        for annotation in state.annotations {
            store.annotations.insert(annotation.id.clone(), annotation);
        }
        for session in state.reading_sessions {
            store.reading_sessions.insert(session.id.clone(), session);
        }
        store
    }

    /// Number of mutating calls (put or delete) made so far
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl LibraryStore for MemoryStore {
    fn get_book(&self, id: &str) -> StorageResult<Option<Book>> {
        Ok(self.books.get(id).cloned())
    }

    fn put_book(&mut self, book: &Book) -> StorageResult<()> {
        self.writes += 1;
        self.books.insert(book.id.clone(), book.clone());
        Ok(())
    }

    fn all_books(&self) -> StorageResult<Vec<Book>> {
        Ok(self.books.values().cloned().collect())
    }

    fn find_book_by_file_name(&self, file_name: &str) -> StorageResult<Option<Book>> {
        Ok(self
            .books
            .values()
            .find(|b| b.file_name.as_deref() == Some(file_name))
            .cloned())
    }

    fn get_tag(&self, id: &str) -> StorageResult<Option<Tag>> {
        Ok(self.tags.get(id).cloned())
    }

    fn put_tag(&mut self, tag: &Tag) -> StorageResult<()> {
        self.writes += 1;
        self.tags.insert(tag.id.clone(), tag.clone());
        Ok(())
    }

    fn delete_tag(&mut self, id: &str) -> StorageResult<bool> {
        self.writes += 1;
        Ok(self.tags.remove(id).is_some())
    }

    fn all_tags(&self) -> StorageResult<Vec<Tag>> {
        Ok(self.tags.values().cloned().collect())
    }

    fn find_tag_by_name(&self, name: &str) -> StorageResult<Option<Tag>> {
        Ok(self.tags.values().find(|t| t.name == name).cloned())
    }

    fn get_annotation(&self, id: &str) -> StorageResult<Option<Annotation>> {
        Ok(self.annotations.get(id).cloned())
    }

    fn put_annotation(&mut self, annotation: &Annotation) -> StorageResult<()> {
        self.writes += 1;
        self.annotations
            .insert(annotation.id.clone(), annotation.clone());
        Ok(())
    }

    fn all_annotations(&self) -> StorageResult<Vec<Annotation>> {
        Ok(self.annotations.values().cloned().collect())
    }

    fn annotations_for_book(&self, book_id: &str) -> StorageResult<Vec<Annotation>> {
        Ok(self
            .annotations
            .values()
            .filter(|a| a.book_id == book_id)
            .cloned()
            .collect())
    }

    fn put_reading_session(&mut self, session: &ReadingSession) -> StorageResult<()> {
        self.writes += 1;
        self.reading_sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn all_reading_sessions(&self) -> StorageResult<Vec<ReadingSession>> {
        Ok(self.reading_sessions.values().cloned().collect())
    }
}
