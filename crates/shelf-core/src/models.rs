//! Data models for Shelf
//!
//! Defines the four synchronized entity kinds: Book, Tag, Annotation and
//! ReadingSession. Each carries the timestamps the sync engine needs for
//! last-writer-wins merging; annotations are deleted by tombstone only.
//!
//! Field names serialize in camelCase, matching the remote service. Book
//! binary assets (`file_data`, `cover_image`) are local-only and are never
//! serialized.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hydrate;

/// Generate a new entity identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Reading state of a book
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    #[default]
    Unread,
    Reading,
    Finished,
    Abandoned,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Unread => "unread",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Finished => "finished",
            ReadingStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(ReadingStatus::Unread),
            "reading" => Ok(ReadingStatus::Reading),
            "finished" => Ok(ReadingStatus::Finished),
            "abandoned" => Ok(ReadingStatus::Abandoned),
            other => Err(format!("unknown reading status: {}", other)),
        }
    }
}

/// A book in the library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Identifier, stable across replicas
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub status: ReadingStatus,
    /// Percentage read, 0 to 100
    #[serde(default)]
    pub progress: f64,
    /// Reader position (CFI or page marker)
    #[serde(default)]
    pub current_location: Option<String>,
    /// User rating, 1 to 5
    #[serde(default)]
    pub rating: Option<u8>,
    /// Tag ids this book is filed under
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    /// When the book was added (immutable)
    #[serde(with = "hydrate::datetime")]
    pub added_at: DateTime<Utc>,
    /// Last metadata mutation
    #[serde(default, with = "hydrate::option")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last reading activity
    #[serde(default, with = "hydrate::option")]
    pub last_read_at: Option<DateTime<Utc>>,
    /// Book content, local-only
    #[serde(skip)]
    pub file_data: Option<Vec<u8>>,
    /// Embedded cover image, local-only
    #[serde(skip)]
    pub cover_image: Option<Vec<u8>>,
}

impl Book {
    /// Create a new book with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(new_id(), title)
    }

    /// Create a book with a specific ID
    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = hydrate::now();
        Self {
            id: id.into(),
            title: title.into(),
            author: None,
            status: ReadingStatus::Unread,
            progress: 0.0,
            current_location: None,
            rating: None,
            categories: Vec::new(),
            cover_url: None,
            file_name: None,
            file_type: None,
            added_at: now,
            updated_at: Some(now),
            last_read_at: None,
            file_data: None,
            cover_image: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Some(hydrate::bump(self.updated_at));
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    pub fn set_author(&mut self, author: Option<String>) {
        self.author = author;
        self.touch();
    }

    pub fn set_status(&mut self, status: ReadingStatus) {
        self.status = status;
        self.touch();
    }

    /// Update reading progress, clamped to 0..=100
    ///
    /// Reaching 100 marks the book finished; any progress on an unread book
    /// marks it as being read.
    pub fn set_progress(&mut self, progress: f64, location: Option<String>) {
        self.progress = progress.clamp(0.0, 100.0);
        if location.is_some() {
            self.current_location = location;
        }
        if self.progress >= 100.0 {
            self.status = ReadingStatus::Finished;
        } else if self.progress > 0.0 && self.status == ReadingStatus::Unread {
            self.status = ReadingStatus::Reading;
        }
        self.touch();
    }

    /// Set the rating; values outside 1..=5 clear it
    pub fn set_rating(&mut self, rating: Option<u8>) {
        self.rating = rating.filter(|r| (1..=5).contains(r));
        self.touch();
    }

    pub fn add_category(&mut self, tag_id: impl Into<String>) {
        let tag_id = tag_id.into();
        if !self.categories.contains(&tag_id) {
            self.categories.push(tag_id);
            self.touch();
        }
    }

    pub fn remove_category(&mut self, tag_id: &str) {
        if let Some(pos) = self.categories.iter().position(|t| t == tag_id) {
            self.categories.remove(pos);
            self.touch();
        }
    }

    /// Point references to one tag id at another
    ///
    /// Timestamps are left alone: the rewrite mirrors a remote identity
    /// change rather than a user edit. Returns true if anything changed.
    pub fn replace_category(&mut self, old_id: &str, new_id: &str) -> bool {
        if !self.categories.iter().any(|t| t == old_id) {
            return false;
        }
        let mut replaced = Vec::with_capacity(self.categories.len());
        for tag_id in self.categories.drain(..) {
            let tag_id = if tag_id == old_id {
                new_id.to_string()
            } else {
                tag_id
            };
            if !replaced.contains(&tag_id) {
                replaced.push(tag_id);
            }
        }
        self.categories = replaced;
        true
    }

    /// Record reading activity at the given time
    pub fn record_reading(&mut self, at: DateTime<Utc>) {
        self.last_read_at = Some(match self.last_read_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }

    /// Attach the local file content
    pub fn set_file(&mut self, file_name: impl Into<String>, data: Vec<u8>) {
        let file_name = file_name.into();
        self.file_type = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        self.file_name = Some(file_name);
        self.file_data = Some(data);
        self.touch();
    }

    /// Time used for last-writer-wins: the later of `updated_at` and `last_read_at`
    pub fn sync_time(&self) -> DateTime<Utc> {
        hydrate::or_epoch(self.updated_at).max(hydrate::or_epoch(self.last_read_at))
    }

    /// Copy of this book without its binary assets
    pub fn without_binary(&self) -> Self {
        Self {
            file_data: None,
            cover_image: None,
            ..self.clone()
        }
    }

    /// Take over the local-only binary assets of `local`
    pub fn with_local_assets(mut self, local: &Book) -> Self {
        self.file_data = local.file_data.clone();
        self.cover_image = local.cover_image.clone();
        self
    }
}

/// A user-defined tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    /// Display name, unique per user by convention only
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(with = "hydrate::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "hydrate::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(new_id(), name)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = hydrate::now();
        Self {
            id: id.into(),
            name: name.into(),
            color: None,
            created_at: now,
            updated_at: Some(now),
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = Some(hydrate::bump(self.updated_at));
    }

    pub fn set_color(&mut self, color: Option<String>) {
        self.color = color;
        self.updated_at = Some(hydrate::bump(self.updated_at));
    }

    /// Time used for last-writer-wins: `updated_at`, falling back to `created_at`
    pub fn sync_time(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A highlight or note anchored in a book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub book_id: String,
    /// Highlighted text
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Anchor within the book
    #[serde(default)]
    pub cfi: Option<String>,
    #[serde(with = "hydrate::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "hydrate::option")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Tombstone: set when the annotation was deleted
    #[serde(default, with = "hydrate::option")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Annotation {
    pub fn new(book_id: impl Into<String>, text: impl Into<String>) -> Self {
        let now = hydrate::now();
        Self {
            id: new_id(),
            book_id: book_id.into(),
            text: text.into(),
            note: None,
            color: None,
            cfi: None,
            created_at: now,
            updated_at: Some(now),
            deleted_at: None,
        }
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note;
        self.updated_at = Some(hydrate::bump(self.updated_at));
    }

    /// Tombstone the annotation
    ///
    /// The deletion bumps `updated_at` so it wins over stale live copies.
    pub fn delete(&mut self) {
        let at = hydrate::bump(self.updated_at);
        self.deleted_at = Some(at);
        self.updated_at = Some(at);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Time used for last-writer-wins; missing `updated_at` sorts first
    pub fn sync_time(&self) -> DateTime<Utc> {
        hydrate::or_epoch(self.updated_at)
    }
}

/// A completed reading session; immutable once created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    pub id: String,
    pub book_id: String,
    #[serde(with = "hydrate::datetime")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "hydrate::option")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: u32,
    #[serde(default)]
    pub pages_read: Option<u32>,
}

impl ReadingSession {
    /// Create a session that started at `started_at` and lasted `duration_seconds`
    pub fn new(book_id: impl Into<String>, started_at: DateTime<Utc>, duration_seconds: u32) -> Self {
        Self {
            id: new_id(),
            book_id: book_id.into(),
            started_at,
            ended_at: Some(started_at + chrono::Duration::seconds(i64::from(duration_seconds))),
            duration_seconds,
            pages_read: None,
        }
    }
}

/// Full contents of one replica
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryState {
    pub books: Vec<Book>,
    pub tags: Vec<Tag>,
    pub annotations: Vec<Annotation>,
    pub reading_sessions: Vec<ReadingSession>,
}

impl LibraryState {
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
            && self.tags.is_empty()
            && self.annotations.is_empty()
            && self.reading_sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_book_new() {
        let book = Book::new("Dune");
        assert_eq!(book.title, "Dune");
        assert_eq!(book.status, ReadingStatus::Unread);
        assert_eq!(book.updated_at, Some(book.added_at));
        assert!(book.categories.is_empty());
        assert!(book.file_data.is_none());
    }

    #[test]
    fn test_book_set_title_bumps_updated_at() {
        let mut book = Book::new("Dune");
        let original_updated = book.updated_at.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        book.set_title("Dune Messiah");
        assert_eq!(book.title, "Dune Messiah");
        assert!(book.updated_at.unwrap() > original_updated);
    }

    #[test]
    fn test_book_updated_at_never_moves_backwards() {
        let mut book = Book::new("Dune");
        let future = Utc::now() + chrono::Duration::days(2);
        book.updated_at = Some(future);
        book.set_title("Later");
        assert_eq!(book.updated_at, Some(future));
    }

    #[test]
    fn test_book_progress_moves_status() {
        let mut book = Book::new("Dune");
        book.set_progress(12.5, Some("epubcfi(/6/4)".to_string()));
        assert_eq!(book.status, ReadingStatus::Reading);
        assert_eq!(book.current_location.as_deref(), Some("epubcfi(/6/4)"));

        book.set_progress(150.0, None);
        assert_eq!(book.progress, 100.0);
        assert_eq!(book.status, ReadingStatus::Finished);
        assert_eq!(book.current_location.as_deref(), Some("epubcfi(/6/4)"));
    }

    #[test]
    fn test_book_rating_bounds() {
        let mut book = Book::new("Dune");
        book.set_rating(Some(4));
        assert_eq!(book.rating, Some(4));
        book.set_rating(Some(9));
        assert_eq!(book.rating, None);
    }

    #[test]
    fn test_book_categories() {
        let mut book = Book::new("Dune");
        book.add_category("tag-a");
        book.add_category("tag-b");
        book.add_category("tag-a");
        assert_eq!(book.categories, vec!["tag-a", "tag-b"]);

        book.remove_category("tag-a");
        assert_eq!(book.categories, vec!["tag-b"]);
    }

    #[test]
    fn test_book_replace_category_keeps_timestamps() {
        let mut book = Book::new("Dune");
        book.categories = vec!["old".into(), "new".into(), "other".into()];
        let updated = book.updated_at;

        assert!(book.replace_category("old", "new"));
        assert_eq!(book.categories, vec!["new", "other"]);
        assert_eq!(book.updated_at, updated);

        assert!(!book.replace_category("missing", "new"));
    }

    #[test]
    fn test_book_sync_time_uses_latest() {
        let mut book = Book::new("Dune");
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        book.updated_at = Some(early);
        book.last_read_at = Some(late);
        assert_eq!(book.sync_time(), late);

        book.updated_at = None;
        book.last_read_at = None;
        assert_eq!(book.sync_time(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_book_record_reading_monotonic() {
        let mut book = Book::new("Dune");
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        book.record_reading(late);
        book.record_reading(early);
        assert_eq!(book.last_read_at, Some(late));
    }

    #[test]
    fn test_book_set_file_detects_type() {
        let mut book = Book::new("Dune");
        book.set_file("Dune.EPUB", vec![1, 2, 3]);
        assert_eq!(book.file_name.as_deref(), Some("Dune.EPUB"));
        assert_eq!(book.file_type.as_deref(), Some("epub"));
        assert_eq!(book.file_data.as_deref(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_book_serialization_excludes_binary() {
        let mut book = Book::new("Dune");
        book.file_data = Some(vec![0xde, 0xad, 0xbe, 0xef]);
        book.cover_image = Some(vec![0xff, 0xd8]);

        let json = serde_json::to_string(&book).unwrap();
        assert!(!json.contains("fileData"));
        assert!(!json.contains("coverImage"));
        assert!(json.contains("\"addedAt\""));

        let decoded: Book = serde_json::from_str(&json).unwrap();
        assert!(decoded.file_data.is_none());
        assert_eq!(decoded.without_binary(), book.without_binary());
    }

    #[test]
    fn test_book_deserialize_minimal_wire_record() {
        let json = r#"{"id": "b1", "title": "Emma", "addedAt": "2023-05-01T08:00:00Z"}"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.id, "b1");
        assert_eq!(book.status, ReadingStatus::Unread);
        assert!(book.updated_at.is_none());
        assert!(book.categories.is_empty());
    }

    #[test]
    fn test_with_local_assets() {
        let mut local = Book::with_id("b1", "Local");
        local.file_data = Some(vec![1]);
        local.cover_image = Some(vec![2]);

        let remote = Book::with_id("b1", "Remote");
        let merged = remote.with_local_assets(&local);
        assert_eq!(merged.title, "Remote");
        assert_eq!(merged.file_data, Some(vec![1]));
        assert_eq!(merged.cover_image, Some(vec![2]));
    }

    #[test]
    fn test_tag_sync_time_falls_back_to_created() {
        let mut tag = Tag::new("Ciencia");
        tag.updated_at = None;
        assert_eq!(tag.sync_time(), tag.created_at);
        assert_eq!(format!("{}", tag), "Ciencia");
    }

    #[test]
    fn test_annotation_delete_is_tombstone() {
        let mut annotation = Annotation::new("b1", "a quote");
        let before = annotation.updated_at.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        annotation.delete();

        assert!(annotation.is_deleted());
        assert_eq!(annotation.deleted_at, annotation.updated_at);
        assert!(annotation.updated_at.unwrap() > before);
    }

    #[test]
    fn test_reading_session_new() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 20, 0, 0).unwrap();
        let session = ReadingSession::new("b1", start, 1800);
        assert_eq!(
            session.ended_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 20, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_reading_status_parse() {
        assert_eq!("Reading".parse::<ReadingStatus>(), Ok(ReadingStatus::Reading));
        assert!("shelved".parse::<ReadingStatus>().is_err());
        assert_eq!(ReadingStatus::Finished.to_string(), "finished");
    }

    #[test]
    fn test_library_state_is_empty() {
        let mut state = LibraryState::default();
        assert!(state.is_empty());
        state.tags.push(Tag::new("x"));
        assert!(!state.is_empty());
    }
}
