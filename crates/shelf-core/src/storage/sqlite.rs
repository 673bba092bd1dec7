//! SQLite entity store
//!
//! Persistent implementation of [`LibraryStore`]. Each entity is one row;
//! book categories are kept as a JSON array and timestamps as epoch
//! milliseconds. Writes are single-statement upserts, so every `put_*`
//! is atomic on its own and nothing spans collections.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Params, Row};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use super::LibraryStore;
use crate::config::Config;
use crate::hydrate::{from_millis, to_millis};
use crate::models::{Annotation, Book, ReadingSession, ReadingStatus, Tag};

const BOOK_COLUMNS: &str = "id, title, author, status, progress, current_location, rating, \
     categories, cover_url, file_name, file_type, file_data, cover_image, added_at, \
     updated_at, last_read_at";

const TAG_COLUMNS: &str = "id, name, color, created_at, updated_at";

const ANNOTATION_COLUMNS: &str =
    "id, book_id, text, note, color, cfi, created_at, updated_at, deleted_at";

const SESSION_COLUMNS: &str = "id, book_id, started_at, ended_at, duration_seconds, pages_read";

/// SQLite-backed entity store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at the configured location
    pub fn open(config: &Config) -> StorageResult<Self> {
        let path = config.sqlite_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(&path)?;
        debug!("Opened library database at {:?}", path);
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        Ok(Self { conn })
    }

    fn query_books<P: Params>(&self, sql: &str, params: P) -> StorageResult<Vec<Book>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, BookRow::from_row)?;

        let mut books = Vec::new();
        for row in rows {
            books.push(row?.into_book()?);
        }
        Ok(books)
    }

    fn query_tags<P: Params>(&self, sql: &str, params: P) -> StorageResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, TagRow::from_row)?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?.into_tag()?);
        }
        Ok(tags)
    }

    fn query_annotations<P: Params>(&self, sql: &str, params: P) -> StorageResult<Vec<Annotation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, AnnotationRow::from_row)?;

        let mut annotations = Vec::new();
        for row in rows {
            annotations.push(row?.into_annotation()?);
        }
        Ok(annotations)
    }

    fn query_sessions<P: Params>(&self, sql: &str, params: P) -> StorageResult<Vec<ReadingSession>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, SessionRow::from_row)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }
}

impl LibraryStore for SqliteStore {
    fn get_book(&self, id: &str) -> StorageResult<Option<Book>> {
        let sql = format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS);
        Ok(self.query_books(&sql, params![id])?.into_iter().next())
    }

    fn put_book(&mut self, book: &Book) -> StorageResult<()> {
        let categories = serde_json::to_string(&book.categories)?;
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO books ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                BOOK_COLUMNS
            ),
            params![
                book.id,
                book.title,
                book.author,
                book.status.as_str(),
                book.progress,
                book.current_location,
                book.rating,
                categories,
                book.cover_url,
                book.file_name,
                book.file_type,
                book.file_data,
                book.cover_image,
                to_millis(&book.added_at),
                book.updated_at.as_ref().map(to_millis),
                book.last_read_at.as_ref().map(to_millis),
            ],
        )?;
        Ok(())
    }

    fn all_books(&self) -> StorageResult<Vec<Book>> {
        let sql = format!("SELECT {} FROM books ORDER BY added_at, id", BOOK_COLUMNS);
        self.query_books(&sql, [])
    }

    fn find_book_by_file_name(&self, file_name: &str) -> StorageResult<Option<Book>> {
        let sql = format!(
            "SELECT {} FROM books WHERE file_name = ?1 ORDER BY added_at LIMIT 1",
            BOOK_COLUMNS
        );
        Ok(self.query_books(&sql, params![file_name])?.into_iter().next())
    }

    fn get_tag(&self, id: &str) -> StorageResult<Option<Tag>> {
        let sql = format!("SELECT {} FROM tags WHERE id = ?1", TAG_COLUMNS);
        Ok(self.query_tags(&sql, params![id])?.into_iter().next())
    }

    fn put_tag(&mut self, tag: &Tag) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO tags ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
                TAG_COLUMNS
            ),
            params![
                tag.id,
                tag.name,
                tag.color,
                to_millis(&tag.created_at),
                tag.updated_at.as_ref().map(to_millis),
            ],
        )?;
        Ok(())
    }

    fn delete_tag(&mut self, id: &str) -> StorageResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn all_tags(&self) -> StorageResult<Vec<Tag>> {
        let sql = format!("SELECT {} FROM tags ORDER BY name, id", TAG_COLUMNS);
        self.query_tags(&sql, [])
    }

    fn find_tag_by_name(&self, name: &str) -> StorageResult<Option<Tag>> {
        let sql = format!(
            "SELECT {} FROM tags WHERE name = ?1 ORDER BY created_at LIMIT 1",
            TAG_COLUMNS
        );
        Ok(self.query_tags(&sql, params![name])?.into_iter().next())
    }

    fn get_annotation(&self, id: &str) -> StorageResult<Option<Annotation>> {
        let sql = format!("SELECT {} FROM annotations WHERE id = ?1", ANNOTATION_COLUMNS);
        Ok(self.query_annotations(&sql, params![id])?.into_iter().next())
    }

    fn put_annotation(&mut self, annotation: &Annotation) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO annotations ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                ANNOTATION_COLUMNS
            ),
            params![
                annotation.id,
                annotation.book_id,
                annotation.text,
                annotation.note,
                annotation.color,
                annotation.cfi,
                to_millis(&annotation.created_at),
                annotation.updated_at.as_ref().map(to_millis),
                annotation.deleted_at.as_ref().map(to_millis),
            ],
        )?;
        Ok(())
    }

    fn all_annotations(&self) -> StorageResult<Vec<Annotation>> {
        let sql = format!(
            "SELECT {} FROM annotations ORDER BY created_at, id",
            ANNOTATION_COLUMNS
        );
        self.query_annotations(&sql, [])
    }

    fn annotations_for_book(&self, book_id: &str) -> StorageResult<Vec<Annotation>> {
        let sql = format!(
            "SELECT {} FROM annotations WHERE book_id = ?1 ORDER BY created_at, id",
            ANNOTATION_COLUMNS
        );
        self.query_annotations(&sql, params![book_id])
    }

    fn put_reading_session(&mut self, session: &ReadingSession) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO reading_sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                SESSION_COLUMNS
            ),
            params![
                session.id,
                session.book_id,
                to_millis(&session.started_at),
                session.ended_at.as_ref().map(to_millis),
                session.duration_seconds,
                session.pages_read,
            ],
        )?;
        Ok(())
    }

    fn all_reading_sessions(&self) -> StorageResult<Vec<ReadingSession>> {
        let sql = format!(
            "SELECT {} FROM reading_sessions ORDER BY started_at, id",
            SESSION_COLUMNS
        );
        self.query_sessions(&sql, [])
    }
}

// ==================== Row mapping ====================

fn timestamp(
    table: &'static str,
    column: &'static str,
    millis: i64,
) -> StorageResult<DateTime<Utc>> {
    from_millis(millis)
        .ok_or_else(|| StorageError::invalid(table, column, format!("out of range: {}", millis)))
}

fn optional_timestamp(
    table: &'static str,
    column: &'static str,
    millis: Option<i64>,
) -> StorageResult<Option<DateTime<Utc>>> {
    millis.map(|m| timestamp(table, column, m)).transpose()
}

struct BookRow {
    id: String,
    title: String,
    author: Option<String>,
    status: String,
    progress: f64,
    current_location: Option<String>,
    rating: Option<u8>,
    categories: String,
    cover_url: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    file_data: Option<Vec<u8>>,
    cover_image: Option<Vec<u8>>,
    added_at: i64,
    updated_at: Option<i64>,
    last_read_at: Option<i64>,
}

impl BookRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            status: row.get(3)?,
            progress: row.get(4)?,
            current_location: row.get(5)?,
            rating: row.get(6)?,
            categories: row.get(7)?,
            cover_url: row.get(8)?,
            file_name: row.get(9)?,
            file_type: row.get(10)?,
            file_data: row.get(11)?,
            cover_image: row.get(12)?,
            added_at: row.get(13)?,
            updated_at: row.get(14)?,
            last_read_at: row.get(15)?,
        })
    }

    fn into_book(self) -> StorageResult<Book> {
        let status = self
            .status
            .parse::<ReadingStatus>()
            .map_err(|e| StorageError::invalid("books", "status", e))?;
        let categories = serde_json::from_str(&self.categories)
            .map_err(|e| StorageError::invalid("books", "categories", e.to_string()))?;

        Ok(Book {
            id: self.id,
            title: self.title,
            author: self.author,
            status,
            progress: self.progress,
            current_location: self.current_location,
            rating: self.rating,
            categories,
            cover_url: self.cover_url,
            file_name: self.file_name,
            file_type: self.file_type,
            added_at: timestamp("books", "added_at", self.added_at)?,
            updated_at: optional_timestamp("books", "updated_at", self.updated_at)?,
            last_read_at: optional_timestamp("books", "last_read_at", self.last_read_at)?,
            file_data: self.file_data,
            cover_image: self.cover_image,
        })
    }
}

struct TagRow {
    id: String,
    name: String,
    color: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
}

impl TagRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn into_tag(self) -> StorageResult<Tag> {
        Ok(Tag {
            id: self.id,
            name: self.name,
            color: self.color,
            created_at: timestamp("tags", "created_at", self.created_at)?,
            updated_at: optional_timestamp("tags", "updated_at", self.updated_at)?,
        })
    }
}

struct AnnotationRow {
    id: String,
    book_id: String,
    text: String,
    note: Option<String>,
    color: Option<String>,
    cfi: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
    deleted_at: Option<i64>,
}

impl AnnotationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            book_id: row.get(1)?,
            text: row.get(2)?,
            note: row.get(3)?,
            color: row.get(4)?,
            cfi: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            deleted_at: row.get(8)?,
        })
    }

    fn into_annotation(self) -> StorageResult<Annotation> {
        Ok(Annotation {
            id: self.id,
            book_id: self.book_id,
            text: self.text,
            note: self.note,
            color: self.color,
            cfi: self.cfi,
            created_at: timestamp("annotations", "created_at", self.created_at)?,
            updated_at: optional_timestamp("annotations", "updated_at", self.updated_at)?,
            deleted_at: optional_timestamp("annotations", "deleted_at", self.deleted_at)?,
        })
    }
}

struct SessionRow {
    id: String,
    book_id: String,
    started_at: i64,
    ended_at: Option<i64>,
    duration_seconds: u32,
    pages_read: Option<u32>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            book_id: row.get(1)?,
            started_at: row.get(2)?,
            ended_at: row.get(3)?,
            duration_seconds: row.get(4)?,
            pages_read: row.get(5)?,
        })
    }

    fn into_session(self) -> StorageResult<ReadingSession> {
        Ok(ReadingSession {
            id: self.id,
            book_id: self.book_id,
            started_at: timestamp("reading_sessions", "started_at", self.started_at)?,
            ended_at: optional_timestamp("reading_sessions", "ended_at", self.ended_at)?,
            duration_seconds: self.duration_seconds,
            pages_read: self.pages_read,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_open_creates_database_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().join("nested"),
            ..Config::default()
        };

        let _store = SqliteStore::open(&config).unwrap();
        assert!(config.sqlite_path().exists());
    }

    #[test]
    fn test_book_round_trip_keeps_every_field() {
        let mut store = store();

        let mut book = Book::new("The Left Hand of Darkness");
        book.set_author(Some("Ursula K. Le Guin".to_string()));
        book.set_progress(42.0, Some("epubcfi(/6/14)".to_string()));
        book.set_rating(Some(5));
        book.add_category("tag-1");
        book.cover_url = Some("covers/lhod.jpg".to_string());
        book.set_file("lhod.epub", vec![1, 2, 3, 4]);
        book.cover_image = Some(vec![9, 9]);
        book.record_reading(crate::hydrate::now());

        store.put_book(&book).unwrap();

        let loaded = store.get_book(&book.id).unwrap().unwrap();
        assert_eq!(loaded, book);
        assert_eq!(loaded.status, ReadingStatus::Reading);
    }

    #[test]
    fn test_put_book_is_upsert() {
        let mut store = store();
        let mut book = Book::new("Draft");
        store.put_book(&book).unwrap();

        book.set_title("Final");
        store.put_book(&book).unwrap();

        let books = store.all_books().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Final");
    }

    #[test]
    fn test_find_book_by_file_name() {
        let mut store = store();
        let mut book = Book::new("Emma");
        book.set_file("emma.pdf", vec![0]);
        store.put_book(&book).unwrap();

        let found = store.find_book_by_file_name("emma.pdf").unwrap().unwrap();
        assert_eq!(found.id, book.id);
        assert!(store.find_book_by_file_name("other.pdf").unwrap().is_none());
    }

    #[test]
    fn test_tags() {
        let mut store = store();
        let mut tag = Tag::new("Ciencia");
        tag.set_color(Some("#00ff00".to_string()));
        store.put_tag(&tag).unwrap();

        assert_eq!(store.get_tag(&tag.id).unwrap().unwrap(), tag);
        assert_eq!(store.find_tag_by_name("Ciencia").unwrap().unwrap().id, tag.id);
        assert!(store.find_tag_by_name("Historia").unwrap().is_none());

        assert!(store.delete_tag(&tag.id).unwrap());
        assert!(store.all_tags().unwrap().is_empty());
    }

    #[test]
    fn test_annotations_keep_tombstones() {
        let mut store = store();
        let live = Annotation::new("b1", "kept");
        let mut gone = Annotation::new("b1", "removed");
        gone.delete();
        let other = Annotation::new("b2", "elsewhere");

        store.put_annotation(&live).unwrap();
        store.put_annotation(&gone).unwrap();
        store.put_annotation(&other).unwrap();

        let for_book = store.annotations_for_book("b1").unwrap();
        assert_eq!(for_book.len(), 2);
        assert_eq!(store.get_annotation(&gone.id).unwrap().unwrap(), gone);

        let counts = store.counts().unwrap();
        assert_eq!(counts.annotations, 2);
    }

    #[test]
    fn test_reading_sessions() {
        let mut store = store();
        let session = ReadingSession::new("b1", crate::hydrate::now(), 900);
        store.put_reading_session(&session).unwrap();

        assert_eq!(store.all_reading_sessions().unwrap(), vec![session]);
    }

    #[test]
    fn test_invalid_status_is_reported() {
        let store = store();
        store
            .conn
            .execute(
                "INSERT INTO books (id, title, status, added_at) VALUES ('x', 'X', 'shelved', 0)",
                [],
            )
            .unwrap();

        let err = store.get_book("x").unwrap_err();
        assert!(matches!(
            err,
            StorageError::InvalidValue {
                column: "status",
                ..
            }
        ));
    }

    #[test]
    fn test_load_state() {
        let mut store = store();
        store.put_book(&Book::new("One")).unwrap();
        store.put_book(&Book::new("Two")).unwrap();
        store.put_tag(&Tag::new("t")).unwrap();

        let state = store.load_state().unwrap();
        assert_eq!(state.books.len(), 2);
        assert_eq!(state.tags.len(), 1);
        assert!(state.annotations.is_empty());
    }

    #[test]
    fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        let book = Book::new("Persistent");
        {
            let mut store = SqliteStore::open(&config).unwrap();
            store.put_book(&book).unwrap();
        }

        let store = SqliteStore::open(&config).unwrap();
        assert_eq!(store.get_book(&book.id).unwrap().unwrap().title, "Persistent");
    }
}
