//! Wire payloads exchanged with the remote metadata service
//!
//! Pull and push share one shape:
//!
//! ```json
//! { "books": [], "tags": [], "annotations": [], "readingSessions": [], "lastSync": null }
//! ```
//!
//! Missing collections decode as empty arrays. Timestamps travel as text and
//! are re-hydrated by [`crate::hydrate`] on the way in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hydrate;
use crate::models::{Annotation, Book, ReadingSession, Tag};

/// Full remote state returned by a pull
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub reading_sessions: Vec<ReadingSession>,
    /// When the remote last accepted a push, if it tracks that
    #[serde(default, with = "hydrate::option")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl RemoteSnapshot {
    /// A remote with neither books nor tags has never been synced to
    pub fn needs_bootstrap(&self) -> bool {
        self.books.is_empty() && self.tags.is_empty()
    }
}

/// One push request
///
/// Books never carry their binary assets here: `Book` skips those fields
/// during serialization and the pusher strips them before building a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushBatch {
    pub books: Vec<Book>,
    pub tags: Vec<Tag>,
    pub annotations: Vec<Annotation>,
    pub reading_sessions: Vec<ReadingSession>,
    #[serde(default, with = "hydrate::option")]
    pub last_sync: Option<DateTime<Utc>>,
}
