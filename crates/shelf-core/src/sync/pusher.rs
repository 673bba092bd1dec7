//! Batched push of the local state
//!
//! Books dominate the payload size, so they are split into fixed-size
//! chunks. The small collections ride along with the final chunk only;
//! earlier chunks carry empty arrays. Chunks are sent strictly in order and
//! the first failure stops the push.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::client::RemoteLibrary;
use super::error::SyncResult;
use super::message::PushBatch;
use crate::models::LibraryState;

/// Default number of books per request
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// What a completed push sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub batches: usize,
    pub books: usize,
    pub tags: usize,
    pub annotations: usize,
    pub reading_sessions: usize,
}

/// Sends a full local state to a remote in size-bounded batches
pub struct BatchPusher<'a, R: RemoteLibrary + ?Sized> {
    remote: &'a R,
    batch_size: usize,
}

impl<'a, R: RemoteLibrary + ?Sized> BatchPusher<'a, R> {
    /// Create a pusher; a batch size of zero is treated as one
    pub fn new(remote: &'a R, batch_size: usize) -> Self {
        Self {
            remote,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Split a state into the batches that would be sent
    ///
    /// Binary assets are stripped from every book. An empty book collection
    /// still yields one batch carrying the small collections.
    pub fn plan(&self, state: LibraryState, last_sync: Option<DateTime<Utc>>) -> Vec<PushBatch> {
        let LibraryState {
            books,
            tags,
            annotations,
            reading_sessions,
        } = state;

        let mut batches: Vec<PushBatch> = books
            .chunks(self.batch_size)
            .map(|chunk| PushBatch {
                books: chunk.iter().map(|b| b.without_binary()).collect(),
                last_sync,
                ..PushBatch::default()
            })
            .collect();

        if batches.is_empty() {
            batches.push(PushBatch {
                last_sync,
                ..PushBatch::default()
            });
        }

        if let Some(last) = batches.last_mut() {
            last.tags = tags;
            last.annotations = annotations;
            last.reading_sessions = reading_sessions;
        }

        batches
    }

    /// Push a full state
    pub async fn push(
        &self,
        state: LibraryState,
        last_sync: Option<DateTime<Utc>>,
    ) -> SyncResult<PushReport> {
        let batches = self.plan(state, last_sync);
        let total = batches.len();
        let mut report = PushReport::default();

        for (index, batch) in batches.iter().enumerate() {
            debug!("Sending batch {}/{} ({} books)", index + 1, total, batch.books.len());
            if let Err(e) = self.remote.push(batch).await {
                warn!(
                    "Push batch {}/{} failed, {} batches not sent: {}",
                    index + 1,
                    total,
                    total - index - 1,
                    e
                );
                return Err(e);
            }

            report.batches += 1;
            report.books += batch.books.len();
            report.tags += batch.tags.len();
            report.annotations += batch.annotations.len();
            report.reading_sessions += batch.reading_sessions.len();
        }

        info!(
            "Pushed {} books, {} tags, {} annotations, {} sessions in {} batches",
            report.books, report.tags, report.annotations, report.reading_sessions, report.batches
        );
        Ok(report)
    }
}
