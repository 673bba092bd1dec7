//! Sync orchestration
//!
//! One run of [`SyncEngine::run_sync`]:
//!
//! 1. Pull the remote snapshot.
//! 2. If the remote has neither books nor tags, skip merging and push the
//!    whole local state (bootstrap).
//! 3. Otherwise merge books, tags, annotations and reading sessions into
//!    the local store, one collection at a time.
//! 4. Push the merged local state back.
//!
//! A pull failure leaves the local store untouched. A push failure leaves
//! the merge applied locally; the next successful run sends it. Only one
//! run may be in progress per store, however many engines share it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::RemoteLibrary;
use super::error::{SyncError, SyncResult};
use super::message::RemoteSnapshot;
use super::pusher::{BatchPusher, PushReport, DEFAULT_BATCH_SIZE};
use super::resolver::{self, CollectionReport, MergeAction, MergeReport, TagCollisionPolicy};
use super::state::SyncState;
use crate::storage::{LibraryStore, SharedStore, StorageResult};

/// Tunables for a sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Books per push request
    pub batch_size: usize,
    pub tag_collision: TagCollisionPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tag_collision: TagCollisionPolicy::default(),
        }
    }
}

/// Result of a successful sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Remote was empty; local state was pushed without merging
    Bootstrapped { push: PushReport },
    /// Remote state was merged locally, then the result pushed back
    Merged { merge: MergeReport, push: PushReport },
}

impl SyncOutcome {
    pub fn push_report(&self) -> &PushReport {
        match self {
            SyncOutcome::Bootstrapped { push } | SyncOutcome::Merged { push, .. } => push,
        }
    }

    pub fn merge_report(&self) -> Option<&MergeReport> {
        match self {
            SyncOutcome::Bootstrapped { .. } => None,
            SyncOutcome::Merged { merge, .. } => Some(merge),
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        matches!(self, SyncOutcome::Bootstrapped { .. })
    }
}

/// Holds the store's sync flag for the lifetime of one run
struct RunGuard<'a, S> {
    store: &'a SharedStore<S>,
}

impl<'a, S> RunGuard<'a, S> {
    fn acquire(store: &'a SharedStore<S>) -> SyncResult<Self> {
        if !store.try_begin_sync() {
            return Err(SyncError::AlreadyRunning);
        }
        Ok(Self { store })
    }
}

impl<S> Drop for RunGuard<'_, S> {
    fn drop(&mut self) {
        self.store.end_sync();
    }
}

/// Pull/merge/push orchestrator over an injected store and remote
pub struct SyncEngine<S: LibraryStore, R: RemoteLibrary> {
    store: SharedStore<S>,
    remote: R,
    settings: SyncSettings,
    state: Option<Mutex<SyncState>>,
}

impl<S: LibraryStore, R: RemoteLibrary> SyncEngine<S, R> {
    pub fn new(store: SharedStore<S>, remote: R, settings: SyncSettings) -> Self {
        Self {
            store,
            remote,
            settings,
            state: None,
        }
    }

    /// Record the outcome of successful runs in `state`
    pub fn with_state(mut self, state: SyncState) -> Self {
        self.state = Some(Mutex::new(state));
        self
    }

    pub fn store(&self) -> &SharedStore<S> {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Whether a run holds this engine's store
    pub fn is_running(&self) -> bool {
        self.store.is_syncing()
    }

    /// Copy of the recorded sync state, if the engine keeps one
    pub async fn sync_state(&self) -> Option<SyncState> {
        match &self.state {
            Some(state) => Some(state.lock().await.clone()),
            None => None,
        }
    }

    /// Run one sync
    ///
    /// Fails immediately with [`SyncError::AlreadyRunning`] if another run
    /// over the same store has not finished.
    pub async fn run_sync(&self) -> SyncResult<SyncOutcome> {
        let _guard = RunGuard::acquire(&self.store)?;

        info!("Starting sync");
        let snapshot = self.remote.pull().await?;
        let remote_last_sync = snapshot.last_sync;
        debug!(
            "Pulled {} books, {} tags, {} annotations, {} sessions",
            snapshot.books.len(),
            snapshot.tags.len(),
            snapshot.annotations.len(),
            snapshot.reading_sessions.len()
        );

        let outcome = if snapshot.needs_bootstrap() {
            info!("Remote has no books or tags, pushing local state");
            let push = self.push_local(remote_last_sync).await?;
            SyncOutcome::Bootstrapped { push }
        } else {
            let merge = self.merge(snapshot).await?;
            info!("Merge applied {} local changes", merge.mutations());
            let push = self.push_local(remote_last_sync).await?;
            SyncOutcome::Merged { merge, push }
        };

        self.record(&outcome, remote_last_sync).await;
        info!("Sync complete");
        Ok(outcome)
    }

    async fn push_local(&self, last_sync: Option<DateTime<Utc>>) -> SyncResult<PushReport> {
        let local = self.store.lock().await.load_state()?;
        BatchPusher::new(&self.remote, self.settings.batch_size)
            .push(local, last_sync)
            .await
    }

    /// Merge every collection, locking the store once per collection
    async fn merge(&self, snapshot: RemoteSnapshot) -> SyncResult<MergeReport> {
        let RemoteSnapshot {
            books,
            tags,
            annotations,
            reading_sessions,
            ..
        } = snapshot;
        let mut report = MergeReport::default();

        {
            let mut store = self.store.lock().await;
            let actions = resolver::merge_books(&store.all_books()?, books);
            report.books = apply(&mut *store, actions, S::put_book, None)?;
        }

        {
            let mut store = self.store.lock().await;
            let actions =
                resolver::merge_tags(&store.all_tags()?, tags, self.settings.tag_collision);
            let remaps: Vec<(String, String)> = actions
                .iter()
                .filter_map(|action| match action {
                    MergeAction::Replace { old_id, record } => {
                        Some((old_id.clone(), record.id.clone()))
                    }
                    _ => None,
                })
                .collect();
            report.tags = apply(&mut *store, actions, S::put_tag, Some(S::delete_tag as DeleteFn<S>))?;
            report.remapped_books = remap_categories(&mut *store, &remaps)?;
        }

        {
            let mut store = self.store.lock().await;
            let actions = resolver::merge_annotations(&store.all_annotations()?, annotations);
            report.annotations = apply(&mut *store, actions, S::put_annotation, None)?;
        }

        {
            let mut store = self.store.lock().await;
            let actions =
                resolver::merge_reading_sessions(&store.all_reading_sessions()?, reading_sessions);
            report.reading_sessions = apply(&mut *store, actions, S::put_reading_session, None)?;
        }

        debug!("Merge report: {:?}", report);
        Ok(report)
    }

    async fn record(&self, outcome: &SyncOutcome, remote_last_sync: Option<DateTime<Utc>>) {
        let Some(state) = &self.state else {
            return;
        };
        let mut state = state.lock().await;
        state.record(outcome, remote_last_sync);
        // The run itself succeeded; bookkeeping is best effort
        if let Err(e) = state.save() {
            warn!("Failed to save sync state: {}", e);
        }
    }
}

type PutFn<S, T> = fn(&mut S, &T) -> StorageResult<()>;
type DeleteFn<S> = fn(&mut S, &str) -> StorageResult<bool>;

/// Apply merge actions to one collection of the store
fn apply<S, T>(
    store: &mut S,
    actions: Vec<MergeAction<T>>,
    put: PutFn<S, T>,
    delete: Option<DeleteFn<S>>,
) -> StorageResult<CollectionReport> {
    let report = CollectionReport::from_actions(&actions);
    for action in actions {
        match action {
            MergeAction::Insert(record) | MergeAction::Overwrite(record) => put(store, &record)?,
            MergeAction::Replace { old_id, record } => {
                if let Some(delete) = delete {
                    delete(store, &old_id)?;
                }
                put(store, &record)?;
            }
            MergeAction::Keep(_) | MergeAction::Skip(_) => {}
        }
    }
    Ok(report)
}

/// Point book categories at replaced tag ids; returns the number of books changed
fn remap_categories<S: LibraryStore>(
    store: &mut S,
    remaps: &[(String, String)],
) -> StorageResult<usize> {
    if remaps.is_empty() {
        return Ok(0);
    }

    let mut changed = 0;
    for mut book in store.all_books()? {
        let mut touched = false;
        for (old_id, new_id) in remaps {
            touched |= book.replace_category(old_id, new_id);
        }
        if touched {
            store.put_book(&book)?;
            changed += 1;
        }
    }
    debug!("Remapped tag references on {} books", changed);
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrate;
    use crate::models::{Annotation, Book, LibraryState, ReadingSession, Tag};
    use crate::storage::MemoryStore;
    use crate::sync::message::PushBatch;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// Remote that behaves like the real service: JSON on the wire, upsert by id
    #[derive(Default)]
    struct FakeRemote {
        snapshot: StdMutex<RemoteSnapshot>,
        pushed: StdMutex<Vec<serde_json::Value>>,
        fail_pull: bool,
        fail_push_on: Option<usize>,
        gate: Option<Notify>,
    }

    impl FakeRemote {
        fn with_snapshot(snapshot: RemoteSnapshot) -> Self {
            Self {
                snapshot: StdMutex::new(snapshot),
                ..Self::default()
            }
        }

        fn pushed(&self) -> Vec<serde_json::Value> {
            self.pushed.lock().unwrap().clone()
        }

        fn snapshot(&self) -> RemoteSnapshot {
            self.snapshot.lock().unwrap().clone()
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }
    }

    fn upsert<T: Clone>(target: &mut Vec<T>, incoming: &[T], id: fn(&T) -> &str) {
        for record in incoming {
            match target.iter_mut().find(|t| id(t) == id(record)) {
                Some(existing) => *existing = record.clone(),
                None => target.push(record.clone()),
            }
        }
    }

    #[async_trait]
    impl RemoteLibrary for FakeRemote {
        async fn pull(&self) -> SyncResult<RemoteSnapshot> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_pull {
                return Err(SyncError::Transport("connection refused".to_string()));
            }
            let json = serde_json::to_string(&*self.snapshot.lock().unwrap()).unwrap();
            serde_json::from_str(&json).map_err(|e| SyncError::MalformedResponse(e.to_string()))
        }

        async fn push(&self, batch: &PushBatch) -> SyncResult<()> {
            let value = serde_json::to_value(batch).unwrap();
            {
                let mut pushed = self.pushed.lock().unwrap();
                if self.fail_push_on == Some(pushed.len()) {
                    return Err(SyncError::Remote {
                        status: 503,
                        message: "Service Unavailable".to_string(),
                    });
                }
                pushed.push(value.clone());
            }

            let batch: PushBatch = serde_json::from_value(value).unwrap();
            let mut snapshot = self.snapshot.lock().unwrap();
            upsert(&mut snapshot.books, &batch.books, |b| b.id.as_str());
            upsert(&mut snapshot.tags, &batch.tags, |t| t.id.as_str());
            upsert(&mut snapshot.annotations, &batch.annotations, |a| a.id.as_str());
            upsert(&mut snapshot.reading_sessions, &batch.reading_sessions, |s| s.id.as_str());
            snapshot.last_sync = Some(hydrate::now());
            Ok(())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        hydrate::from_millis(1_700_000_000_000 + secs * 1000).unwrap()
    }

    fn book(id: &str, title: &str, updated: i64) -> Book {
        let mut book = Book::with_id(id, title);
        book.added_at = at(0);
        book.updated_at = Some(at(updated));
        book
    }

    fn tag(id: &str, name: &str, updated: i64) -> Tag {
        let mut tag = Tag::with_id(id, name);
        tag.created_at = at(0);
        tag.updated_at = Some(at(updated));
        tag
    }

    fn engine(
        local: LibraryState,
        remote: FakeRemote,
    ) -> SyncEngine<MemoryStore, FakeRemote> {
        SyncEngine::new(
            SharedStore::new(MemoryStore::from_state(local)),
            remote,
            SyncSettings::default(),
        )
    }

    fn remote_with_books(books: Vec<Book>) -> FakeRemote {
        FakeRemote::with_snapshot(RemoteSnapshot {
            books,
            ..RemoteSnapshot::default()
        })
    }

    #[tokio::test]
    async fn test_bootstrap_pushes_local_without_merging() {
        let local = LibraryState {
            books: vec![book("b1", "One", 1), book("b2", "Two", 1), book("b3", "Three", 1)],
            ..LibraryState::default()
        };
        let engine = engine(local, FakeRemote::default());

        let outcome = engine.run_sync().await.unwrap();
        assert!(outcome.is_bootstrap());
        assert_eq!(outcome.push_report().books, 3);
        assert_eq!(engine.store().lock().await.write_count(), 0);

        let pushed = engine.remote().pushed();
        assert_eq!(pushed.len(), 1);
        let mut ids: Vec<&str> = pushed[0]["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_str().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
    }

    #[tokio::test]
    async fn test_bootstrap_ignores_remote_annotations() {
        // Annotations alone do not make a remote "initialized"
        let mut remote_annotation = Annotation::new("b1", "orphan");
        remote_annotation.id = "a-remote".to_string();
        let remote = FakeRemote::with_snapshot(RemoteSnapshot {
            annotations: vec![remote_annotation],
            ..RemoteSnapshot::default()
        });
        let engine = engine(LibraryState::default(), remote);

        assert!(engine.run_sync().await.unwrap().is_bootstrap());
        assert!(engine.store().lock().await.get_annotation("a-remote").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let mut deleted = Annotation::new("b1", "removed");
        deleted.delete();
        let local = LibraryState {
            books: vec![book("b1", "Local", 10)],
            tags: vec![tag("A", "Ciencia", 5)],
            annotations: vec![Annotation::new("b1", "kept"), deleted],
            reading_sessions: vec![ReadingSession::new("b1", at(3), 600)],
        };
        let remote = FakeRemote::with_snapshot(RemoteSnapshot {
            books: vec![book("b2", "Remote", 20)],
            tags: vec![tag("B", "Ciencia", 2), tag("C", "Arte", 2)],
            ..RemoteSnapshot::default()
        });
        let engine = engine(local, remote);

        let first = engine.run_sync().await.unwrap();
        assert!(first.merge_report().unwrap().mutations() > 0);
        let writes_after_first = engine.store().lock().await.write_count();
        let pushes_after_first = engine.remote().pushed().len();

        let second = engine.run_sync().await.unwrap();
        let merge = second.merge_report().unwrap();
        assert_eq!(merge.mutations(), 0);
        assert_eq!(engine.store().lock().await.write_count(), writes_after_first);

        // The final push still happens
        assert_eq!(engine.remote().pushed().len(), pushes_after_first + 1);
        assert_eq!(second.push_report().batches, 1);
    }

    #[tokio::test]
    async fn test_last_writer_wins_on_books() {
        let local = LibraryState {
            books: vec![book("b1", "Local newer", 20), book("b2", "Local older", 10)],
            ..LibraryState::default()
        };
        let remote = remote_with_books(vec![
            book("b1", "Remote older", 10),
            book("b2", "Remote newer", 20),
        ]);
        let engine = engine(local, remote);

        let outcome = engine.run_sync().await.unwrap();
        let report = outcome.merge_report().unwrap();
        assert_eq!(report.books.overwritten, 1);
        assert_eq!(report.books.kept, 1);

        let store = engine.store().lock().await;
        assert_eq!(store.get_book("b1").unwrap().unwrap().title, "Local newer");
        assert_eq!(store.get_book("b2").unwrap().unwrap().title, "Remote newer");

        // Converged state is pushed back
        let remote = engine.remote().snapshot();
        let b1 = remote.books.iter().find(|b| b.id == "b1").unwrap();
        assert_eq!(b1.title, "Local newer");
    }

    #[tokio::test]
    async fn test_remote_overwrite_keeps_local_binary() {
        let mut local_book = book("b1", "Local", 10);
        local_book.file_data = Some(vec![1, 2, 3]);
        local_book.cover_image = Some(vec![9]);
        let local = LibraryState {
            books: vec![local_book],
            ..LibraryState::default()
        };
        let engine = engine(local, remote_with_books(vec![book("b1", "Remote", 20)]));

        engine.run_sync().await.unwrap();

        let store = engine.store().lock().await;
        let merged = store.get_book("b1").unwrap().unwrap();
        assert_eq!(merged.title, "Remote");
        assert_eq!(merged.file_data, Some(vec![1, 2, 3]));
        assert_eq!(merged.cover_image, Some(vec![9]));

        let pushed = engine.remote().pushed();
        let sent = &pushed[0]["books"][0];
        assert!(sent.get("fileData").is_none());
        assert!(sent.get("coverImage").is_none());
    }

    #[tokio::test]
    async fn test_tombstones() {
        let mut local_annotation = Annotation::new("b1", "quote");
        local_annotation.id = "a1".to_string();
        local_annotation.updated_at = Some(at(10));

        let mut remote_delete = local_annotation.clone();
        remote_delete.deleted_at = Some(at(20));
        remote_delete.updated_at = Some(at(20));

        let mut unknown_tombstone = Annotation::new("b1", "never seen");
        unknown_tombstone.id = "a2".to_string();
        unknown_tombstone.delete();

        let remote = FakeRemote::with_snapshot(RemoteSnapshot {
            books: vec![book("b1", "Book", 1)],
            annotations: vec![remote_delete, unknown_tombstone],
            ..RemoteSnapshot::default()
        });
        let local = LibraryState {
            annotations: vec![local_annotation],
            ..LibraryState::default()
        };
        let engine = engine(local, remote);

        let outcome = engine.run_sync().await.unwrap();
        let report = outcome.merge_report().unwrap();
        assert_eq!(report.annotations.overwritten, 1);
        assert_eq!(report.annotations.skipped, 1);

        let store = engine.store().lock().await;
        assert_eq!(store.get_annotation("a1").unwrap().unwrap().deleted_at, Some(at(20)));
        assert!(store.get_annotation("a2").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tag_identity_converges_and_books_follow() {
        let mut filed = book("b1", "Cosmos", 10);
        filed.categories = vec!["A".to_string()];
        let local = LibraryState {
            books: vec![filed],
            tags: vec![tag("A", "Ciencia", 30)],
            ..LibraryState::default()
        };
        let remote = FakeRemote::with_snapshot(RemoteSnapshot {
            books: vec![book("b9", "Remote book", 1)],
            tags: vec![tag("B", "Ciencia", 1)],
            ..RemoteSnapshot::default()
        });
        let engine = engine(local, remote);

        let outcome = engine.run_sync().await.unwrap();
        let report = outcome.merge_report().unwrap();
        assert_eq!(report.tags.replaced, 1);
        assert_eq!(report.remapped_books, 1);

        let store = engine.store().lock().await;
        let tags = store.all_tags().unwrap();
        let ciencia: Vec<&Tag> = tags.iter().filter(|t| t.name == "Ciencia").collect();
        assert_eq!(ciencia.len(), 1);
        assert_eq!(ciencia[0].id, "B");

        let book = store.get_book("b1").unwrap().unwrap();
        assert_eq!(book.categories, vec!["B".to_string()]);
        // Remapping is not a user edit
        assert_eq!(book.updated_at, Some(at(10)));
    }

    #[tokio::test]
    async fn test_reading_sessions_deduplicated() {
        let session = ReadingSession::new("b1", at(100), 900);
        let local = LibraryState {
            reading_sessions: vec![session.clone()],
            ..LibraryState::default()
        };
        let remote = FakeRemote::with_snapshot(RemoteSnapshot {
            books: vec![book("b1", "Book", 1)],
            reading_sessions: vec![session.clone(), ReadingSession::new("b1", at(200), 60)],
            ..RemoteSnapshot::default()
        });
        let engine = engine(local, remote);

        let outcome = engine.run_sync().await.unwrap();
        let report = outcome.merge_report().unwrap();
        assert_eq!(report.reading_sessions.inserted, 1);
        assert_eq!(report.reading_sessions.kept, 1);
        assert_eq!(engine.store().lock().await.all_reading_sessions().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pull_failure_leaves_store_untouched() {
        let remote = FakeRemote {
            fail_pull: true,
            ..FakeRemote::default()
        };
        let engine = engine(
            LibraryState {
                books: vec![book("b1", "Local", 1)],
                ..LibraryState::default()
            },
            remote,
        )
        .with_state(SyncState::new());

        let err = engine.run_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert_eq!(engine.store().lock().await.write_count(), 0);
        assert!(engine.remote().pushed().is_empty());
        assert!(engine.sync_state().await.unwrap().last_sync.is_none());
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_push_failure_keeps_merge_and_stops_batches() {
        let local = LibraryState {
            books: (0..5).map(|i| book(&format!("l{}", i), "Local", 1)).collect(),
            ..LibraryState::default()
        };
        let remote = FakeRemote {
            fail_push_on: Some(1),
            ..remote_with_books(vec![book("r1", "Remote", 1)])
        };
        let engine = SyncEngine::new(
            SharedStore::new(MemoryStore::from_state(local)),
            remote,
            SyncSettings {
                batch_size: 2,
                ..SyncSettings::default()
            },
        );

        let err = engine.run_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Remote { status: 503, .. }));
        // Merge stayed applied
        assert!(engine.store().lock().await.get_book("r1").unwrap().is_some());
        // 6 books in batches of 2: only the first was accepted
        assert_eq!(engine.remote().pushed().len(), 1);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let remote = FakeRemote {
            gate: Some(Notify::new()),
            ..FakeRemote::default()
        };
        let engine = engine(LibraryState::default(), remote);

        let (first, second) = tokio::join!(engine.run_sync(), async {
            while !engine.is_running() {
                tokio::task::yield_now().await;
            }
            let second = engine.run_sync().await;
            engine.remote().release();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(SyncError::AlreadyRunning)));
        assert!(!engine.is_running());
        // The rejected run never reached the remote
        assert_eq!(engine.remote().pushed().len(), 1);
    }

    #[tokio::test]
    async fn test_single_flight_across_engines_over_one_store() {
        let store = SharedStore::new(MemoryStore::from_state(LibraryState {
            books: vec![book("b1", "Local", 1)],
            ..LibraryState::default()
        }));
        let first = SyncEngine::new(
            store.clone(),
            FakeRemote {
                gate: Some(Notify::new()),
                ..FakeRemote::default()
            },
            SyncSettings::default(),
        );
        let second = SyncEngine::new(store.clone(), FakeRemote::default(), SyncSettings::default());

        let (first_result, second_result) = tokio::join!(first.run_sync(), async {
            while !store.is_syncing() {
                tokio::task::yield_now().await;
            }
            assert!(second.is_running());
            let result = second.run_sync().await;
            first.remote().release();
            result
        });

        assert!(first_result.is_ok());
        assert!(matches!(second_result, Err(SyncError::AlreadyRunning)));
        assert!(second.remote().pushed().is_empty());
        assert!(!store.is_syncing());

        // Once the first run is over the other engine may sync
        assert!(second.run_sync().await.is_ok());
        assert_eq!(second.remote().pushed().len(), 1);
    }

    #[tokio::test]
    async fn test_guard_released_after_failure() {
        let remote = FakeRemote {
            fail_pull: true,
            ..FakeRemote::default()
        };
        let engine = engine(LibraryState::default(), remote);
        assert!(matches!(engine.run_sync().await, Err(SyncError::Transport(_))));
        // Still fails for the same reason, not because of a stuck flag
        assert!(matches!(engine.run_sync().await, Err(SyncError::Transport(_))));
    }

    #[tokio::test]
    async fn test_state_recorded_on_success() {
        let engine = engine(
            LibraryState {
                books: vec![book("b1", "Local", 1)],
                ..LibraryState::default()
            },
            FakeRemote::default(),
        )
        .with_state(SyncState::new());

        engine.run_sync().await.unwrap();
        engine.run_sync().await.unwrap();

        let state = engine.sync_state().await.unwrap();
        assert_eq!(state.successful_runs, 2);
        assert_eq!(state.bootstraps, 1);
        assert!(state.last_sync.is_some());
        assert_eq!(state.last_push.map(|p| p.books), Some(1));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = SyncOutcome::Bootstrapped {
            push: PushReport::default(),
        };
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["outcome"], "bootstrapped");
        assert_eq!(json["push"]["batches"], 0);
    }
}
