//! Conflict resolution
//!
//! Pure merge functions, one per entity kind. Each takes the local records
//! and the remote records and decides, per remote record, what happens to
//! the local store. Nothing here touches storage; the engine applies the
//! returned actions.
//!
//! - Books and annotations: last-writer-wins on their sync time, local wins
//!   ties. Remote overwrites keep the local binary assets of a book.
//! - Annotations: a remote tombstone with no local copy is not inserted.
//! - Tags: same id is last-writer-wins; same name under a different id
//!   converges on the remote id.
//! - Reading sessions: append-only, deduplicated by id.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{Annotation, Book, ReadingSession, Tag};

/// What to do with the local store for one remote record
#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction<T> {
    /// No local record shares the id; store the remote one
    Insert(T),
    /// The remote record is newer; replace the local one
    Overwrite(T),
    /// The local record is at least as new; leave it
    Keep(String),
    /// The remote record is not wanted locally
    Skip(String),
    /// Drop the local record stored under `old_id` and store `record` instead
    Replace { old_id: String, record: T },
}

/// How a tag that shares its name with a local tag of another id is merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagCollisionPolicy {
    /// The remote record replaces the local one outright
    #[default]
    RemoteWins,
    /// The remote id is adopted, but a strictly newer local record keeps
    /// its name, color and timestamps
    NewestFields,
}

impl std::fmt::Display for TagCollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagCollisionPolicy::RemoteWins => f.write_str("remote-wins"),
            TagCollisionPolicy::NewestFields => f.write_str("newest-fields"),
        }
    }
}

impl std::str::FromStr for TagCollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote-wins" => Ok(TagCollisionPolicy::RemoteWins),
            "newest-fields" => Ok(TagCollisionPolicy::NewestFields),
            other => Err(format!(
                "unknown tag collision policy: {} (expected remote-wins or newest-fields)",
                other
            )),
        }
    }
}

/// Counts of merge actions for one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub inserted: usize,
    pub overwritten: usize,
    pub kept: usize,
    pub skipped: usize,
    pub replaced: usize,
}

impl CollectionReport {
    pub fn from_actions<T>(actions: &[MergeAction<T>]) -> Self {
        let mut report = Self::default();
        for action in actions {
            match action {
                MergeAction::Insert(_) => report.inserted += 1,
                MergeAction::Overwrite(_) => report.overwritten += 1,
                MergeAction::Keep(_) => report.kept += 1,
                MergeAction::Skip(_) => report.skipped += 1,
                MergeAction::Replace { .. } => report.replaced += 1,
            }
        }
        report
    }

    /// Actions that changed the local store
    pub fn mutations(&self) -> usize {
        self.inserted + self.overwritten + self.replaced
    }
}

/// Counts of merge actions for a whole sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub books: CollectionReport,
    pub tags: CollectionReport,
    pub annotations: CollectionReport,
    pub reading_sessions: CollectionReport,
    /// Local books whose tag references were rewritten to a new tag id
    pub remapped_books: usize,
}

impl MergeReport {
    pub fn mutations(&self) -> usize {
        self.books.mutations()
            + self.tags.mutations()
            + self.annotations.mutations()
            + self.reading_sessions.mutations()
            + self.remapped_books
    }
}

/// Merge remote books into local books
pub fn merge_books(local: &[Book], remote: Vec<Book>) -> Vec<MergeAction<Book>> {
    let mut current: HashMap<String, Book> =
        local.iter().map(|b| (b.id.clone(), b.clone())).collect();

    remote
        .into_iter()
        .map(|incoming| match current.get(&incoming.id) {
            None => {
                current.insert(incoming.id.clone(), incoming.clone());
                MergeAction::Insert(incoming)
            }
            Some(existing) if incoming.sync_time() > existing.sync_time() => {
                let merged = incoming.with_local_assets(existing);
                current.insert(merged.id.clone(), merged.clone());
                MergeAction::Overwrite(merged)
            }
            Some(existing) => MergeAction::Keep(existing.id.clone()),
        })
        .collect()
}

/// Merge remote annotations into local annotations
pub fn merge_annotations(local: &[Annotation], remote: Vec<Annotation>) -> Vec<MergeAction<Annotation>> {
    let mut current: HashMap<String, Annotation> =
        local.iter().map(|a| (a.id.clone(), a.clone())).collect();

    remote
        .into_iter()
        .map(|incoming| match current.get(&incoming.id) {
            // Never resurrect something this replica has not seen
            None if incoming.is_deleted() => MergeAction::Skip(incoming.id),
            None => {
                current.insert(incoming.id.clone(), incoming.clone());
                MergeAction::Insert(incoming)
            }
            Some(existing) if incoming.sync_time() > existing.sync_time() => {
                current.insert(incoming.id.clone(), incoming.clone());
                MergeAction::Overwrite(incoming)
            }
            Some(existing) => MergeAction::Keep(existing.id.clone()),
        })
        .collect()
}

/// Merge remote tags into local tags
///
/// Name matching only considers tags that existed locally before the merge
/// and have not been replaced yet, so two remote tags never collide with
/// each other.
pub fn merge_tags(
    local: &[Tag],
    remote: Vec<Tag>,
    policy: TagCollisionPolicy,
) -> Vec<MergeAction<Tag>> {
    let mut current: HashMap<String, Tag> =
        local.iter().map(|t| (t.id.clone(), t.clone())).collect();
    let mut by_name: HashMap<String, String> = HashMap::new();
    for tag in local {
        by_name
            .entry(tag.name.clone())
            .or_insert_with(|| tag.id.clone());
    }

    let mut actions = Vec::with_capacity(remote.len());
    for incoming in remote {
        if let Some(existing) = current.get(&incoming.id) {
            if incoming.sync_time() > existing.sync_time() {
                if existing.name != incoming.name
                    && by_name.get(&existing.name) == Some(&existing.id)
                {
                    by_name.remove(&existing.name);
                }
                current.insert(incoming.id.clone(), incoming.clone());
                actions.push(MergeAction::Overwrite(incoming));
            } else {
                actions.push(MergeAction::Keep(existing.id.clone()));
            }
            continue;
        }

        let collision = by_name
            .get(&incoming.name)
            .and_then(|id| current.get(id))
            .cloned();

        match collision {
            Some(existing) => {
                by_name.remove(&existing.name);
                current.remove(&existing.id);

                let record = match policy {
                    TagCollisionPolicy::NewestFields
                        if existing.sync_time() > incoming.sync_time() =>
                    {
                        Tag {
                            id: incoming.id,
                            ..existing.clone()
                        }
                    }
                    _ => incoming,
                };

                current.insert(record.id.clone(), record.clone());
                actions.push(MergeAction::Replace {
                    old_id: existing.id,
                    record,
                });
            }
            None => {
                current.insert(incoming.id.clone(), incoming.clone());
                actions.push(MergeAction::Insert(incoming));
            }
        }
    }
    actions
}

/// Merge remote reading sessions into local ones
pub fn merge_reading_sessions(
    local: &[ReadingSession],
    remote: Vec<ReadingSession>,
) -> Vec<MergeAction<ReadingSession>> {
    let mut seen: HashSet<String> = local.iter().map(|s| s.id.clone()).collect();

    remote
        .into_iter()
        .map(|incoming| {
            if seen.insert(incoming.id.clone()) {
                MergeAction::Insert(incoming)
            } else {
                MergeAction::Keep(incoming.id)
            }
        })
        .collect()
}
