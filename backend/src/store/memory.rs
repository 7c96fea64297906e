//! In-memory [`EntityStore`], optionally backed by a JSON snapshot file.
//!
//! Rows live in two ordered maps behind one `RwLock`, held only for the
//! duration of a single read or write. Per-composition row locks are kept in
//! a separate table so that a unit of work on one composition never blocks
//! another composition.
//!
//! With a snapshot path configured, every write is applied to a copy of the
//! tables, written to disk, and only then published. A failed disk write
//! leaves memory untouched.

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::snapshot::{self, Snapshot, SNAPSHOT_VERSION};
use super::{CommentFilter, CompositionFilter, CompositionUnit, EntityStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Comment, CommentId, Composition, CompositionId, NewComment, NewComposition,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    compositions: BTreeMap<CompositionId, Composition>,
    comments: BTreeMap<CommentId, Comment>,
}

// =============================================================================
// Row Locks
// =============================================================================

/// Keyed exclusive locks, one per composition id currently held.
#[derive(Debug, Default)]
struct RowLocks {
    held: Mutex<HashSet<CompositionId>>,
    released: Condvar,
}

impl RowLocks {
    fn acquire(&self, id: CompositionId) -> RowGuard<'_> {
        let mut held = self.held.lock();
        while held.contains(&id) {
            self.released.wait(&mut held);
        }
        held.insert(id);
        RowGuard { locks: self, id }
    }
}

struct RowGuard<'a> {
    locks: &'a RowLocks,
    id: CompositionId,
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.id);
        self.locks.released.notify_all();
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// Thread-safe in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    row_locks: RowLocks,
    next_composition_id: AtomicU64,
    next_comment_id: AtomicU64,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store that lives only in memory.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            row_locks: RowLocks::default(),
            next_composition_id: AtomicU64::new(1),
            next_comment_id: AtomicU64::new(1),
            snapshot_path: None,
        }
    }

    /// Open a store persisted at `path`, loading the snapshot if it exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::new();

        if let Some(snapshot) = snapshot::load(&path)? {
            let tables = Tables {
                compositions: snapshot.compositions.into_iter().map(|c| (c.id, c)).collect(),
                comments: snapshot.comments.into_iter().map(|c| (c.id, c)).collect(),
            };
            let next_composition = tables
                .compositions
                .keys()
                .last()
                .map_or(1, |id| id.0 + 1)
                .max(snapshot.next_composition_id);
            let next_comment = tables
                .comments
                .keys()
                .last()
                .map_or(1, |id| id.0 + 1)
                .max(snapshot.next_comment_id);

            tracing::info!(
                path = %path.display(),
                compositions = tables.compositions.len(),
                comments = tables.comments.len(),
                "Loaded store snapshot"
            );

            store.tables = RwLock::new(tables);
            store.next_composition_id = AtomicU64::new(next_composition);
            store.next_comment_id = AtomicU64::new(next_comment);
        }

        store.snapshot_path = Some(path);
        Ok(store)
    }

    /// Path of the backing snapshot, if any.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn snapshot_of(&self, tables: &Tables) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            next_composition_id: self.next_composition_id.load(Ordering::SeqCst),
            next_comment_id: self.next_comment_id.load(Ordering::SeqCst),
            compositions: tables.compositions.values().cloned().collect(),
            comments: tables.comments.values().cloned().collect(),
        }
    }

    /// Run `write` against the tables under the write lock. When persisted,
    /// the change is made on a copy that replaces the tables only after the
    /// snapshot hits the disk.
    fn write_tables<R>(&self, write: impl FnOnce(&mut Tables) -> StoreResult<R>) -> StoreResult<R> {
        let mut tables = self.tables.write();
        match &self.snapshot_path {
            None => write(&mut tables),
            Some(path) => {
                let mut next = tables.clone();
                let out = write(&mut next)?;
                snapshot::save(path, &self.snapshot_of(&next))?;
                *tables = next;
                Ok(out)
            }
        }
    }

    fn sorted_comments(mut comments: Vec<Comment>) -> Vec<Comment> {
        comments.sort_by_key(|c| (c.added_at, c.id));
        comments
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MemoryStore {
    fn insert_composition(
        &self,
        new: NewComposition,
        added_at: DateTime<Utc>,
    ) -> StoreResult<Composition> {
        // Taken under the write lock so id order is commit order.
        self.write_tables(|tables| {
            let id = CompositionId(self.next_composition_id.fetch_add(1, Ordering::SeqCst));
            let composition = Composition::from_new(id, new, added_at);
            tables.compositions.insert(id, composition.clone());
            Ok(composition)
        })
    }

    fn composition(&self, id: CompositionId) -> StoreResult<Option<Composition>> {
        Ok(self.tables.read().compositions.get(&id).cloned())
    }

    fn compositions(&self) -> StoreResult<Vec<Composition>> {
        Ok(self.tables.read().compositions.values().cloned().collect())
    }

    fn find_compositions(&self, filter: CompositionFilter) -> StoreResult<Vec<Composition>> {
        Ok(self
            .tables
            .read()
            .compositions
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    fn comment(&self, id: CommentId) -> StoreResult<Option<Comment>> {
        Ok(self.tables.read().comments.get(&id).cloned())
    }

    fn find_comments(&self, filter: CommentFilter) -> StoreResult<Vec<Comment>> {
        let matching = self
            .tables
            .read()
            .comments
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(Self::sorted_comments(matching))
    }

    fn update_comment_content(
        &self,
        id: CommentId,
        content: String,
    ) -> StoreResult<Option<Comment>> {
        if !self.tables.read().comments.contains_key(&id) {
            return Ok(None);
        }
        self.write_tables(|tables| {
            Ok(tables.comments.get_mut(&id).map(|comment| {
                comment.content = content;
                comment.clone()
            }))
        })
    }

    fn lock_composition(
        &self,
        id: CompositionId,
    ) -> StoreResult<Option<Box<dyn CompositionUnit + '_>>> {
        if !self.tables.read().compositions.contains_key(&id) {
            return Ok(None);
        }

        let row = self.row_locks.acquire(id);

        // Re-read under the row lock: a removal may have committed while we waited.
        let Some(working) = self.tables.read().compositions.get(&id).cloned() else {
            return Ok(None);
        };

        Ok(Some(Box::new(MemoryUnit {
            store: self,
            _row: row,
            id,
            working,
            changed: false,
            removed: false,
            inserted: Vec::new(),
            removed_comments: Vec::new(),
        })))
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

struct MemoryUnit<'a> {
    store: &'a MemoryStore,
    _row: RowGuard<'a>,
    id: CompositionId,
    working: Composition,
    changed: bool,
    removed: bool,
    inserted: Vec<Comment>,
    removed_comments: Vec<CommentId>,
}

impl MemoryUnit<'_> {
    fn is_noop(&self) -> bool {
        !self.changed
            && !self.removed
            && self.inserted.is_empty()
            && self.removed_comments.is_empty()
    }
}

impl CompositionUnit for MemoryUnit<'_> {
    fn id(&self) -> CompositionId {
        self.id
    }

    fn composition(&self) -> Option<&Composition> {
        (!self.removed).then_some(&self.working)
    }

    fn composition_mut(&mut self) -> Option<&mut Composition> {
        if self.removed {
            return None;
        }
        self.changed = true;
        Some(&mut self.working)
    }

    fn comments(&self) -> StoreResult<Vec<Comment>> {
        let committed: Vec<Comment> = self
            .store
            .tables
            .read()
            .comments
            .values()
            .filter(|c| c.composition_id == self.id && !self.removed_comments.contains(&c.id))
            .cloned()
            .collect();

        let all = committed.into_iter().chain(self.inserted.iter().cloned()).collect();
        Ok(MemoryStore::sorted_comments(all))
    }

    fn insert_comment(&mut self, new: NewComment) -> StoreResult<Comment> {
        let id = CommentId(self.store.next_comment_id.fetch_add(1, Ordering::SeqCst));
        let comment = Comment {
            id,
            author_user_id: new.author_user_id,
            content: new.content,
            added_at: new.added_at,
            composition_id: self.id,
        };
        self.inserted.push(comment.clone());
        Ok(comment)
    }

    fn remove_comment(&mut self, id: CommentId) -> StoreResult<Option<Comment>> {
        if let Some(pos) = self.inserted.iter().position(|c| c.id == id) {
            return Ok(Some(self.inserted.remove(pos)));
        }
        if self.removed_comments.contains(&id) {
            return Ok(None);
        }

        let existing = self
            .store
            .tables
            .read()
            .comments
            .get(&id)
            .filter(|c| c.composition_id == self.id)
            .cloned();
        if existing.is_some() {
            self.removed_comments.push(id);
        }
        Ok(existing)
    }

    fn remove_composition(&mut self) {
        self.removed = true;
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.is_noop() {
            return Ok(());
        }

        let MemoryUnit {
            store,
            _row: row,
            id,
            working,
            changed,
            removed,
            inserted,
            removed_comments,
        } = *self;

        store.write_tables(|tables| {
            if removed {
                let remaining = tables
                    .comments
                    .values()
                    .filter(|c| c.composition_id == id && !removed_comments.contains(&c.id))
                    .count()
                    + inserted.len();
                if remaining > 0 {
                    return Err(StoreError::DanglingComments {
                        id,
                        comments: remaining,
                    });
                }
            }

            for comment_id in &removed_comments {
                tables.comments.remove(comment_id);
            }
            for comment in inserted {
                tables.comments.insert(comment.id, comment);
            }
            if removed {
                tables.compositions.remove(&id);
            } else if changed {
                tables.compositions.insert(id, working);
            }
            Ok(())
        })?;

        drop(row);
        Ok(())
    }
}
