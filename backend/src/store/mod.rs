//! Entity storage for compositions and comments.
//!
//! The store is the only state shared between requests. It offers:
//!
//! - plain reads and field-equality queries,
//! - single-row atomic writes ([`EntityStore::insert_composition`],
//!   [`EntityStore::update_comment_content`]),
//! - per-composition units of work ([`EntityStore::lock_composition`]).
//!
//! A unit of work holds the composition's row lock until it is committed or
//! dropped. Every change that touches a composition row or the set of
//! comments attached to it goes through one, so writers of the same
//! composition are serialized while different compositions never contend.
//! Dropping a unit without calling [`CompositionUnit::commit`] discards
//! everything it staged.

pub mod memory;
pub mod snapshot;

use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::{
    Comment, CommentId, Composition, CompositionId, Difficulty, NewComment, NewComposition,
    UserId,
};

pub use memory::MemoryStore;

/// Field-equality filters over compositions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionFilter {
    Difficulty(Difficulty),
    Adder(UserId),
}

impl CompositionFilter {
    pub fn matches(&self, composition: &Composition) -> bool {
        match self {
            Self::Difficulty(difficulty) => composition.difficulty == *difficulty,
            Self::Adder(adder) => composition.adder_id == *adder,
        }
    }
}

/// Field-equality filters over comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentFilter {
    Composition(CompositionId),
    Author(UserId),
}

impl CommentFilter {
    pub fn matches(&self, comment: &Comment) -> bool {
        match self {
            Self::Composition(id) => comment.composition_id == *id,
            Self::Author(user) => comment.author_user_id == *user,
        }
    }
}

/// Storage port used by every service.
pub trait EntityStore: Send + Sync {
    /// Insert a validated composition with a zero comment count.
    fn insert_composition(
        &self,
        new: NewComposition,
        added_at: DateTime<Utc>,
    ) -> StoreResult<Composition>;

    fn composition(&self, id: CompositionId) -> StoreResult<Option<Composition>>;

    /// Every composition, in insertion order.
    fn compositions(&self) -> StoreResult<Vec<Composition>>;

    /// Compositions matching `filter`, in insertion order.
    fn find_compositions(&self, filter: CompositionFilter) -> StoreResult<Vec<Composition>>;

    fn comment(&self, id: CommentId) -> StoreResult<Option<Comment>>;

    /// Comments matching `filter`, ordered by `added_at` then id.
    fn find_comments(&self, filter: CommentFilter) -> StoreResult<Vec<Comment>>;

    /// Replace a comment's content. `None` when the comment is gone.
    fn update_comment_content(
        &self,
        id: CommentId,
        content: String,
    ) -> StoreResult<Option<Comment>>;

    /// Open a unit of work on one composition, blocking until its row lock
    /// is free. `None` when the composition does not exist (or was removed
    /// while waiting for the lock).
    fn lock_composition(
        &self,
        id: CompositionId,
    ) -> StoreResult<Option<Box<dyn CompositionUnit + '_>>>;
}

/// Staged changes to one composition and its comments.
///
/// Reads through the unit see its own staged changes.
pub trait CompositionUnit {
    fn id(&self) -> CompositionId;

    /// Working copy of the row, `None` once removal has been staged.
    fn composition(&self) -> Option<&Composition>;

    /// Mutable working copy, `None` once removal has been staged.
    fn composition_mut(&mut self) -> Option<&mut Composition>;

    /// Comments attached to this composition, including staged inserts and
    /// excluding staged removals, ordered like [`EntityStore::find_comments`].
    fn comments(&self) -> StoreResult<Vec<Comment>>;

    /// Stage a new comment on this composition and return it with its id.
    fn insert_comment(&mut self, new: NewComment) -> StoreResult<Comment>;

    /// Stage removal of a comment of this composition. `None` when no such
    /// comment is attached to it.
    fn remove_comment(&mut self, id: CommentId) -> StoreResult<Option<Comment>>;

    /// Stage removal of the composition itself. Commit fails while comments
    /// still reference it.
    fn remove_composition(&mut self);

    /// Apply every staged change atomically and release the row lock.
    fn commit(self: Box<Self>) -> StoreResult<()>;
}
