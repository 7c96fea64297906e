//! Comment lifecycle: create, edit, delete and list.
//!
//! Creating or deleting a comment and adjusting its composition's counter
//! are staged in the same unit of work and committed together; a failure in
//! either step leaves both untouched.

use chrono::Utc;
use std::sync::Arc;

use crate::api::logs::{activity_info, activity_success};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Comment, CommentId, CompositionId, NewComment, UserId};
use crate::services::counter::CounterCoordinator;
use crate::store::{CommentFilter, EntityStore};
use crate::validation;

// =============================================================================
// Capability Hook
// =============================================================================

/// Decides whether a requester may edit or delete a comment.
///
/// Invoked after the comment is fetched and before anything is written.
pub trait CommentAccess: Send + Sync {
    fn may_modify(&self, requester: UserId, comment: &Comment) -> bool;
}

/// Only the comment's author may modify it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorOnly;

impl CommentAccess for AuthorOnly {
    fn may_modify(&self, requester: UserId, comment: &Comment) -> bool {
        comment.author_user_id == requester
    }
}

/// Anyone may modify any comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl CommentAccess for Unrestricted {
    fn may_modify(&self, _requester: UserId, _comment: &Comment) -> bool {
        true
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Clone)]
pub struct CommentLifecycle {
    store: Arc<dyn EntityStore>,
    access: Arc<dyn CommentAccess>,
    max_content_chars: usize,
}

impl CommentLifecycle {
    pub fn new(
        store: Arc<dyn EntityStore>,
        access: Arc<dyn CommentAccess>,
        max_content_chars: usize,
    ) -> Self {
        Self {
            store,
            access,
            max_content_chars,
        }
    }

    /// Attach a new comment to a composition and bump its counter.
    pub fn add_comment(
        &self,
        content: &str,
        composition_id: CompositionId,
        author: UserId,
    ) -> ServiceResult<Comment> {
        let content = validation::comment_content(content, self.max_content_chars)?;

        if self.store.composition(composition_id)?.is_none() {
            return Err(ServiceError::CompositionNotFound(composition_id));
        }

        // Removed between the check above and taking the row lock.
        let mut unit = self
            .store
            .lock_composition(composition_id)?
            .ok_or(ServiceError::ConsistencyViolation(composition_id))?;

        let comment = unit.insert_comment(NewComment {
            author_user_id: author,
            content,
            added_at: Utc::now(),
        })?;
        let count = CounterCoordinator::increment_in(unit.as_mut())?;
        unit.commit()?;

        activity_success(
            format!(
                "Comment {} added to composition {composition_id} by user {author} ({count} total)",
                comment.id
            ),
            Some(composition_id),
        );
        Ok(comment)
    }

    /// Replace a comment's content. `added_at` and the composition never change.
    pub fn edit_comment(
        &self,
        comment_id: CommentId,
        requester: UserId,
        new_content: &str,
    ) -> ServiceResult<Comment> {
        let content = validation::comment_content(new_content, self.max_content_chars)?;

        let comment = self
            .store
            .comment(comment_id)?
            .ok_or(ServiceError::CommentNotFound(comment_id))?;
        self.check_access(requester, &comment)?;

        let updated = self
            .store
            .update_comment_content(comment_id, content)?
            .ok_or(ServiceError::CommentNotFound(comment_id))?;

        activity_info(
            format!("Comment {comment_id} edited by user {requester}"),
            Some(updated.composition_id),
        );
        Ok(updated)
    }

    /// Delete a comment and lower its composition's counter.
    pub fn delete_comment(&self, comment_id: CommentId, requester: UserId) -> ServiceResult<Comment> {
        let comment = self
            .store
            .comment(comment_id)?
            .ok_or(ServiceError::CommentNotFound(comment_id))?;
        self.check_access(requester, &comment)?;

        let composition_id = comment.composition_id;
        let Some(mut unit) = self.store.lock_composition(composition_id)? else {
            // A cascade removal that took the comment with it is just a miss.
            return Err(match self.store.comment(comment_id)? {
                None => ServiceError::CommentNotFound(comment_id),
                Some(_) => ServiceError::ConsistencyViolation(composition_id),
            });
        };

        // A concurrent delete may have won the row lock first.
        let removed = unit
            .remove_comment(comment_id)?
            .ok_or(ServiceError::CommentNotFound(comment_id))?;
        let count = CounterCoordinator::decrement_in(unit.as_mut())?;
        unit.commit()?;

        activity_success(
            format!(
                "Comment {comment_id} removed from composition {composition_id} ({count} left)"
            ),
            Some(composition_id),
        );
        Ok(removed)
    }

    /// Comments of one composition, oldest first.
    pub fn list_by_composition(&self, composition_id: CompositionId) -> ServiceResult<Vec<Comment>> {
        Ok(self
            .store
            .find_comments(CommentFilter::Composition(composition_id))?)
    }

    /// Comments written by one user, oldest first.
    pub fn list_by_user(&self, user: UserId) -> ServiceResult<Vec<Comment>> {
        Ok(self.store.find_comments(CommentFilter::Author(user))?)
    }

    fn check_access(&self, requester: UserId, comment: &Comment) -> ServiceResult<()> {
        if self.access.may_modify(requester, comment) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden {
                requester,
                comment: comment.id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreResult, ValidationError};
    use crate::models::{Composition, CompositionDraft, NewComposition};
    use crate::store::{CompositionFilter, CompositionUnit, MemoryStore};
    use crate::validation::validate_composition;
    use chrono::DateTime;

    /// Store whose row lock always reports the composition as gone, while
    /// plain reads still see it. With `cascade` set, taking the lock first
    /// removes the composition and its comments, as a racing cascade would.
    struct LostRowStore {
        inner: Arc<MemoryStore>,
        cascade: bool,
    }

    impl EntityStore for LostRowStore {
        fn insert_composition(
            &self,
            new: NewComposition,
            added_at: DateTime<Utc>,
        ) -> StoreResult<Composition> {
            self.inner.insert_composition(new, added_at)
        }

        fn composition(&self, id: CompositionId) -> StoreResult<Option<Composition>> {
            self.inner.composition(id)
        }

        fn compositions(&self) -> StoreResult<Vec<Composition>> {
            self.inner.compositions()
        }

        fn find_compositions(&self, filter: CompositionFilter) -> StoreResult<Vec<Composition>> {
            self.inner.find_compositions(filter)
        }

        fn comment(&self, id: CommentId) -> StoreResult<Option<Comment>> {
            self.inner.comment(id)
        }

        fn find_comments(&self, filter: CommentFilter) -> StoreResult<Vec<Comment>> {
            self.inner.find_comments(filter)
        }

        fn update_comment_content(
            &self,
            id: CommentId,
            content: String,
        ) -> StoreResult<Option<Comment>> {
            self.inner.update_comment_content(id, content)
        }

        fn lock_composition(
            &self,
            id: CompositionId,
        ) -> StoreResult<Option<Box<dyn CompositionUnit + '_>>> {
            if self.cascade {
                if let Some(mut unit) = self.inner.lock_composition(id)? {
                    for comment in unit.comments()? {
                        unit.remove_comment(comment.id)?;
                    }
                    unit.remove_composition();
                    unit.commit()?;
                }
            }
            Ok(None)
        }
    }

    const AUTHOR: UserId = UserId(10);
    const STRANGER: UserId = UserId(11);

    fn setup() -> (Arc<MemoryStore>, CommentLifecycle, Composition) {
        let store = Arc::new(MemoryStore::new());
        let draft = CompositionDraft {
            title: "Für Elise".into(),
            author: "Beethoven".into(),
            length: 180,
            year: 1810,
            diff: 0,
            pages: 4,
            video: "https://www.youtube.com/watch?v=_mVW8tgGY_w".into(),
            sheet: "https://imslp.org/elise.pdf".into(),
        };
        let composition = store
            .insert_composition(validate_composition(&draft, UserId(1)).unwrap(), Utc::now())
            .unwrap();
        let lifecycle = CommentLifecycle::new(store.clone(), Arc::new(AuthorOnly), 200);
        (store, lifecycle, composition)
    }

    fn count(store: &MemoryStore, id: CompositionId) -> u32 {
        store.composition(id).unwrap().unwrap().comment_count
    }

    #[test]
    fn test_add_then_delete_nets_zero() {
        let (store, lifecycle, composition) = setup();

        let comment = lifecycle.add_comment("Lovely", composition.id, AUTHOR).unwrap();
        assert_eq!(comment.composition_id, composition.id);
        assert_eq!(count(&store, composition.id), 1);

        lifecycle.delete_comment(comment.id, AUTHOR).unwrap();
        assert_eq!(count(&store, composition.id), 0);
        assert!(store.comment(comment.id).unwrap().is_none());
    }

    #[test]
    fn test_add_aborts_when_row_lock_finds_no_composition() {
        let (store, _lifecycle, composition) = setup();
        let lost = LostRowStore {
            inner: store.clone(),
            cascade: false,
        };
        let lifecycle = CommentLifecycle::new(Arc::new(lost), Arc::new(AuthorOnly), 200);

        let err = lifecycle.add_comment("Too late", composition.id, AUTHOR).unwrap_err();
        assert!(matches!(err, ServiceError::ConsistencyViolation(id) if id == composition.id));
        assert!(store
            .find_comments(CommentFilter::Composition(composition.id))
            .unwrap()
            .is_empty());
        assert!(store.find_comments(CommentFilter::Author(AUTHOR)).unwrap().is_empty());
        assert_eq!(count(&store, composition.id), 0);
    }

    #[test]
    fn test_delete_aborts_when_row_lock_finds_no_composition() {
        let (store, seeding, composition) = setup();
        let comment = seeding.add_comment("Still here", composition.id, AUTHOR).unwrap();
        let lost = LostRowStore {
            inner: store.clone(),
            cascade: false,
        };
        let lifecycle = CommentLifecycle::new(Arc::new(lost), Arc::new(AuthorOnly), 200);

        let err = lifecycle.delete_comment(comment.id, AUTHOR).unwrap_err();
        assert!(matches!(err, ServiceError::ConsistencyViolation(id) if id == composition.id));
        assert!(store.comment(comment.id).unwrap().is_some());
        assert_eq!(count(&store, composition.id), 1);
    }

    #[test]
    fn test_delete_after_cascade_removal_is_not_found() {
        let (store, seeding, composition) = setup();
        let comment = seeding.add_comment("Swept away", composition.id, AUTHOR).unwrap();
        let cascading = LostRowStore {
            inner: store.clone(),
            cascade: true,
        };
        let lifecycle = CommentLifecycle::new(Arc::new(cascading), Arc::new(AuthorOnly), 200);

        let err = lifecycle.delete_comment(comment.id, AUTHOR).unwrap_err();
        assert!(matches!(err, ServiceError::CommentNotFound(id) if id == comment.id));
        assert!(store.composition(composition.id).unwrap().is_none());
        assert!(store.comment(comment.id).unwrap().is_none());
    }

    #[test]
    fn test_invalid_content_writes_nothing() {
        let (store, lifecycle, composition) = setup();

        let err = lifecycle.add_comment("   ", composition.id, AUTHOR).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::Empty { field: "content" })
        ));
        let err = lifecycle
            .add_comment(&"x".repeat(201), composition.id, AUTHOR)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::TooLong { .. })));
        assert_eq!(count(&store, composition.id), 0);
    }

    #[test]
    fn test_add_to_missing_composition_is_not_found() {
        let (_store, lifecycle, _composition) = setup();
        let err = lifecycle.add_comment("Hello", CompositionId(77), AUTHOR).unwrap_err();
        assert!(matches!(err, ServiceError::CompositionNotFound(CompositionId(77))));
    }

    #[test]
    fn test_edit_only_changes_content() {
        let (_store, lifecycle, composition) = setup();
        let original = lifecycle.add_comment("First take", composition.id, AUTHOR).unwrap();

        let edited = lifecycle.edit_comment(original.id, AUTHOR, "Second take").unwrap();
        assert_eq!(edited.content, "Second take");
        assert_eq!(edited.added_at, original.added_at);
        assert_eq!(edited.composition_id, original.composition_id);
    }

    #[test]
    fn test_capability_check_runs_before_mutation() {
        let (store, lifecycle, composition) = setup();
        let comment = lifecycle.add_comment("Mine", composition.id, AUTHOR).unwrap();

        assert!(matches!(
            lifecycle.edit_comment(comment.id, STRANGER, "Hijacked"),
            Err(ServiceError::Forbidden { .. })
        ));
        assert!(matches!(
            lifecycle.delete_comment(comment.id, STRANGER),
            Err(ServiceError::Forbidden { .. })
        ));
        assert_eq!(store.comment(comment.id).unwrap().unwrap().content, "Mine");
        assert_eq!(count(&store, composition.id), 1);
    }

    #[test]
    fn test_unrestricted_access_allows_anyone() {
        let (store, _lifecycle, composition) = setup();
        let lifecycle = CommentLifecycle::new(store.clone(), Arc::new(Unrestricted), 200);
        let comment = lifecycle.add_comment("Open", composition.id, AUTHOR).unwrap();
        lifecycle.delete_comment(comment.id, STRANGER).unwrap();
        assert_eq!(count(&store, composition.id), 0);
    }

    #[test]
    fn test_missing_comment_is_not_found() {
        let (_store, lifecycle, _composition) = setup();
        assert!(matches!(
            lifecycle.edit_comment(CommentId(5), AUTHOR, "text"),
            Err(ServiceError::CommentNotFound(CommentId(5)))
        ));
        assert!(matches!(
            lifecycle.delete_comment(CommentId(5), AUTHOR),
            Err(ServiceError::CommentNotFound(CommentId(5)))
        ));
    }

    #[test]
    fn test_lists_are_in_insertion_order() {
        let (_store, lifecycle, composition) = setup();
        for text in ["a", "b", "c"] {
            lifecycle.add_comment(text, composition.id, AUTHOR).unwrap();
        }
        lifecycle.add_comment("other", composition.id, STRANGER).unwrap();

        let contents: Vec<_> = lifecycle
            .list_by_composition(composition.id)
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["a", "b", "c", "other"]);

        let mine = lifecycle.list_by_user(AUTHOR).unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.iter().all(|c| c.author_user_id == AUTHOR));
    }
}
