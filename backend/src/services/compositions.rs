//! Composition catalogue: create, read, list and remove.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::logs::{activity_success, activity_warning};
use crate::error::{ConfigError, ServiceError, ServiceResult};
use crate::models::{Composition, CompositionDraft, CompositionId, Difficulty, UserId};
use crate::store::{CompositionFilter, EntityStore};
use crate::validation;

/// What happens to a composition's comments when it is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Refuse the removal while any comment is attached.
    #[default]
    Reject,
    /// Delete the attached comments together with the composition.
    Cascade,
}

impl FromStr for RemovalPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "cascade" => Ok(Self::Cascade),
            other => Err(ConfigError::InvalidValue {
                key: "removal policy".into(),
                message: format!("expected 'reject' or 'cascade', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reject => "reject",
            Self::Cascade => "cascade",
        })
    }
}

/// A composition that was removed, and how many comments went with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub composition: Composition,
    pub removed_comments: usize,
}

#[derive(Clone)]
pub struct CompositionCatalog {
    store: Arc<dyn EntityStore>,
    removal_policy: RemovalPolicy,
}

impl CompositionCatalog {
    pub fn new(store: Arc<dyn EntityStore>, removal_policy: RemovalPolicy) -> Self {
        Self {
            store,
            removal_policy,
        }
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy
    }

    /// Validate every field and store the composition with a zero counter.
    pub fn add_composition(
        &self,
        draft: &CompositionDraft,
        adder: UserId,
    ) -> ServiceResult<Composition> {
        let new = validation::validate_composition(draft, adder)?;
        let composition = self.store.insert_composition(new, Utc::now())?;

        activity_success(
            format!(
                "Composition {} '{}' added by user {adder}",
                composition.id, composition.title
            ),
            Some(composition.id),
        );
        Ok(composition)
    }

    pub fn by_id(&self, id: CompositionId) -> ServiceResult<Composition> {
        self.store
            .composition(id)?
            .ok_or(ServiceError::CompositionNotFound(id))
    }

    /// Every composition, in insertion order.
    pub fn all(&self) -> ServiceResult<Vec<Composition>> {
        Ok(self.store.compositions()?)
    }

    pub fn by_difficulty(&self, difficulty: Difficulty) -> ServiceResult<Vec<Composition>> {
        Ok(self
            .store
            .find_compositions(CompositionFilter::Difficulty(difficulty))?)
    }

    pub fn by_adder(&self, adder: UserId) -> ServiceResult<Vec<Composition>> {
        Ok(self.store.find_compositions(CompositionFilter::Adder(adder))?)
    }

    /// Remove a composition, resolving attached comments per the policy.
    pub fn remove(&self, id: CompositionId) -> ServiceResult<Removal> {
        let mut unit = self
            .store
            .lock_composition(id)?
            .ok_or(ServiceError::CompositionNotFound(id))?;

        let composition = unit
            .composition()
            .cloned()
            .ok_or(ServiceError::CompositionNotFound(id))?;
        let attached = unit.comments()?;

        if !attached.is_empty() {
            match self.removal_policy {
                RemovalPolicy::Reject => {
                    activity_warning(
                        format!(
                            "Removal of composition {id} refused: {} comment(s) attached",
                            attached.len()
                        ),
                        Some(id),
                    );
                    return Err(ServiceError::ReferentialIntegrity {
                        id,
                        comments: attached.len(),
                    });
                }
                RemovalPolicy::Cascade => {
                    for comment in &attached {
                        unit.remove_comment(comment.id)?;
                    }
                }
            }
        }

        unit.remove_composition();
        unit.commit()?;

        let removed_comments = match self.removal_policy {
            RemovalPolicy::Cascade => attached.len(),
            RemovalPolicy::Reject => 0,
        };
        activity_success(
            format!(
                "Composition {id} '{}' removed with {removed_comments} comment(s)",
                composition.title
            ),
            Some(id),
        );
        Ok(Removal {
            composition,
            removed_comments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::services::comments::{AuthorOnly, CommentLifecycle};
    use crate::store::{CommentFilter, MemoryStore};
    use rstest::rstest;

    fn draft(title: &str, diff: i64) -> CompositionDraft {
        CompositionDraft {
            title: title.into(),
            author: "Bach".into(),
            length: 120,
            year: 1722,
            diff,
            pages: 2,
            video: "https://www.youtube.com/watch?v=frxT2qB1POQ".into(),
            sheet: "https://imslp.org/bwv846.pdf".into(),
        }
    }

    fn setup(policy: RemovalPolicy) -> (Arc<MemoryStore>, CompositionCatalog, CommentLifecycle) {
        let store = Arc::new(MemoryStore::new());
        let catalog = CompositionCatalog::new(store.clone(), policy);
        let comments = CommentLifecycle::new(store.clone(), Arc::new(AuthorOnly), 500);
        (store, catalog, comments)
    }

    #[test]
    fn test_added_composition_starts_with_zero_comments() {
        let (_store, catalog, _comments) = setup(RemovalPolicy::Reject);
        let composition = catalog.add_composition(&draft("Prelude in C", 0), UserId(4)).unwrap();
        assert_eq!(composition.comment_count, 0);
        assert_eq!(composition.adder_id, UserId(4));
        assert_eq!(catalog.by_id(composition.id).unwrap(), composition);
    }

    #[test]
    fn test_invalid_draft_is_rejected() {
        let (store, catalog, _comments) = setup(RemovalPolicy::Reject);
        let err = catalog.add_composition(&draft("", 5), UserId(4)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::Fields(ref e)) if e.len() == 2));
        assert!(store.compositions().unwrap().is_empty());
    }

    #[test]
    fn test_queries_filter_by_field() {
        let (_store, catalog, _comments) = setup(RemovalPolicy::Reject);
        catalog.add_composition(&draft("Easy", 0), UserId(1)).unwrap();
        catalog.add_composition(&draft("Hard", 2), UserId(2)).unwrap();
        catalog.add_composition(&draft("Also easy", 0), UserId(2)).unwrap();

        let easy: Vec<_> = catalog
            .by_difficulty(Difficulty::Beginner)
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(easy, vec!["Easy", "Also easy"]);
        assert_eq!(catalog.by_adder(UserId(2)).unwrap().len(), 2);
        assert!(catalog.by_difficulty(Difficulty::Intermediate).unwrap().is_empty());
    }

    #[test]
    fn test_reject_policy_keeps_composition_and_comments() {
        let (store, catalog, comments) = setup(RemovalPolicy::Reject);
        let composition = catalog.add_composition(&draft("Invention", 1), UserId(1)).unwrap();
        comments.add_comment("Nice", composition.id, UserId(2)).unwrap();

        let err = catalog.remove(composition.id).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ReferentialIntegrity { comments: 1, .. }
        ));
        assert!(store.composition(composition.id).unwrap().is_some());
        assert_eq!(
            store
                .find_comments(CommentFilter::Composition(composition.id))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_cascade_policy_removes_comments() {
        let (store, catalog, comments) = setup(RemovalPolicy::Cascade);
        let composition = catalog.add_composition(&draft("Sinfonia", 1), UserId(1)).unwrap();
        comments.add_comment("One", composition.id, UserId(2)).unwrap();
        comments.add_comment("Two", composition.id, UserId(3)).unwrap();

        let removal = catalog.remove(composition.id).unwrap();
        assert_eq!(removal.removed_comments, 2);
        assert_eq!(removal.composition.title, "Sinfonia");
        assert!(store.composition(composition.id).unwrap().is_none());
        assert!(comments.list_by_user(UserId(2)).unwrap().is_empty());
        assert!(comments.list_by_user(UserId(3)).unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let (_store, catalog, _comments) = setup(RemovalPolicy::Cascade);
        assert!(matches!(
            catalog.remove(CompositionId(3)),
            Err(ServiceError::CompositionNotFound(CompositionId(3)))
        ));
    }

    #[test]
    fn test_comment_on_removed_composition_fails() {
        let (_store, catalog, comments) = setup(RemovalPolicy::Reject);
        let composition = catalog.add_composition(&draft("Gigue", 2), UserId(1)).unwrap();
        catalog.remove(composition.id).unwrap();

        assert!(matches!(
            comments.add_comment("Too late", composition.id, UserId(2)),
            Err(ServiceError::CompositionNotFound(_))
        ));
    }

    #[rstest]
    #[case("reject", RemovalPolicy::Reject)]
    #[case("Cascade", RemovalPolicy::Cascade)]
    #[case(" cascade ", RemovalPolicy::Cascade)]
    fn test_policy_parsing(#[case] raw: &str, #[case] expected: RemovalPolicy) {
        assert_eq!(raw.parse::<RemovalPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_policy_is_config_error() {
        assert!("orphan".parse::<RemovalPolicy>().is_err());
    }
}
