//! Catalogue operations built on an [`EntityStore`].
//!
//! - [`compositions`] - create, read, list and remove compositions
//! - [`comments`] - comment lifecycle and the capability hook
//! - [`counter`] - comment counter maintenance and reconciliation
//! - [`patch`] - single-field composition updates
//! - [`search`] - title prefix search

pub mod comments;
pub mod compositions;
pub mod counter;
pub mod patch;
pub mod search;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::EntityStore;

pub use comments::{AuthorOnly, CommentAccess, CommentLifecycle, Unrestricted};
pub use compositions::{CompositionCatalog, Removal, RemovalPolicy};
pub use counter::{CounterCoordinator, CounterDrift};
pub use patch::{AttributePatchEngine, NoOpReason, PatchField, PatchOutcome};
pub use search::CompositionSearch;

/// Every service, sharing one store.
#[derive(Clone)]
pub struct Services {
    pub compositions: CompositionCatalog,
    pub comments: CommentLifecycle,
    pub counter: CounterCoordinator,
    pub patch: AttributePatchEngine,
    pub search: CompositionSearch,
}

impl Services {
    /// Wire services with the default [`AuthorOnly`] capability check.
    pub fn new(store: Arc<dyn EntityStore>, config: &AppConfig) -> Self {
        Self::with_access(store, config, Arc::new(AuthorOnly))
    }

    pub fn with_access(
        store: Arc<dyn EntityStore>,
        config: &AppConfig,
        access: Arc<dyn CommentAccess>,
    ) -> Self {
        Self {
            compositions: CompositionCatalog::new(store.clone(), config.removal_policy),
            comments: CommentLifecycle::new(store.clone(), access, config.max_comment_len),
            counter: CounterCoordinator::new(store.clone()),
            patch: AttributePatchEngine::new(store.clone()),
            search: CompositionSearch::new(store),
        }
    }
}
