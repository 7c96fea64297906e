//! Title prefix search.

use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::models::Composition;
use crate::store::EntityStore;

#[derive(Clone)]
pub struct CompositionSearch {
    store: Arc<dyn EntityStore>,
}

impl CompositionSearch {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Compositions whose title starts with `query`, in insertion order.
    ///
    /// Case-sensitive and unnormalized. Scans every composition.
    pub fn search_by_title_prefix(&self, query: &str) -> ServiceResult<Vec<Composition>> {
        if query.trim().is_empty() {
            return Err(ServiceError::EmptyQuery);
        }

        Ok(self
            .store
            .compositions()?
            .into_iter()
            .filter(|composition| composition.title.starts_with(query))
            .collect())
    }
}
