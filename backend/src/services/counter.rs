//! Comment counter maintenance.
//!
//! `Composition::comment_count` is a denormalized copy of the number of
//! comments attached to a composition. Every adjustment happens inside the
//! composition's unit of work, so concurrent adjustments on the same
//! composition are applied one after another and none is lost.
//!
//! The `*_in` functions adjust the counter inside a unit the caller already
//! holds; comment insertion and removal use them so that the row change and
//! the counter change commit together. [`CounterCoordinator::increment`] and
//! [`CounterCoordinator::decrement`] open and commit a unit of their own.

use serde::Serialize;
use std::sync::Arc;

use crate::api::logs::{activity_success, activity_warning};
use crate::error::{ServiceError, ServiceResult};
use crate::models::CompositionId;
use crate::store::{CompositionUnit, EntityStore};

/// Recorded counter versus the comments actually attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDrift {
    pub composition_id: CompositionId,
    pub recorded: u32,
    pub actual: u32,
}

impl CounterDrift {
    pub fn is_drifted(&self) -> bool {
        self.recorded != self.actual
    }
}

#[derive(Clone)]
pub struct CounterCoordinator {
    store: Arc<dyn EntityStore>,
}

impl CounterCoordinator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Raise the counter by one in a unit of its own.
    pub fn increment(&self, id: CompositionId) -> ServiceResult<u32> {
        let mut unit = self.lock(id)?;
        let count = Self::increment_in(unit.as_mut())?;
        unit.commit()?;
        Ok(count)
    }

    /// Lower the counter by one, never below zero, in a unit of its own.
    pub fn decrement(&self, id: CompositionId) -> ServiceResult<u32> {
        let mut unit = self.lock(id)?;
        let count = Self::decrement_in(unit.as_mut())?;
        unit.commit()?;
        Ok(count)
    }

    /// Stage `+1` on the unit's composition.
    pub fn increment_in(unit: &mut dyn CompositionUnit) -> ServiceResult<u32> {
        let id = unit.id();
        let composition = unit
            .composition_mut()
            .ok_or(ServiceError::ConsistencyViolation(id))?;
        composition.comment_count = composition.comment_count.saturating_add(1);
        Ok(composition.comment_count)
    }

    /// Stage `-1` on the unit's composition, clamped at zero.
    pub fn decrement_in(unit: &mut dyn CompositionUnit) -> ServiceResult<u32> {
        let id = unit.id();
        let composition = unit
            .composition_mut()
            .ok_or(ServiceError::ConsistencyViolation(id))?;
        composition.comment_count = composition.comment_count.saturating_sub(1);
        Ok(composition.comment_count)
    }

    /// Recount the comments of one composition and store the true count.
    pub fn reconcile(&self, id: CompositionId) -> ServiceResult<CounterDrift> {
        let unit = self
            .store
            .lock_composition(id)?
            .ok_or(ServiceError::CompositionNotFound(id))?;
        self.reconcile_unit(unit, true)
    }

    /// Check every composition. Returns only the drifted ones; with `repair`
    /// their counters are corrected.
    pub fn reconcile_all(&self, repair: bool) -> ServiceResult<Vec<CounterDrift>> {
        let mut drifted = Vec::new();
        for composition in self.store.compositions()? {
            // Removed since the scan started.
            let Some(unit) = self.store.lock_composition(composition.id)? else {
                continue;
            };
            let drift = self.reconcile_unit(unit, repair)?;
            if drift.is_drifted() {
                drifted.push(drift);
            }
        }
        Ok(drifted)
    }

    fn reconcile_unit(
        &self,
        mut unit: Box<dyn CompositionUnit + '_>,
        repair: bool,
    ) -> ServiceResult<CounterDrift> {
        let id = unit.id();
        let actual = u32::try_from(unit.comments()?.len()).unwrap_or(u32::MAX);
        let recorded = unit
            .composition()
            .ok_or(ServiceError::ConsistencyViolation(id))?
            .comment_count;
        let drift = CounterDrift {
            composition_id: id,
            recorded,
            actual,
        };

        if drift.is_drifted() {
            if repair {
                if let Some(composition) = unit.composition_mut() {
                    composition.comment_count = actual;
                }
                unit.commit()?;
                activity_success(
                    format!("Counter of composition {id} repaired: {recorded} -> {actual}"),
                    Some(id),
                );
            } else {
                activity_warning(
                    format!("Counter of composition {id} drifted: recorded {recorded}, actual {actual}"),
                    Some(id),
                );
            }
        }
        Ok(drift)
    }

    fn lock(&self, id: CompositionId) -> ServiceResult<Box<dyn CompositionUnit + '_>> {
        self.store
            .lock_composition(id)?
            .ok_or(ServiceError::ConsistencyViolation(id))
    }
}
