//! Ports the engine needs from its surroundings.

use std::sync::Arc;

use stockflow_core::{
    DemandId, DemandItemId, ExpectedVersion, StockAssignmentId, StockUnitId, SubjectId,
};
use stockflow_demand::ShipmentState;
use stockflow_stock::StockUnit;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// A unit changed (or appeared) since it was loaded.
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Stock unit persistence, queried by subject or by demand line.
pub trait StockUnitRepository: Send + Sync {
    /// Units of `subject` in state READY or PENDING.
    fn find_ready_units(&self, subject: SubjectId) -> Result<Vec<StockUnit>, RepositoryError>;

    /// Units of `subject` that are not closed (NEW, PENDING or READY).
    fn find_assignable_units(&self, subject: SubjectId)
    -> Result<Vec<StockUnit>, RepositoryError>;

    /// Units holding an assignment for `item`.
    fn find_units_by_item(&self, item: DemandItemId) -> Result<Vec<StockUnit>, RepositoryError>;

    fn next_unit_id(&self) -> StockUnitId;

    fn next_assignment_id(&self) -> StockAssignmentId;

    /// Apply a whole change set atomically, or nothing.
    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}

/// Read access to the state of demands other than the one being processed.
pub trait DemandDirectory: Send + Sync {
    fn shipment_state(&self, demand: DemandId) -> Option<ShipmentState>;
}

impl<R> StockUnitRepository for Arc<R>
where
    R: StockUnitRepository + ?Sized,
{
    fn find_ready_units(&self, subject: SubjectId) -> Result<Vec<StockUnit>, RepositoryError> {
        (**self).find_ready_units(subject)
    }

    fn find_assignable_units(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<StockUnit>, RepositoryError> {
        (**self).find_assignable_units(subject)
    }

    fn find_units_by_item(&self, item: DemandItemId) -> Result<Vec<StockUnit>, RepositoryError> {
        (**self).find_units_by_item(item)
    }

    fn next_unit_id(&self) -> StockUnitId {
        (**self).next_unit_id()
    }

    fn next_assignment_id(&self) -> StockAssignmentId {
        (**self).next_assignment_id()
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        (**self).commit(changes)
    }
}

impl<D> DemandDirectory for Arc<D>
where
    D: DemandDirectory + ?Sized,
{
    fn shipment_state(&self, demand: DemandId) -> Option<ShipmentState> {
        (**self).shipment_state(demand)
    }
}

/// Everything a pass wants persisted.
///
/// Units carry the version they were loaded with (0 for units created during
/// the pass); the store rejects the whole set if any of them moved on.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub saved: Vec<StockUnit>,
    pub removed: Vec<(StockUnitId, ExpectedVersion)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.saved.len() + self.removed.len()
    }
}
