use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use stockflow_allocation::{ChangeSet, DemandDirectory, RepositoryError, StockUnitRepository};
use stockflow_core::{
    AggregateRoot, DemandId, DemandItemId, StockAssignmentId, StockUnitId, SubjectId,
};
use stockflow_demand::{Demand, ShipmentState};
use stockflow_stock::{StockUnit, StockUnitState};

use super::StoreError;

/// In-memory stock store with optimistic concurrency.
///
/// Intended for tests/dev. Every unit carries the version it was stored
/// with; a commit is rejected as a whole when any unit moved on since it
/// was loaded.
#[derive(Debug)]
pub struct InMemoryStockStore {
    units: RwLock<BTreeMap<StockUnitId, StockUnit>>,
    shipments: RwLock<HashMap<DemandId, ShipmentState>>,
    next_unit: AtomicU64,
    next_assignment: AtomicU64,
}

impl Default for InMemoryStockStore {
    fn default() -> Self {
        Self {
            units: RwLock::new(BTreeMap::new()),
            shipments: RwLock::new(HashMap::new()),
            next_unit: AtomicU64::new(1),
            next_assignment: AtomicU64::new(1),
        }
    }
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a unit whatever its version (supply receipts, fixtures).
    /// Returns the stored version.
    pub fn save(&self, mut unit: StockUnit) -> Result<u64, StoreError> {
        unit.verify()
            .map_err(|e| StoreError::InvalidCommit(e.to_string()))?;
        let mut units = self.units.write().map_err(|_| StoreError::Poisoned)?;

        let id = unit.id_typed();
        let version = units.get(&id).map(|u| u.version()).unwrap_or(0) + 1;
        self.reserve_ids(&unit);
        unit.mark_persisted(version);
        units.insert(id, unit);
        Ok(version)
    }

    pub fn unit(&self, id: StockUnitId) -> Result<Option<StockUnit>, StoreError> {
        let units = self.units.read().map_err(|_| StoreError::Poisoned)?;
        Ok(units.get(&id).cloned())
    }

    pub fn units(&self) -> Result<Vec<StockUnit>, StoreError> {
        let units = self.units.read().map_err(|_| StoreError::Poisoned)?;
        Ok(units.values().cloned().collect())
    }

    /// Make the shipment state of `demand` visible to other demands' passes.
    pub fn register_demand(&self, demand: &Demand) -> Result<(), StoreError> {
        self.set_shipment_state(demand.id_typed(), demand.shipment_state())
    }

    pub fn set_shipment_state(&self, demand: DemandId, state: ShipmentState) -> Result<(), StoreError> {
        let mut shipments = self.shipments.write().map_err(|_| StoreError::Poisoned)?;
        shipments.insert(demand, state);
        Ok(())
    }

    /// Apply a change set: every version is checked before anything is written.
    pub fn apply(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        for unit in &changes.saved {
            unit.verify()
                .map_err(|e| StoreError::InvalidCommit(e.to_string()))?;
        }

        let mut units = self.units.write().map_err(|_| StoreError::Poisoned)?;

        let stored = |id: &StockUnitId| units.get(id).map(|u| u.version());
        for unit in &changes.saved {
            let id = unit.id_typed();
            unit.expected_version()
                .check(format_args!("unit {id}"), stored(&id))
                .map_err(|e| StoreError::Concurrency(e.to_string()))?;
        }
        for (id, expected) in &changes.removed {
            if stored(id).is_none() || !expected.matches(stored(id)) {
                return Err(StoreError::Concurrency(format!(
                    "unit {id}: expected {expected:?} for removal, found {:?}",
                    stored(id)
                )));
            }
        }

        let saved = changes.saved.len();
        for mut unit in changes.saved {
            let id = unit.id_typed();
            self.reserve_ids(&unit);
            unit.mark_persisted(unit.version() + 1);
            units.insert(id, unit);
        }
        for (id, _) in &changes.removed {
            units.remove(id);
        }
        tracing::debug!(saved, removed = changes.removed.len(), "stock changes committed");
        Ok(())
    }

    fn select(&self, keep: impl Fn(&StockUnit) -> bool) -> Result<Vec<StockUnit>, StoreError> {
        let units = self.units.read().map_err(|_| StoreError::Poisoned)?;
        Ok(units.values().filter(|u| keep(u)).cloned().collect())
    }

    /// Keep id sequences ahead of ids stored from outside.
    fn reserve_ids(&self, unit: &StockUnit) {
        self.next_unit
            .fetch_max(unit.id_typed().get() + 1, Ordering::SeqCst);
        if let Some(max) = unit.assignments().iter().map(|a| a.id_typed().get()).max() {
            self.next_assignment.fetch_max(max + 1, Ordering::SeqCst);
        }
    }
}

impl StockUnitRepository for InMemoryStockStore {
    fn find_ready_units(&self, subject: SubjectId) -> Result<Vec<StockUnit>, RepositoryError> {
        Ok(self.select(|u| {
            u.subject_id() == subject
                && matches!(u.state(), StockUnitState::Ready | StockUnitState::Pending)
        })?)
    }

    fn find_assignable_units(&self, subject: SubjectId) -> Result<Vec<StockUnit>, RepositoryError> {
        Ok(self.select(|u| u.subject_id() == subject && u.state() != StockUnitState::Closed)?)
    }

    fn find_units_by_item(&self, item: DemandItemId) -> Result<Vec<StockUnit>, RepositoryError> {
        Ok(self.select(|u| u.assignment_for_item(item).is_some())?)
    }

    fn next_unit_id(&self) -> StockUnitId {
        StockUnitId::new(self.next_unit.fetch_add(1, Ordering::SeqCst))
    }

    fn next_assignment_id(&self) -> StockAssignmentId {
        StockAssignmentId::new(self.next_assignment.fetch_add(1, Ordering::SeqCst))
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        Ok(self.apply(changes)?)
    }
}

impl DemandDirectory for InMemoryStockStore {
    fn shipment_state(&self, demand: DemandId) -> Option<ShipmentState> {
        match self.shipments.read() {
            Ok(shipments) => shipments.get(&demand).copied(),
            Err(_) => {
                tracing::warn!(demand = %demand, "shipment directory lock poisoned");
                None
            }
        }
    }
}
