//! In-memory fixtures for the engine's unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;

use stockflow_core::{
    DemandId, DemandItemId, Quantity, StockAssignmentId, StockUnitId, SubjectId, SupplyLineId,
};
use stockflow_demand::ShipmentState;
use stockflow_stock::{StockUnit, StockUnitState};

use crate::repository::{ChangeSet, DemandDirectory, RepositoryError, StockUnitRepository};

pub(crate) const SUBJECT: SubjectId = SubjectId::new(1);

pub(crate) struct FakeStore {
    units: Mutex<BTreeMap<StockUnitId, StockUnit>>,
    shipments: Mutex<HashMap<DemandId, ShipmentState>>,
    next_unit: AtomicU64,
    next_assignment: AtomicU64,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self {
            units: Mutex::new(BTreeMap::new()),
            shipments: Mutex::new(HashMap::new()),
            next_unit: AtomicU64::new(100),
            next_assignment: AtomicU64::new(1000),
        }
    }

    pub(crate) fn put(&self, unit: StockUnit) {
        self.units.lock().unwrap().insert(unit.id_typed(), unit);
    }

    pub(crate) fn set_shipment(&self, demand: u64, state: ShipmentState) {
        self.shipments
            .lock()
            .unwrap()
            .insert(DemandId::new(demand), state);
    }

    fn select(&self, keep: impl Fn(&StockUnit) -> bool) -> Vec<StockUnit> {
        self.units
            .lock()
            .unwrap()
            .values()
            .filter(|u| keep(u))
            .cloned()
            .collect()
    }
}

impl StockUnitRepository for FakeStore {
    fn find_ready_units(&self, subject: SubjectId) -> Result<Vec<StockUnit>, RepositoryError> {
        Ok(self.select(|u| {
            u.subject_id() == subject
                && matches!(u.state(), StockUnitState::Ready | StockUnitState::Pending)
        }))
    }

    fn find_assignable_units(&self, subject: SubjectId) -> Result<Vec<StockUnit>, RepositoryError> {
        Ok(self.select(|u| u.subject_id() == subject && u.state() != StockUnitState::Closed))
    }

    fn find_units_by_item(&self, item: DemandItemId) -> Result<Vec<StockUnit>, RepositoryError> {
        Ok(self.select(|u| u.assignment_for_item(item).is_some()))
    }

    fn next_unit_id(&self) -> StockUnitId {
        StockUnitId::new(self.next_unit.fetch_add(1, Ordering::SeqCst))
    }

    fn next_assignment_id(&self) -> StockAssignmentId {
        StockAssignmentId::new(self.next_assignment.fetch_add(1, Ordering::SeqCst))
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut units = self.units.lock().unwrap();
        for unit in changes.saved {
            units.insert(unit.id_typed(), unit);
        }
        for (id, _) in changes.removed {
            units.remove(&id);
        }
        Ok(())
    }
}

impl DemandDirectory for FakeStore {
    fn shipment_state(&self, demand: DemandId) -> Option<ShipmentState> {
        self.shipments.lock().unwrap().get(&demand).copied()
    }
}

/// A unit fed by a supply line of `ordered`, `received` of which arrived.
pub(crate) fn unit(id: u64, ordered: Quantity, received: Quantity) -> StockUnit {
    let mut unit = StockUnit::new(StockUnitId::new(id), SUBJECT);
    unit.link_supply(SupplyLineId::new(id), ordered, Decimal::ONE)
        .unwrap();
    if received > Decimal::ZERO {
        unit.receive(received).unwrap();
    }
    unit.mark_persisted(1);
    unit
}

/// A stored virtual unit: no supply line yet.
pub(crate) fn virtual_unit(id: u64) -> StockUnit {
    let mut unit = StockUnit::new(StockUnitId::new(id), SUBJECT);
    unit.mark_persisted(1);
    unit
}

/// Credit `quantity` of line `item` (demand `demand`) as assignment `id`.
pub(crate) fn assign(unit: &mut StockUnit, id: u64, item: u64, demand: u64, quantity: Quantity) {
    unit.credit(
        DemandItemId::new(item),
        DemandId::new(demand),
        quantity,
        || StockAssignmentId::new(id),
    )
    .unwrap();
}

pub(crate) fn sold_of_item(units: &[&StockUnit], item: u64) -> Quantity {
    units
        .iter()
        .filter_map(|u| u.assignment_for_item(DemandItemId::new(item)))
        .map(|a| a.sold_quantity())
        .sum()
}
