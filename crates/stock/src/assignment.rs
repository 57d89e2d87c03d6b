use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{
    DemandId, DemandItemId, Entity, Quantity, StockAssignmentId, StockUnitId,
};

/// The promise of a quantity of one stock unit to one demand line.
///
/// Assignments are owned by their unit (see [`crate::StockUnit`]); the demand
/// line and its top-level demand are non-owning id references. Quantity
/// mutations are only reachable through the owning unit so that the unit's
/// counters stay in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAssignment {
    id: StockAssignmentId,
    unit_id: StockUnitId,
    demand_item_id: DemandItemId,
    demand_id: DemandId,
    sold_quantity: Quantity,
    shipped_quantity: Quantity,
    locked_quantity: Quantity,
}

impl StockAssignment {
    /// A fresh assignment, not shipped nor locked.
    pub fn new(
        id: StockAssignmentId,
        unit_id: StockUnitId,
        demand_item_id: DemandItemId,
        demand_id: DemandId,
        sold_quantity: Quantity,
    ) -> Self {
        Self {
            id,
            unit_id,
            demand_item_id,
            demand_id,
            sold_quantity,
            shipped_quantity: Decimal::ZERO,
            locked_quantity: Decimal::ZERO,
        }
    }

    pub fn id_typed(&self) -> StockAssignmentId {
        self.id
    }

    pub fn unit_id(&self) -> StockUnitId {
        self.unit_id
    }

    pub fn demand_item_id(&self) -> DemandItemId {
        self.demand_item_id
    }

    pub fn demand_id(&self) -> DemandId {
        self.demand_id
    }

    pub fn sold_quantity(&self) -> Quantity {
        self.sold_quantity
    }

    pub fn shipped_quantity(&self) -> Quantity {
        self.shipped_quantity
    }

    pub fn locked_quantity(&self) -> Quantity {
        self.locked_quantity
    }

    /// Sold but not yet shipped: the part that could still move elsewhere.
    pub fn releasable_quantity(&self) -> Quantity {
        self.sold_quantity - self.shipped_quantity
    }

    pub fn is_fully_shipped(&self) -> bool {
        self.shipped_quantity == self.sold_quantity
    }

    pub(crate) fn set_unit(&mut self, unit_id: StockUnitId) {
        self.unit_id = unit_id;
    }

    pub(crate) fn add_sold(&mut self, quantity: Quantity) {
        self.sold_quantity += quantity;
    }

    /// Debit sold quantity; the locked part shrinks with the releasable part.
    pub(crate) fn sub_sold(&mut self, quantity: Quantity) {
        self.sold_quantity -= quantity;
        self.locked_quantity = self.locked_quantity.min(self.releasable_quantity());
    }

    pub(crate) fn add_shipped(&mut self, quantity: Quantity) {
        self.shipped_quantity += quantity;
        self.locked_quantity = self.locked_quantity.min(self.releasable_quantity());
    }

    pub(crate) fn add_locked(&mut self, quantity: Quantity) {
        self.locked_quantity = (self.locked_quantity + quantity).min(self.releasable_quantity());
    }

    /// Fold another assignment for the same demand line into this one.
    pub(crate) fn absorb(&mut self, other: &StockAssignment) {
        self.sold_quantity += other.sold_quantity;
        self.shipped_quantity += other.shipped_quantity;
        self.locked_quantity += other.locked_quantity;
    }
}

impl Entity for StockAssignment {
    type Id = StockAssignmentId;

    fn id(&self) -> StockAssignmentId {
        self.id
    }
}
