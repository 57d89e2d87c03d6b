use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::quantity::{ensure_non_negative, ensure_positive, floor_zero};
use stockflow_core::{
    AggregateRoot, DemandId, DemandItemId, DomainError, DomainResult, Entity, Quantity,
    StockAssignmentId, StockUnitId, SubjectId, SupplyLineId,
};

use crate::assignment::StockAssignment;

/// Stock unit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockUnitState {
    /// Virtual unit created for a demand, no supply yet.
    New,
    /// Linked to an inbound supply line, nothing received.
    Pending,
    /// Some quantity physically received.
    Ready,
    /// Everything received has been shipped.
    Closed,
}

impl StockUnitState {
    pub fn as_str(self) -> &'static str {
        match self {
            StockUnitState::New => "new",
            StockUnitState::Pending => "pending",
            StockUnitState::Ready => "ready",
            StockUnitState::Closed => "closed",
        }
    }
}

impl core::fmt::Display for StockUnitState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to an assignment attached to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The assignment now points at this unit.
    Attached,
    /// The unit already held an assignment for the same demand line; the
    /// incoming one was folded into it and no longer exists.
    Merged { into: StockAssignmentId },
}

/// What happened to an assignment debited on a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The assignment still holds some sold quantity.
    Reduced,
    /// Its sold quantity reached zero; it was removed from the unit.
    Removed(StockAssignment),
}

/// Aggregate root: StockUnit (one lot of a subject).
///
/// `ordered_quantity` is the *outstanding* quantity of the supply line:
/// receiving moves quantity from ordered to received, so
/// `ordered + received + adjusted` is the unit's total capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUnit {
    id: StockUnitId,
    subject_id: SubjectId,
    supply_line: Option<SupplyLineId>,
    ordered_quantity: Quantity,
    received_quantity: Quantity,
    adjusted_quantity: Quantity,
    sold_quantity: Quantity,
    shipped_quantity: Quantity,
    net_price: Decimal,
    state: StockUnitState,
    /// Sorted by ascending assignment id.
    assignments: Vec<StockAssignment>,
    version: u64,
}

impl StockUnit {
    /// A new, virtual unit (no supply, no assignment).
    pub fn new(id: StockUnitId, subject_id: SubjectId) -> Self {
        Self {
            id,
            subject_id,
            supply_line: None,
            ordered_quantity: Decimal::ZERO,
            received_quantity: Decimal::ZERO,
            adjusted_quantity: Decimal::ZERO,
            sold_quantity: Decimal::ZERO,
            shipped_quantity: Decimal::ZERO,
            net_price: Decimal::ZERO,
            state: StockUnitState::New,
            assignments: Vec::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> StockUnitId {
        self.id
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn supply_line(&self) -> Option<SupplyLineId> {
        self.supply_line
    }

    pub fn ordered_quantity(&self) -> Quantity {
        self.ordered_quantity
    }

    pub fn received_quantity(&self) -> Quantity {
        self.received_quantity
    }

    pub fn adjusted_quantity(&self) -> Quantity {
        self.adjusted_quantity
    }

    pub fn sold_quantity(&self) -> Quantity {
        self.sold_quantity
    }

    pub fn shipped_quantity(&self) -> Quantity {
        self.shipped_quantity
    }

    pub fn net_price(&self) -> Decimal {
        self.net_price
    }

    pub fn state(&self) -> StockUnitState {
        self.state
    }

    pub fn assignments(&self) -> &[StockAssignment] {
        &self.assignments
    }

    pub fn assignment(&self, id: StockAssignmentId) -> Option<&StockAssignment> {
        self.assignments.iter().find(|a| a.id_typed() == id)
    }

    pub fn assignment_for_item(&self, item: DemandItemId) -> Option<&StockAssignment> {
        self.assignments.iter().find(|a| a.demand_item_id() == item)
    }

    /// Capacity not yet promised to any demand.
    pub fn reservable_quantity(&self) -> Quantity {
        self.ordered_quantity + self.received_quantity + self.adjusted_quantity - self.sold_quantity
    }

    /// Physically on hand and not yet shipped.
    pub fn shippable_quantity(&self) -> Quantity {
        self.received_quantity + self.adjusted_quantity - self.shipped_quantity
    }

    /// Sold but not shipped, over all assignments.
    pub fn releasable_quantity(&self) -> Quantity {
        self.sold_quantity - self.shipped_quantity
    }

    /// A virtual unit that lost every purpose: nothing ordered, received or
    /// assigned. Persisting such a unit deletes it.
    pub fn is_removable(&self) -> bool {
        self.ordered_quantity.is_zero()
            && self.received_quantity.is_zero()
            && self.adjusted_quantity.is_zero()
            && self.shipped_quantity.is_zero()
            && self.assignments.is_empty()
    }

    /// Link the unit to the supply line feeding it.
    pub fn link_supply(
        &mut self,
        supply_line: SupplyLineId,
        ordered: Quantity,
        net_price: Decimal,
    ) -> DomainResult<()> {
        ensure_non_negative(ordered, "ordered quantity")?;
        ensure_non_negative(net_price, "net price")?;
        if let Some(current) = self.supply_line {
            if current != supply_line {
                return Err(DomainError::conflict(format!(
                    "unit {} is already fed by supply line {current}",
                    self.id
                )));
            }
        }
        self.supply_line = Some(supply_line);
        self.ordered_quantity = ordered;
        self.net_price = net_price;
        self.refresh_state();
        Ok(())
    }

    /// Receive `quantity`; the outstanding ordered quantity shrinks accordingly.
    pub fn receive(&mut self, quantity: Quantity) -> DomainResult<()> {
        ensure_positive(quantity, "received quantity")?;
        self.ordered_quantity = floor_zero(self.ordered_quantity - quantity);
        self.received_quantity += quantity;
        self.refresh_state();
        Ok(())
    }

    /// Apply an inventory correction (may be negative).
    pub fn adjust(&mut self, delta: Quantity) -> DomainResult<()> {
        if delta.is_zero() {
            return Err(DomainError::validation("adjustment cannot be zero"));
        }
        let physical = self.received_quantity + self.adjusted_quantity + delta;
        if physical < self.shipped_quantity {
            return Err(DomainError::invariant(format!(
                "adjustment {delta} would leave less stock than already shipped on unit {}",
                self.id
            )));
        }
        self.adjusted_quantity += delta;
        self.refresh_state();
        Ok(())
    }

    /// Ship `quantity` of an assignment.
    pub fn ship(&mut self, assignment: StockAssignmentId, quantity: Quantity) -> DomainResult<()> {
        ensure_positive(quantity, "shipped quantity")?;
        if quantity > self.shippable_quantity() {
            return Err(DomainError::invariant(format!(
                "cannot ship {quantity}, unit {} only has {} on hand",
                self.id,
                self.shippable_quantity()
            )));
        }
        let a = self.assignment_mut(assignment)?;
        if quantity > a.releasable_quantity() {
            return Err(DomainError::invariant(format!(
                "cannot ship {quantity} of assignment {assignment}, only {} releasable",
                a.releasable_quantity()
            )));
        }
        a.add_shipped(quantity);
        self.shipped_quantity += quantity;
        self.refresh_state();
        Ok(())
    }

    /// Lock `quantity` of an assignment for a shipment in preparation.
    pub fn lock(&mut self, assignment: StockAssignmentId, quantity: Quantity) -> DomainResult<()> {
        ensure_positive(quantity, "locked quantity")?;
        self.assignment_mut(assignment)?.add_locked(quantity);
        Ok(())
    }

    /// Credit `quantity` to the assignment of `item`, creating it if the unit
    /// holds none. Returns the assignment id and whether it was created.
    pub fn credit(
        &mut self,
        item: DemandItemId,
        demand: DemandId,
        quantity: Quantity,
        next_id: impl FnOnce() -> StockAssignmentId,
    ) -> DomainResult<(StockAssignmentId, bool)> {
        ensure_positive(quantity, "credited quantity")?;
        self.sold_quantity += quantity;

        if let Some(existing) = self.assignments.iter_mut().find(|a| a.demand_item_id() == item) {
            existing.add_sold(quantity);
            return Ok((existing.id_typed(), false));
        }

        let id = next_id();
        self.insert_sorted(StockAssignment::new(id, self.id, item, demand, quantity));
        Ok((id, true))
    }

    /// Debit `quantity` from an assignment's releasable quantity.
    pub fn debit(
        &mut self,
        assignment: StockAssignmentId,
        quantity: Quantity,
    ) -> DomainResult<DebitOutcome> {
        ensure_positive(quantity, "debited quantity")?;
        let unit_id = self.id;
        let a = self.assignment_mut(assignment)?;
        if quantity > a.releasable_quantity() {
            return Err(DomainError::invariant(format!(
                "cannot debit {quantity} from assignment {assignment} on unit {unit_id}, only {} releasable",
                a.releasable_quantity()
            )));
        }
        a.sub_sold(quantity);
        let emptied = a.sold_quantity().is_zero();
        self.sold_quantity -= quantity;

        if emptied {
            let removed = self.take(assignment)?;
            self.refresh_state();
            return Ok(DebitOutcome::Removed(removed));
        }
        self.refresh_state();
        Ok(DebitOutcome::Reduced)
    }

    /// Remove a whole, unshipped assignment from the unit.
    pub fn detach(&mut self, assignment: StockAssignmentId) -> DomainResult<StockAssignment> {
        let a = self.assignment(assignment).ok_or_else(|| {
            DomainError::logic(format!("assignment {assignment} not found on unit {}", self.id))
        })?;
        if !a.shipped_quantity().is_zero() {
            return Err(DomainError::invariant(format!(
                "assignment {assignment} has shipped quantity and cannot leave unit {}",
                self.id
            )));
        }
        let removed = self.take(assignment)?;
        self.sold_quantity -= removed.sold_quantity();
        self.refresh_state();
        Ok(removed)
    }

    /// Attach an assignment detached from another unit, merging it into the
    /// assignment of the same demand line if there is one.
    pub fn attach(&mut self, mut assignment: StockAssignment) -> DomainResult<AttachOutcome> {
        if self.assignment(assignment.id_typed()).is_some() {
            return Err(DomainError::logic(format!(
                "assignment {} is already on unit {}",
                assignment.id_typed(),
                self.id
            )));
        }
        self.sold_quantity += assignment.sold_quantity();
        self.shipped_quantity += assignment.shipped_quantity();

        let item = assignment.demand_item_id();
        if let Some(existing) = self.assignments.iter_mut().find(|a| a.demand_item_id() == item) {
            existing.absorb(&assignment);
            return Ok(AttachOutcome::Merged {
                into: existing.id_typed(),
            });
        }

        assignment.set_unit(self.id);
        self.insert_sorted(assignment);
        Ok(AttachOutcome::Attached)
    }

    /// Shippable quantity earmarked to each assignment.
    ///
    /// Locked quantities are served first, then the remaining releasable
    /// quantities in ascending assignment id.
    pub fn earmarked_shippable(&self) -> Vec<(StockAssignmentId, Quantity)> {
        let mut available = floor_zero(self.shippable_quantity());
        let mut granted = vec![Decimal::ZERO; self.assignments.len()];

        for (slot, a) in granted.iter_mut().zip(&self.assignments) {
            let q = a.locked_quantity().min(a.releasable_quantity()).min(available);
            *slot += q;
            available -= q;
        }
        for (slot, a) in granted.iter_mut().zip(&self.assignments) {
            let q = (a.releasable_quantity() - *slot).min(available);
            *slot += q;
            available -= q;
        }

        self.assignments
            .iter()
            .map(StockAssignment::id_typed)
            .zip(granted)
            .collect()
    }

    /// Shippable quantity earmarked to one assignment (zero if unknown).
    pub fn shippable_quantity_for(&self, assignment: StockAssignmentId) -> Quantity {
        self.earmarked_shippable()
            .into_iter()
            .find_map(|(id, q)| (id == assignment).then_some(q))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_fully_shippable(&self, assignment: StockAssignmentId) -> bool {
        match self.assignment(assignment) {
            Some(a) => a.releasable_quantity() <= self.shippable_quantity_for(assignment),
            None => false,
        }
    }

    /// Check every structural invariant of the unit.
    pub fn verify(&self) -> DomainResult<()> {
        let id = self.id;
        ensure_non_negative(self.ordered_quantity, "ordered quantity")?;
        ensure_non_negative(self.received_quantity, "received quantity")?;
        ensure_non_negative(self.sold_quantity, "sold quantity")?;
        ensure_non_negative(self.shipped_quantity, "shipped quantity")?;
        ensure_non_negative(
            self.received_quantity + self.adjusted_quantity,
            "physical quantity",
        )?;
        if self.shipped_quantity > self.sold_quantity {
            return Err(DomainError::invariant(format!(
                "unit {id} shipped more than it sold"
            )));
        }

        let mut sold = Decimal::ZERO;
        let mut shipped = Decimal::ZERO;
        let mut previous: Option<&StockAssignment> = None;
        for a in &self.assignments {
            ensure_non_negative(a.sold_quantity(), "assignment sold quantity")?;
            ensure_non_negative(a.shipped_quantity(), "assignment shipped quantity")?;
            ensure_non_negative(a.locked_quantity(), "assignment locked quantity")?;
            if a.unit_id() != id {
                return Err(DomainError::logic(format!(
                    "assignment {} on unit {id} points at unit {}",
                    a.id_typed(),
                    a.unit_id()
                )));
            }
            if a.shipped_quantity() > a.sold_quantity() {
                return Err(DomainError::invariant(format!(
                    "assignment {} shipped more than it sold",
                    a.id_typed()
                )));
            }
            if let Some(prev) = previous {
                if prev.id_typed() >= a.id_typed() {
                    return Err(DomainError::logic(format!(
                        "assignments of unit {id} are not ordered by id"
                    )));
                }
            }
            if self
                .assignments
                .iter()
                .filter(|other| other.demand_item_id() == a.demand_item_id())
                .count()
                > 1
            {
                return Err(DomainError::invariant(format!(
                    "unit {id} holds several assignments for demand line {}",
                    a.demand_item_id()
                )));
            }
            sold += a.sold_quantity();
            shipped += a.shipped_quantity();
            previous = Some(a);
        }

        if sold != self.sold_quantity {
            return Err(DomainError::invariant(format!(
                "unit {id} sold quantity {} differs from its assignments' sum {sold}",
                self.sold_quantity
            )));
        }
        if shipped != self.shipped_quantity {
            return Err(DomainError::invariant(format!(
                "unit {id} shipped quantity {} differs from its assignments' sum {shipped}",
                self.shipped_quantity
            )));
        }
        Ok(())
    }

    /// Record the version assigned by the store after a successful save.
    pub fn mark_persisted(&mut self, version: u64) {
        self.version = version;
    }

    fn assignment_mut(&mut self, id: StockAssignmentId) -> DomainResult<&mut StockAssignment> {
        let unit_id = self.id;
        self.assignments
            .iter_mut()
            .find(|a| a.id_typed() == id)
            .ok_or_else(|| DomainError::logic(format!("assignment {id} not found on unit {unit_id}")))
    }

    fn take(&mut self, id: StockAssignmentId) -> DomainResult<StockAssignment> {
        let pos = self
            .assignments
            .iter()
            .position(|a| a.id_typed() == id)
            .ok_or_else(|| DomainError::logic(format!("assignment {id} not found on unit {}", self.id)))?;
        Ok(self.assignments.remove(pos))
    }

    fn insert_sorted(&mut self, assignment: StockAssignment) {
        let pos = self
            .assignments
            .partition_point(|a| a.id_typed() < assignment.id_typed());
        self.assignments.insert(pos, assignment);
    }

    fn refresh_state(&mut self) {
        let physical = self.received_quantity + self.adjusted_quantity;
        self.state = if self.received_quantity > Decimal::ZERO || physical > Decimal::ZERO {
            let exhausted = self.ordered_quantity.is_zero()
                && self.shippable_quantity() <= Decimal::ZERO
                && self.sold_quantity == self.shipped_quantity;
            if exhausted {
                StockUnitState::Closed
            } else {
                StockUnitState::Ready
            }
        } else if self.supply_line.is_some() && self.ordered_quantity > Decimal::ZERO {
            StockUnitState::Pending
        } else {
            StockUnitState::New
        };
    }
}

impl Entity for StockUnit {
    type Id = StockUnitId;

    fn id(&self) -> StockUnitId {
        self.id
    }
}

impl AggregateRoot for StockUnit {
    fn version(&self) -> u64 {
        self.version
    }
}
