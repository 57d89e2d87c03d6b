use rust_decimal::Decimal;

use stockflow_core::{DemandId, DemandItemId, Quantity, StockAssignmentId, StockUnitId};
use stockflow_demand::ShipmentState;
use stockflow_stock::StockUnit;

use crate::combination::{self, AssignmentCombination};
use crate::repository::DemandDirectory;

/// The demand line being served, as seen by candidate units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemandContext {
    pub demand_id: DemandId,
    pub item_id: DemandItemId,
}

/// Snapshot of a unit that could take over (part of) an assignment.
#[derive(Debug, Clone)]
pub struct UnitCandidate {
    unit_id: StockUnitId,
    quantity: Quantity,
    shippable: Quantity,
    reservable: Quantity,
    releasable: Quantity,
    /// Assignments of other demands that could be moved away, by descending
    /// quantity then ascending id.
    map: Vec<(StockAssignmentId, Quantity)>,
    max_assignments: usize,
    combination: Option<(Quantity, Option<AssignmentCombination>)>,
}

impl UnitCandidate {
    /// Snapshot `unit` for serving `quantity` of `demand`.
    ///
    /// Assignments are left out of the releasable map when they belong to
    /// the same demand line, to the same demand (unless
    /// `same_demand_allowed`), to a demand whose shipment is in preparation,
    /// or when nothing of them is releasable.
    pub fn build(
        unit: &StockUnit,
        demand: &DemandContext,
        quantity: Quantity,
        same_demand_allowed: bool,
        max_assignments: usize,
        directory: &dyn DemandDirectory,
    ) -> Self {
        let mut map: Vec<(StockAssignmentId, Quantity)> = unit
            .assignments()
            .iter()
            .filter(|a| a.demand_item_id() != demand.item_id)
            .filter(|a| same_demand_allowed || a.demand_id() != demand.demand_id)
            .filter(|a| directory.shipment_state(a.demand_id()) != Some(ShipmentState::Preparation))
            .filter(|a| a.releasable_quantity() > Decimal::ZERO)
            .map(|a| (a.id_typed(), a.releasable_quantity()))
            .collect();
        map.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let releasable = map.iter().map(|(_, q)| *q).sum();
        Self {
            unit_id: unit.id_typed(),
            quantity,
            shippable: unit.shippable_quantity(),
            reservable: unit.reservable_quantity(),
            releasable,
            map,
            max_assignments,
            combination: None,
        }
    }

    pub fn unit_id(&self) -> StockUnitId {
        self.unit_id
    }

    /// Quantity the candidate was built for.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn shippable(&self) -> Quantity {
        self.shippable
    }

    pub fn reservable(&self) -> Quantity {
        self.reservable
    }

    /// Total of the releasable map.
    pub fn releasable(&self) -> Quantity {
        self.releasable
    }

    pub fn releasable_map(&self) -> &[(StockAssignmentId, Quantity)] {
        &self.map
    }

    pub fn releasable_of(&self, assignment: StockAssignmentId) -> Option<Quantity> {
        self.map
            .iter()
            .find_map(|(id, q)| (*id == assignment).then_some(*q))
    }

    /// Whether the candidate has anything to offer at all.
    pub fn is_useful(&self) -> bool {
        self.reservable > Decimal::ZERO || self.releasable > Decimal::ZERO
    }

    /// Best combination of releasable assignments for `deficit`, computed
    /// once per deficit.
    pub fn get_combination(&mut self, deficit: Quantity) -> Option<&AssignmentCombination> {
        let fresh = matches!(&self.combination, Some((d, _)) if *d == deficit);
        if !fresh {
            let found = combination::search(&self.map, deficit, self.max_assignments);
            self.combination = Some((deficit, found));
        }
        self.combination.as_ref().and_then(|(_, c)| c.as_ref())
    }
}
