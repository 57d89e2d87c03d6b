use rust_decimal::Decimal;

use stockflow_core::{DemandItemId, DomainError, Quantity};
use stockflow_demand::{Assignable, Demand, DemandItem, DemandKind, ShipmentState};

use crate::context::PassContext;
use crate::error::AllocationResult;

/// Per-kind rules deciding whether a demand may be prioritized at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindPolicy {
    Order,
    Production,
    Sale,
}

impl KindPolicy {
    pub fn of(kind: DemandKind) -> Self {
        match kind {
            DemandKind::Order => KindPolicy::Order,
            DemandKind::Production => KindPolicy::Production,
            DemandKind::Sale => KindPolicy::Sale,
        }
    }

    /// Whether stock may be moved around for `demand`.
    ///
    /// Orders and sales are left alone once their shipment is being
    /// prepared, completed or returned. Production orders have no shipment.
    pub fn allows(self, demand: &Demand) -> bool {
        if !demand.is_stockable_state() {
            return false;
        }
        match self {
            KindPolicy::Order | KindPolicy::Sale => {
                let state = demand.shipment_state();
                !state.is_done() && state != ShipmentState::Preparation
            }
            KindPolicy::Production => true,
        }
    }
}

/// Cheap predicate: could prioritizing this demand change anything?
///
/// The checker only reads. A `false` answer guarantees that
/// [`crate::Prioritizer`] would leave the demand unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrioritizeChecker;

impl PrioritizeChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, ctx: &mut PassContext<'_>, demand: &Demand) -> AllocationResult<bool> {
        if !accepts(ctx, demand)? {
            return Ok(false);
        }
        let root = demand.root_quantity();
        for item in demand.items() {
            if self.check_line(ctx, item, item.total_quantity(root))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Same as [`PrioritizeChecker::check`], for one line (and its children).
    pub fn check_item(
        &self,
        ctx: &mut PassContext<'_>,
        demand: &Demand,
        item: DemandItemId,
    ) -> AllocationResult<bool> {
        if !accepts(ctx, demand)? {
            return Ok(false);
        }
        let (line, total) = demand.line(item)?;
        self.check_line(ctx, line, total)
    }

    /// `total` is the line's effective quantity.
    fn check_line(
        &self,
        ctx: &mut PassContext<'_>,
        line: &DemandItem,
        total: Quantity,
    ) -> AllocationResult<bool> {
        for child in line.children() {
            if self.check_line(ctx, child, child.total_quantity(total))? {
                return Ok(true);
            }
        }
        if !line.is_stock_managed() {
            return Ok(false);
        }

        ctx.load_item_units(line.item_id())?;
        let assignments = ctx.item_assignments(line.item_id());
        if assignments.is_empty() {
            return Ok(total > Decimal::ZERO);
        }
        Ok(assignments.iter().any(|(unit_id, assignment)| {
            ctx.unit(*unit_id)
                .and_then(|u| u.assignment(*assignment).map(|a| (u, a)))
                .is_some_and(|(u, a)| !a.is_fully_shipped() && !u.is_fully_shippable(*assignment))
        }))
    }
}

/// Depth bound, validation and per-kind gating shared by the checker and
/// the prioritizer.
pub(crate) fn accepts(ctx: &PassContext<'_>, demand: &Demand) -> AllocationResult<bool> {
    let max = ctx.config().max_tree_depth;
    if demand.is_deeper_than(max) {
        return Err(DomainError::invariant(format!(
            "demand {} is nested deeper than {max} levels",
            demand.id_typed()
        ))
        .into());
    }
    demand.validate()?;
    Ok(KindPolicy::of(demand.kind()).allows(demand))
}
