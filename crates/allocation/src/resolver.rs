use std::cmp::Ordering;
use std::collections::BTreeSet;

use stockflow_core::{DomainError, Quantity, StockAssignmentId, StockUnitId};
use stockflow_stock::StockUnitState;

use crate::candidate::{DemandContext, UnitCandidate};
use crate::context::PassContext;
use crate::error::AllocationResult;

/// Picks the unit an under-served assignment should move to.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrioritizeUnitResolver;

impl PrioritizeUnitResolver {
    pub fn new() -> Self {
        Self
    }

    /// Best target unit of the assignment's subject for `quantity`.
    ///
    /// READY units are always eligible. PENDING units are eligible only for
    /// an assignment held by a NEW unit: they give virtual stock a supply
    /// line, while moving between two supplied units makes nothing
    /// shippable. READY units are visited first, then by ascending id.
    ///
    /// Units listed in `exclude` are skipped along with the assignment's own
    /// unit. A unit whose reservable quantity alone covers `quantity` is
    /// taken at once when it is the first useful unit met; otherwise the
    /// candidates are ranked (see [`rank`]) and the first one wins.
    pub fn get_unit_candidate(
        &self,
        ctx: &mut PassContext<'_>,
        assignment: StockAssignmentId,
        quantity: Quantity,
        same_demand: bool,
        exclude: &BTreeSet<StockUnitId>,
    ) -> AllocationResult<Option<UnitCandidate>> {
        let (source_id, source_state, subject, demand) = {
            let unit = ctx.cache().locate(assignment).ok_or_else(|| {
                DomainError::logic(format!("assignment {assignment} is not loaded"))
            })?;
            let a = unit
                .assignment(assignment)
                .ok_or_else(|| DomainError::logic(format!("assignment {assignment} vanished")))?;
            (
                unit.id_typed(),
                unit.state(),
                unit.subject_id(),
                DemandContext {
                    demand_id: a.demand_id(),
                    item_id: a.demand_item_id(),
                },
            )
        };

        ctx.load_ready_units(subject)?;

        let max_assignments = ctx.config().max_combination_assignments;
        let directory = ctx.directory();
        let mut candidates: Vec<UnitCandidate> = Vec::new();

        let mut targets: Vec<_> = ctx
            .cache()
            .units_of_subject(subject)
            .filter(|u| match u.state() {
                StockUnitState::Ready => true,
                StockUnitState::Pending => source_state == StockUnitState::New,
                StockUnitState::New | StockUnitState::Closed => false,
            })
            .collect();
        targets.sort_by_key(|u| (u.state() != StockUnitState::Ready, u.id_typed()));

        for unit in targets {
            let id = unit.id_typed();
            if id == source_id || exclude.contains(&id) {
                continue;
            }
            let mut candidate =
                UnitCandidate::build(unit, &demand, quantity, same_demand, max_assignments, directory);
            if !candidate.is_useful() {
                continue;
            }
            if candidates.is_empty() && candidate.reservable() >= quantity {
                tracing::debug!(
                    assignment = %assignment,
                    unit = %id,
                    %quantity,
                    "unit covers the quantity with reservable stock"
                );
                return Ok(Some(candidate));
            }
            candidate.get_combination(quantity);
            candidates.push(candidate);
        }

        candidates.sort_by(|a, b| rank(a, b, quantity));
        let chosen = candidates.into_iter().next();
        match &chosen {
            Some(c) => tracing::debug!(
                assignment = %assignment,
                unit = %c.unit_id(),
                %quantity,
                shippable = %c.shippable(),
                reservable = %c.reservable(),
                releasable = %c.releasable(),
                "unit candidate chosen"
            ),
            None => tracing::debug!(assignment = %assignment, %quantity, "no unit candidate"),
        }
        Ok(chosen)
    }
}

/// Ranking of candidates for `quantity` (stable sort key, `Less` first).
///
/// 1. shippable >= quantity, then reservable >= quantity, then releasable
///    >= quantity;
/// 2. reservable == quantity, then releasable == quantity;
/// 3. larger shippable, larger reservable, larger releasable.
pub fn rank(a: &UnitCandidate, b: &UnitCandidate, quantity: Quantity) -> Ordering {
    covers(a.shippable(), b.shippable(), quantity)
        .then_with(|| covers(a.reservable(), b.reservable(), quantity))
        .then_with(|| covers(a.releasable(), b.releasable(), quantity))
        .then_with(|| matches_exactly(a.reservable(), b.reservable(), quantity))
        .then_with(|| matches_exactly(a.releasable(), b.releasable(), quantity))
        .then_with(|| b.shippable().cmp(&a.shippable()))
        .then_with(|| b.reservable().cmp(&a.reservable()))
        .then_with(|| b.releasable().cmp(&a.releasable()))
}

fn covers(a: Quantity, b: Quantity, quantity: Quantity) -> Ordering {
    match (a >= quantity, b >= quantity) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn matches_exactly(a: Quantity, b: Quantity, quantity: Quantity) -> Ordering {
    match (a == quantity, b == quantity) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
