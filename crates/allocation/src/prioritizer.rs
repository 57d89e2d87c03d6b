use std::collections::BTreeSet;

use rust_decimal::Decimal;

use stockflow_core::quantity::floor_zero;
use stockflow_core::{DemandItemId, DomainError, Quantity, StockAssignmentId, StockUnitId};
use stockflow_demand::{Assignable, Demand, DemandItem};

use crate::assigner::StockUnitAssigner;
use crate::candidate::UnitCandidate;
use crate::checker::accepts;
use crate::context::PassContext;
use crate::dispatcher::AssignmentDispatcher;
use crate::error::AllocationResult;
use crate::resolver::PrioritizeUnitResolver;

/// Rearranges stock so that a demand's assignments become shippable.
///
/// Root lines are visited in demand order, each depth-first with children
/// before their parent. The assignments of a line go by ascending id, so
/// the oldest first. Within a pass the outcome depends on this order: an
/// earlier line takes free stock before a later one gets to look.
///
/// For each assignment that cannot be fully shipped from its unit, the best
/// target unit is resolved (see [`PrioritizeUnitResolver`]); the
/// missing quantity is moved into the unit's reservable stock, and the rest
/// exchanged against assignments of other demands. This repeats until the
/// assignment is fully shippable or no unit is left to try.
#[derive(Debug, Default, Clone, Copy)]
pub struct Prioritizer {
    resolver: PrioritizeUnitResolver,
    dispatcher: AssignmentDispatcher,
    assigner: StockUnitAssigner,
}

impl Prioritizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prioritize every line of `demand`. Returns whether anything changed.
    pub fn prioritize(&self, ctx: &mut PassContext<'_>, demand: &Demand) -> AllocationResult<bool> {
        if !accepts(ctx, demand)? {
            tracing::debug!(demand = %demand.id_typed(), "demand cannot be prioritized");
            return Ok(false);
        }

        let root = demand.root_quantity();
        let mut changed = false;
        for item in demand.items() {
            changed |= self.prioritize_line(ctx, demand, item, item.total_quantity(root))?;
        }
        tracing::info!(
            demand = %demand.id_typed(),
            kind = ?demand.kind(),
            changed,
            events = ctx.events().len(),
            "demand prioritized"
        );
        Ok(changed)
    }

    /// Prioritize one line of `demand` and its children.
    pub fn prioritize_item(
        &self,
        ctx: &mut PassContext<'_>,
        demand: &Demand,
        item: DemandItemId,
    ) -> AllocationResult<bool> {
        if !accepts(ctx, demand)? {
            return Ok(false);
        }
        let (line, total) = demand.line(item)?;
        let changed = self.prioritize_line(ctx, demand, line, total)?;
        tracing::info!(demand = %demand.id_typed(), item = %item, changed, "demand line prioritized");
        Ok(changed)
    }

    fn prioritize_line(
        &self,
        ctx: &mut PassContext<'_>,
        demand: &Demand,
        line: &DemandItem,
        total: Quantity,
    ) -> AllocationResult<bool> {
        let mut changed = false;
        for child in line.children() {
            changed |= self.prioritize_line(ctx, demand, child, child.total_quantity(total))?;
        }
        let Some(subject) = line.subject_id() else {
            return Ok(changed);
        };

        let item = line.item_id();
        ctx.load_item_units(item)?;
        let assignments = ctx.item_assignments(item);
        if assignments.is_empty() {
            changed |= self
                .assigner
                .assign_item(ctx, demand.id_typed(), item, subject, total)?;
            return Ok(changed);
        }

        for (_, assignment) in assignments {
            changed |= self.run(ctx, assignment, false)?;
            if ctx.config().same_demand_pass {
                changed |= self.run(ctx, assignment, true)?;
            }
        }
        Ok(changed)
    }

    fn run(
        &self,
        ctx: &mut PassContext<'_>,
        assignment: StockAssignmentId,
        same_demand: bool,
    ) -> AllocationResult<bool> {
        let mut tried: BTreeSet<StockUnitId> = BTreeSet::new();
        let mut changed = false;

        loop {
            let Some(unit) = ctx.cache().locate(assignment) else {
                // merged into another assignment of the line
                break;
            };
            let Some(a) = unit.assignment(assignment) else {
                break;
            };
            if a.is_fully_shipped() || unit.is_fully_shippable(assignment) {
                break;
            }
            let deficit = floor_zero(a.releasable_quantity() - unit.shippable_quantity_for(assignment));
            if deficit <= Decimal::ZERO {
                break;
            }
            tried.insert(unit.id_typed());

            let Some(mut candidate) =
                self.resolver
                    .get_unit_candidate(ctx, assignment, deficit, same_demand, &tried)?
            else {
                break;
            };
            tried.insert(candidate.unit_id());

            let served = self.serve(ctx, assignment, &mut candidate, deficit)?;
            tracing::debug!(
                assignment = %assignment,
                unit = %candidate.unit_id(),
                %deficit,
                %served,
                same_demand,
                "assignment served"
            );
            changed |= served > Decimal::ZERO;
        }
        Ok(changed)
    }

    /// Move as much as possible of `deficit` to the candidate unit: first into
    /// its reservable stock, then by exchanging against the best combination
    /// of its releasable assignments.
    fn serve(
        &self,
        ctx: &mut PassContext<'_>,
        assignment: StockAssignmentId,
        candidate: &mut UnitCandidate,
        deficit: Quantity,
    ) -> AllocationResult<Quantity> {
        let target = candidate.unit_id();
        let mut served = Decimal::ZERO;

        let reservable = ctx
            .unit(target)
            .map(|u| floor_zero(u.reservable_quantity()))
            .unwrap_or(Decimal::ZERO);
        let direct = deficit.min(reservable);
        if direct > Decimal::ZERO {
            served += self.dispatcher.move_assignment(ctx, assignment, target, direct)?;
        }

        let remaining = deficit - served;
        if remaining <= Decimal::ZERO {
            return Ok(served);
        }
        let Some(combination) = candidate.get_combination(remaining).cloned() else {
            return Ok(served);
        };

        for (other, quantity) in combination.entries() {
            let remaining = deficit - served;
            if remaining <= Decimal::ZERO {
                break;
            }
            if ctx.unit(target).and_then(|u| u.assignment(*other)).is_none() {
                return Err(DomainError::logic(format!(
                    "assignment {other} of the combination is not on unit {target}"
                ))
                .into());
            }
            let still_on_source = ctx
                .cache()
                .locate(assignment)
                .is_some_and(|u| u.id_typed() != target);
            if !still_on_source {
                break;
            }
            served += self
                .dispatcher
                .exchange(ctx, *other, assignment, target, (*quantity).min(remaining))?;
        }
        Ok(served)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::PrioritizeChecker;
    use crate::config::AllocationConfig;
    use crate::repository::StockUnitRepository;
    use crate::testing::{FakeStore, SUBJECT, assign, sold_of_item, unit, virtual_unit};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockflow_core::DemandId;
    use stockflow_demand::DemandStatus;
    use stockflow_stock::{StockEvent, StockUnit};

    fn order(demand: u64, item: u64, quantity: Quantity) -> Demand {
        Demand::order(DemandId::new(demand))
            .with_status(DemandStatus::Accepted)
            .with_item(DemandItem::stocked(DemandItemId::new(item), SUBJECT, quantity))
    }

    fn uid(n: u64) -> StockUnitId {
        StockUnitId::new(n)
    }

    fn aid(n: u64) -> StockAssignmentId {
        StockAssignmentId::new(n)
    }

    #[test]
    fn nothing_moves_without_another_ready_unit() {
        let store = FakeStore::new();
        let mut u1 = unit(1, dec!(20), dec!(0));
        assign(&mut u1, 1, 1, 1, dec!(20));
        store.put(u1);

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        let changed = Prioritizer::new()
            .prioritize(&mut ctx, &order(1, 1, dec!(20)))
            .unwrap();
        assert!(!changed);
        assert!(ctx.events().is_empty());
        assert!(ctx.finish().changes.is_empty());
    }

    #[test]
    fn assignment_is_split_onto_unit_with_free_stock() {
        let store = FakeStore::new();
        let mut u1 = unit(1, dec!(30), dec!(15));
        assign(&mut u1, 1, 1, 1, dec!(15));
        assign(&mut u1, 2, 2, 2, dec!(15));
        store.put(u1);
        store.put(unit(2, dec!(10), dec!(10)));

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        let changed = Prioritizer::new()
            .prioritize(&mut ctx, &order(2, 2, dec!(15)))
            .unwrap();
        assert!(changed);

        let u1 = ctx.unit(uid(1)).unwrap();
        let u2 = ctx.unit(uid(2)).unwrap();
        assert_eq!(u1.assignment(aid(1)).unwrap().sold_quantity(), dec!(15));
        assert_eq!(u1.assignment(aid(2)).unwrap().sold_quantity(), dec!(5));
        let moved = u2.assignment_for_item(DemandItemId::new(2)).unwrap();
        assert_eq!(moved.sold_quantity(), dec!(10));
        assert!(u2.is_fully_shippable(moved.id_typed()));
        assert_eq!(sold_of_item(&[u1, u2], 2), dec!(15));
    }

    #[test]
    fn virtual_stock_moves_onto_a_supply_line() {
        let store = FakeStore::new();
        let mut virtual_stock = virtual_unit(1);
        assign(&mut virtual_stock, 1, 1, 1, dec!(10));
        store.put(virtual_stock);
        store.put(unit(2, dec!(20), dec!(0)));

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        let changed = Prioritizer::new()
            .prioritize(&mut ctx, &order(1, 1, dec!(10)))
            .unwrap();
        assert!(changed);

        let supplied = ctx.unit(uid(2)).unwrap();
        assert_eq!(
            supplied.assignment_for_item(DemandItemId::new(1)).unwrap().sold_quantity(),
            dec!(10)
        );
        assert_eq!(supplied.reservable_quantity(), dec!(10));

        let changes = ctx.finish().changes;
        assert!(changes.removed.iter().any(|(id, _)| *id == uid(1)));
        assert!(changes.saved.iter().any(|u| u.id_typed() == uid(2)));
    }

    #[test]
    fn exact_combination_is_exchanged() {
        let store = FakeStore::new();
        let mut source = unit(1, dec!(20), dec!(0));
        assign(&mut source, 1, 1, 1, dec!(20));
        let mut target = unit(2, dec!(20), dec!(20));
        assign(&mut target, 2, 5, 5, dec!(5));
        assign(&mut target, 3, 6, 6, dec!(15));
        store.put(source);
        store.put(target);

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        assert!(
            Prioritizer::new()
                .prioritize(&mut ctx, &order(1, 1, dec!(20)))
                .unwrap()
        );

        let s = ctx.unit(uid(1)).unwrap();
        let t = ctx.unit(uid(2)).unwrap();
        assert!(s.assignment_for_item(DemandItemId::new(1)).is_none());
        assert_eq!(s.assignment(aid(2)).unwrap().sold_quantity(), dec!(5));
        assert_eq!(s.assignment(aid(3)).unwrap().sold_quantity(), dec!(15));
        let served = t.assignment_for_item(DemandItemId::new(1)).unwrap();
        assert_eq!(served.sold_quantity(), dec!(20));
        assert!(t.is_fully_shippable(served.id_typed()));
        assert_eq!(s.reservable_quantity(), dec!(0));
        assert_eq!(t.reservable_quantity(), dec!(0));
    }

    #[test]
    fn preparing_demands_keep_their_stock() {
        let store = FakeStore::new();
        let mut source = unit(1, dec!(20), dec!(0));
        assign(&mut source, 1, 1, 1, dec!(20));
        let mut target = unit(2, dec!(20), dec!(20));
        assign(&mut target, 2, 5, 5, dec!(20));
        store.put(source);
        store.put(target);
        store.set_shipment(5, stockflow_demand::ShipmentState::Preparation);

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        let changed = Prioritizer::new()
            .prioritize(&mut ctx, &order(1, 1, dec!(20)))
            .unwrap();
        assert!(!changed);
        assert_eq!(ctx.unit(uid(2)).unwrap().assignment(aid(2)).unwrap().sold_quantity(), dec!(20));
    }

    #[test]
    fn own_demand_is_only_touched_by_the_second_pass() {
        let build = || {
            let store = FakeStore::new();
            let mut source = unit(1, dec!(10), dec!(0));
            assign(&mut source, 1, 1, 1, dec!(10));
            let mut target = unit(2, dec!(10), dec!(10));
            assign(&mut target, 2, 2, 1, dec!(10));
            store.put(source);
            store.put(target);
            store
        };
        let demand = Demand::order(DemandId::new(1))
            .with_status(DemandStatus::Accepted)
            .with_item(DemandItem::stocked(DemandItemId::new(1), SUBJECT, dec!(10)))
            .with_item(DemandItem::stocked(DemandItemId::new(2), SUBJECT, dec!(10)));

        let store = build();
        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        assert!(!Prioritizer::new().prioritize_item(&mut ctx, &demand, DemandItemId::new(1)).unwrap());

        let store = build();
        let config = AllocationConfig {
            same_demand_pass: true,
            ..AllocationConfig::default()
        };
        let mut ctx = PassContext::new(&store, &store, &config);
        assert!(Prioritizer::new().prioritize_item(&mut ctx, &demand, DemandItemId::new(1)).unwrap());
        let t = ctx.unit(uid(2)).unwrap();
        assert!(t.assignment_for_item(DemandItemId::new(1)).is_some());
    }

    #[test]
    fn unassigned_line_gets_stock() {
        let store = FakeStore::new();
        store.put(unit(1, dec!(8), dec!(8)));

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        assert!(
            Prioritizer::new()
                .prioritize(&mut ctx, &order(1, 1, dec!(12)))
                .unwrap()
        );
        let outcome = ctx.finish();
        assert_eq!(outcome.changes.saved.len(), 2);
        let total: Decimal = outcome
            .changes
            .saved
            .iter()
            .filter_map(|u| u.assignment_for_item(DemandItemId::new(1)))
            .map(|a| a.sold_quantity())
            .sum();
        assert_eq!(total, dec!(12));
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, StockEvent::UnitCreated(_))));
    }

    #[test]
    fn canceled_demand_is_left_alone() {
        let store = FakeStore::new();
        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        let demand = order(1, 1, dec!(5)).with_status(DemandStatus::Canceled);
        assert!(!Prioritizer::new().prioritize(&mut ctx, &demand).unwrap());
        assert!(ctx.cache().is_empty());
    }

    fn seeded_store(lines: &[(usize, i64)]) -> FakeStore {
        let store = FakeStore::new();
        let mut units: Vec<StockUnit> = vec![
            unit(1, dec!(60), dec!(0)),
            unit(2, dec!(60), dec!(20)),
            unit(3, dec!(60), dec!(40)),
        ];
        for (n, (slot, q)) in lines.iter().enumerate() {
            let line = n as u64 + 1;
            assign(&mut units[*slot], line, line, line, Decimal::from(*q));
        }
        for u in units {
            store.put(u);
        }
        store
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: prioritizing keeps every line's assigned quantity, never
        /// oversells a unit, and a demand the checker rejects is left as is.
        #[test]
        fn prioritizing_conserves_and_respects_checker(
            lines in prop::collection::vec((0usize..3, 1i64..10), 1..6),
            pick in 0usize..6,
        ) {
            let store = seeded_store(&lines);
            let line = (pick % lines.len()) as u64 + 1;
            let quantity = Decimal::from(lines[line as usize - 1].1);
            let demand = order(line, line, quantity);
            let config = AllocationConfig::default();

            let mut check_ctx = PassContext::new(&store, &store, &config);
            let needed = PrioritizeChecker::new().check(&mut check_ctx, &demand).unwrap();

            let mut ctx = PassContext::new(&store, &store, &config);
            let changed = Prioritizer::new().prioritize(&mut ctx, &demand).unwrap();
            if !needed {
                prop_assert!(!changed);
                prop_assert!(ctx.events().is_empty());
            }

            let outcome = ctx.finish();
            store.commit(outcome.changes).unwrap();
            let after = store.find_assignable_units(SUBJECT).unwrap();
            let refs: Vec<&StockUnit> = after.iter().collect();
            for u in &refs {
                prop_assert!(u.verify().is_ok());
                prop_assert!(u.reservable_quantity() >= Decimal::ZERO);
            }
            for (n, (_, q)) in lines.iter().enumerate() {
                prop_assert_eq!(sold_of_item(&refs, n as u64 + 1), Decimal::from(*q));
            }
        }
    }
}
