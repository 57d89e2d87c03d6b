use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockflow_core::{DomainError, Quantity, StockAssignmentId, StockUnitId};
use stockflow_stock::{
    AssignmentAdjusted, AssignmentCreated, AssignmentMerged, AssignmentRemoved,
    AssignmentRepointed, AttachOutcome, DebitOutcome, StockEvent, StockUnit, UnitSoldAdjusted,
};

use crate::context::PassContext;
use crate::error::AllocationResult;

/// Moves sold quantity between units, keeping both units consistent.
///
/// Every operation works on the two units at once and checks both with
/// [`StockUnit::verify`] before they go back into the pass cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssignmentDispatcher;

impl AssignmentDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Move up to `quantity` of `assignment` to `target`.
    ///
    /// The moved quantity is capped by the assignment's releasable quantity
    /// and must fit in the target's reservable quantity. Moving the whole
    /// assignment re-points it (or merges it into the target's assignment of
    /// the same line); moving part of it splits it. Returns the quantity
    /// actually moved.
    pub fn move_assignment(
        &self,
        ctx: &mut PassContext<'_>,
        assignment: StockAssignmentId,
        target: StockUnitId,
        quantity: Quantity,
    ) -> AllocationResult<Quantity> {
        let source = holder_of(ctx, assignment)?;
        if source == target {
            return Err(DomainError::invariant(format!(
                "assignment {assignment} is already on unit {target}"
            ))
            .into());
        }

        let repository = ctx.repository();
        let ids = || repository.next_assignment_id();
        let at = ctx.started_at();
        let (mut from, mut to) = take_pair(ctx, source, target)?;
        let result = apply_move(&mut from, &mut to, assignment, quantity, &ids, at);
        let touched = matches!(&result, Ok((q, _)) if *q > Decimal::ZERO);
        ctx.put_back(from, touched);
        ctx.put_back(to, touched);

        let (moved, events) = result?;
        for event in events {
            ctx.record(event);
        }
        if moved > Decimal::ZERO {
            tracing::info!(
                assignment = %assignment,
                from = %source,
                to = %target,
                quantity = %moved,
                "assignment moved"
            );
        }
        Ok(moved)
    }

    /// Swap `quantity` between two units: `other` (on `target`) moves to the
    /// unit of `assignment`, and as much of `assignment` moves to `target`.
    ///
    /// Both units keep their reservable quantity, so the swap never
    /// oversells either of them. Returns the quantity swapped.
    pub fn exchange(
        &self,
        ctx: &mut PassContext<'_>,
        other: StockAssignmentId,
        assignment: StockAssignmentId,
        target: StockUnitId,
        quantity: Quantity,
    ) -> AllocationResult<Quantity> {
        let source = holder_of(ctx, assignment)?;
        if source == target {
            return Err(DomainError::invariant(format!(
                "assignment {assignment} is already on unit {target}"
            ))
            .into());
        }

        let repository = ctx.repository();
        let ids = || repository.next_assignment_id();
        let at = ctx.started_at();
        let (mut from, mut to) = take_pair(ctx, source, target)?;
        let result = apply_exchange(&mut from, &mut to, other, assignment, quantity, &ids, at);
        let touched = matches!(&result, Ok((q, _)) if *q > Decimal::ZERO);
        ctx.put_back(from, touched);
        ctx.put_back(to, touched);

        let (swapped, events) = result?;
        for event in events {
            ctx.record(event);
        }
        if swapped > Decimal::ZERO {
            tracing::info!(
                assignment = %assignment,
                released = %other,
                from = %source,
                to = %target,
                quantity = %swapped,
                "assignments exchanged"
            );
        }
        Ok(swapped)
    }
}

fn holder_of(ctx: &PassContext<'_>, assignment: StockAssignmentId) -> AllocationResult<StockUnitId> {
    ctx.cache()
        .locate(assignment)
        .map(StockUnit::id_typed)
        .ok_or_else(|| DomainError::logic(format!("assignment {assignment} is not loaded")).into())
}

fn take_pair(
    ctx: &mut PassContext<'_>,
    first: StockUnitId,
    second: StockUnitId,
) -> AllocationResult<(StockUnit, StockUnit)> {
    let a = ctx
        .take_unit(first)
        .ok_or_else(|| DomainError::logic(format!("unit {first} is not loaded")))?;
    match ctx.take_unit(second) {
        Some(b) => Ok((a, b)),
        None => {
            ctx.put_back(a, false);
            Err(DomainError::logic(format!("unit {second} is not loaded")).into())
        }
    }
}

fn same_subject(from: &StockUnit, to: &StockUnit) -> AllocationResult<()> {
    if from.subject_id() != to.subject_id() {
        return Err(DomainError::invariant(format!(
            "units {} and {} hold different subjects",
            from.id_typed(),
            to.id_typed()
        ))
        .into());
    }
    Ok(())
}

fn releasable_on(unit: &StockUnit, assignment: StockAssignmentId) -> AllocationResult<Quantity> {
    unit.assignment(assignment)
        .map(|a| a.releasable_quantity())
        .ok_or_else(|| {
            DomainError::logic(format!(
                "assignment {assignment} not found on unit {}",
                unit.id_typed()
            ))
            .into()
        })
}

fn apply_move(
    from: &mut StockUnit,
    to: &mut StockUnit,
    assignment: StockAssignmentId,
    quantity: Quantity,
    ids: &dyn Fn() -> StockAssignmentId,
    at: DateTime<Utc>,
) -> AllocationResult<(Quantity, Vec<StockEvent>)> {
    same_subject(from, to)?;
    let moved = quantity.min(releasable_on(from, assignment)?);
    if moved <= Decimal::ZERO {
        return Ok((Decimal::ZERO, Vec::new()));
    }
    if to.reservable_quantity() < moved {
        return Err(DomainError::invariant(format!(
            "moving {moved} would oversell unit {} ({} reservable)",
            to.id_typed(),
            to.reservable_quantity()
        ))
        .into());
    }

    let mut events = Vec::new();
    transfer(from, to, assignment, moved, ids, at, &mut events)?;
    from.verify()?;
    to.verify()?;
    Ok((moved, events))
}

fn apply_exchange(
    from: &mut StockUnit,
    to: &mut StockUnit,
    other: StockAssignmentId,
    assignment: StockAssignmentId,
    quantity: Quantity,
    ids: &dyn Fn() -> StockAssignmentId,
    at: DateTime<Utc>,
) -> AllocationResult<(Quantity, Vec<StockEvent>)> {
    same_subject(from, to)?;
    let released = releasable_on(to, other)?;
    let wanted = releasable_on(from, assignment)?;
    let same_line = match (to.assignment(other), from.assignment(assignment)) {
        (Some(o), Some(a)) => o.demand_item_id() == a.demand_item_id(),
        _ => false,
    };
    if same_line {
        return Err(DomainError::invariant(format!(
            "assignments {other} and {assignment} serve the same demand line"
        ))
        .into());
    }

    let swapped = quantity.min(released).min(wanted);
    if swapped <= Decimal::ZERO {
        return Ok((Decimal::ZERO, Vec::new()));
    }

    let before = (from.reservable_quantity(), to.reservable_quantity());
    let mut events = Vec::new();
    transfer(to, from, other, swapped, ids, at, &mut events)?;
    transfer(from, to, assignment, swapped, ids, at, &mut events)?;
    if (from.reservable_quantity(), to.reservable_quantity()) != before {
        return Err(DomainError::invariant(format!(
            "exchange changed the reservable quantity of units {} and {}",
            from.id_typed(),
            to.id_typed()
        ))
        .into());
    }
    from.verify()?;
    to.verify()?;
    Ok((swapped, events))
}

/// Move `quantity` of `assignment` from `from` to `to`, no checks on capacity.
fn transfer(
    from: &mut StockUnit,
    to: &mut StockUnit,
    assignment: StockAssignmentId,
    quantity: Quantity,
    ids: &dyn Fn() -> StockAssignmentId,
    at: DateTime<Utc>,
    events: &mut Vec<StockEvent>,
) -> AllocationResult<()> {
    let (item, demand, sold) = match from.assignment(assignment) {
        Some(a) => (a.demand_item_id(), a.demand_id(), a.sold_quantity()),
        None => {
            return Err(DomainError::logic(format!(
                "assignment {assignment} not found on unit {}",
                from.id_typed()
            ))
            .into());
        }
    };
    let subject = from.subject_id();

    if quantity == sold {
        let detached = from.detach(assignment)?;
        events.push(sold_adjusted(from, -quantity, at));
        match to.attach(detached)? {
            AttachOutcome::Attached => {
                events.push(StockEvent::AssignmentRepointed(AssignmentRepointed {
                    subject_id: subject,
                    unit_id: to.id_typed(),
                    from_unit_id: from.id_typed(),
                    assignment_id: assignment,
                    quantity,
                    occurred_at: at,
                }))
            }
            AttachOutcome::Merged { into } => {
                events.push(StockEvent::AssignmentMerged(AssignmentMerged {
                    subject_id: subject,
                    unit_id: to.id_typed(),
                    source_id: assignment,
                    into_id: into,
                    quantity,
                    occurred_at: at,
                }))
            }
        }
        events.push(sold_adjusted(to, quantity, at));
        return Ok(());
    }

    let outcome = from.debit(assignment, quantity)?;
    events.push(StockEvent::AssignmentAdjusted(AssignmentAdjusted {
        subject_id: subject,
        unit_id: from.id_typed(),
        assignment_id: assignment,
        delta: -quantity,
        occurred_at: at,
    }));
    if let DebitOutcome::Removed(_) = outcome {
        events.push(StockEvent::AssignmentRemoved(AssignmentRemoved {
            subject_id: subject,
            unit_id: from.id_typed(),
            assignment_id: assignment,
            occurred_at: at,
        }));
    }
    events.push(sold_adjusted(from, -quantity, at));

    let (credited, created) = to.credit(item, demand, quantity, ids)?;
    if created {
        events.push(StockEvent::AssignmentCreated(AssignmentCreated {
            subject_id: subject,
            unit_id: to.id_typed(),
            assignment_id: credited,
            demand_item_id: item,
            quantity,
            occurred_at: at,
        }));
    } else {
        events.push(StockEvent::AssignmentAdjusted(AssignmentAdjusted {
            subject_id: subject,
            unit_id: to.id_typed(),
            assignment_id: credited,
            delta: quantity,
            occurred_at: at,
        }));
    }
    events.push(sold_adjusted(to, quantity, at));
    Ok(())
}

fn sold_adjusted(unit: &StockUnit, delta: Quantity, at: DateTime<Utc>) -> StockEvent {
    StockEvent::UnitSoldAdjusted(UnitSoldAdjusted {
        subject_id: unit.subject_id(),
        unit_id: unit.id_typed(),
        delta,
        sold_after: unit.sold_quantity(),
        occurred_at: at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationConfig;
    use crate::error::AllocationError;
    use crate::testing::{FakeStore, SUBJECT, assign, sold_of_item, unit};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockflow_core::DemandItemId;

    fn id(n: u64) -> StockUnitId {
        StockUnitId::new(n)
    }

    fn aid(n: u64) -> StockAssignmentId {
        StockAssignmentId::new(n)
    }

    #[test]
    fn whole_move_merges_into_assignment_of_same_line() {
        let store = FakeStore::new();
        let mut u1 = unit(1, dec!(20), dec!(20));
        assign(&mut u1, 1, 2, 2, dec!(10));
        let mut u2 = unit(2, dec!(20), dec!(20));
        assign(&mut u2, 2, 2, 2, dec!(5));
        store.put(u1);
        store.put(u2);

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        ctx.load_ready_units(SUBJECT).unwrap();

        let moved = AssignmentDispatcher::new()
            .move_assignment(&mut ctx, aid(1), id(2), dec!(10))
            .unwrap();
        assert_eq!(moved, dec!(10));

        let u1 = ctx.unit(id(1)).unwrap();
        let u2 = ctx.unit(id(2)).unwrap();
        assert!(u1.assignments().is_empty());
        assert_eq!(u1.sold_quantity(), dec!(0));
        assert_eq!(u2.assignments().len(), 1);
        assert_eq!(u2.assignment(aid(2)).unwrap().sold_quantity(), dec!(15));
        assert!(ctx.events().iter().any(|e| matches!(
            e,
            StockEvent::AssignmentMerged(m) if m.source_id == aid(1) && m.into_id == aid(2)
        )));
    }

    #[test]
    fn move_there_and_back_restores_distribution() {
        let store = FakeStore::new();
        let mut u1 = unit(1, dec!(20), dec!(20));
        assign(&mut u1, 1, 1, 1, dec!(15));
        store.put(u1);
        store.put(unit(2, dec!(20), dec!(20)));

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        ctx.load_ready_units(SUBJECT).unwrap();
        let dispatcher = AssignmentDispatcher::new();

        dispatcher.move_assignment(&mut ctx, aid(1), id(2), dec!(5)).unwrap();
        let split = ctx.unit(id(2)).unwrap().assignments()[0].id_typed();
        assert_eq!(ctx.unit(id(1)).unwrap().sold_quantity(), dec!(10));
        assert_eq!(ctx.unit(id(2)).unwrap().sold_quantity(), dec!(5));

        dispatcher.move_assignment(&mut ctx, split, id(1), dec!(5)).unwrap();
        let u1 = ctx.unit(id(1)).unwrap();
        assert_eq!(u1.assignment(aid(1)).unwrap().sold_quantity(), dec!(15));
        assert_eq!(u1.assignments().len(), 1);
        assert!(ctx.unit(id(2)).unwrap().assignments().is_empty());
    }

    #[test]
    fn move_is_capped_by_releasable_quantity() {
        let store = FakeStore::new();
        let mut u1 = unit(1, dec!(20), dec!(20));
        assign(&mut u1, 1, 1, 1, dec!(10));
        u1.ship(aid(1), dec!(4)).unwrap();
        store.put(u1);
        store.put(unit(2, dec!(20), dec!(20)));

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        ctx.load_ready_units(SUBJECT).unwrap();

        let moved = AssignmentDispatcher::new()
            .move_assignment(&mut ctx, aid(1), id(2), dec!(50))
            .unwrap();
        assert_eq!(moved, dec!(6));
        let left = ctx.unit(id(1)).unwrap().assignment(aid(1)).unwrap();
        assert_eq!(left.sold_quantity(), dec!(4));
        assert!(left.is_fully_shipped());
    }

    #[test]
    fn move_that_would_oversell_is_rejected() {
        let store = FakeStore::new();
        let mut u1 = unit(1, dec!(20), dec!(20));
        assign(&mut u1, 1, 1, 1, dec!(10));
        store.put(u1);
        store.put(unit(2, dec!(5), dec!(5)));

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        ctx.load_ready_units(SUBJECT).unwrap();

        let err = AssignmentDispatcher::new()
            .move_assignment(&mut ctx, aid(1), id(2), dec!(10))
            .unwrap_err();
        assert!(matches!(err, AllocationError::Domain(DomainError::InvariantViolation(_))));
        assert_eq!(ctx.unit(id(1)).unwrap().sold_quantity(), dec!(10));
        assert_eq!(ctx.unit(id(2)).unwrap().sold_quantity(), dec!(0));
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn exchange_swaps_without_changing_reservable() {
        let store = FakeStore::new();
        let mut source = unit(1, dec!(20), dec!(0));
        assign(&mut source, 1, 1, 1, dec!(20));
        let mut target = unit(2, dec!(20), dec!(20));
        assign(&mut target, 2, 5, 5, dec!(8));
        assign(&mut target, 3, 6, 6, dec!(12));
        store.put(source);
        store.put(target);

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        ctx.load_ready_units(SUBJECT).unwrap();

        let swapped = AssignmentDispatcher::new()
            .exchange(&mut ctx, aid(3), aid(1), id(2), dec!(12))
            .unwrap();
        assert_eq!(swapped, dec!(12));

        let s = ctx.unit(id(1)).unwrap();
        let t = ctx.unit(id(2)).unwrap();
        assert_eq!(s.reservable_quantity(), dec!(0));
        assert_eq!(t.reservable_quantity(), dec!(0));
        assert_eq!(s.assignment(aid(3)).unwrap().sold_quantity(), dec!(12));
        assert_eq!(s.assignment(aid(1)).unwrap().sold_quantity(), dec!(8));
        assert_eq!(sold_of_item(&[s, t], 1), dec!(20));
        assert_eq!(
            t.assignment_for_item(DemandItemId::new(1)).unwrap().sold_quantity(),
            dec!(12)
        );
    }

    #[test]
    fn exchange_with_assignment_missing_on_target_is_a_logic_error() {
        let store = FakeStore::new();
        let mut source = unit(1, dec!(20), dec!(0));
        assign(&mut source, 1, 1, 1, dec!(20));
        store.put(source);
        store.put(unit(2, dec!(20), dec!(20)));

        let config = AllocationConfig::default();
        let mut ctx = PassContext::new(&store, &store, &config);
        ctx.load_ready_units(SUBJECT).unwrap();

        let err = AssignmentDispatcher::new()
            .exchange(&mut ctx, aid(99), aid(1), id(2), dec!(5))
            .unwrap_err();
        assert!(matches!(err, AllocationError::Domain(DomainError::Logic(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: moves never change the sold quantity of a demand line
        /// nor leave a unit inconsistent.
        #[test]
        fn moves_conserve_sold_quantity_per_line(
            initial in prop::collection::vec((0usize..3, 1i64..12), 1..6),
            moves in prop::collection::vec((0usize..6, 0usize..3, 1i64..20), 1..20),
        ) {
            let store = FakeStore::new();
            let mut units: Vec<StockUnit> = (1..=3).map(|n| unit(n, dec!(60), dec!(30))).collect();
            for (n, (slot, q)) in initial.iter().enumerate() {
                let line = n as u64 + 1;
                assign(&mut units[*slot], line, line, line, Decimal::from(*q));
            }
            for u in units {
                store.put(u);
            }
            let lines = initial.len() as u64;
            let totals: Vec<Decimal> = initial.iter().map(|(_, q)| Decimal::from(*q)).collect();

            let config = AllocationConfig::default();
            let mut ctx = PassContext::new(&store, &store, &config);
            ctx.load_ready_units(SUBJECT).unwrap();
            let dispatcher = AssignmentDispatcher::new();

            for (line, target, q) in moves {
                let line = (line as u64 % lines) + 1;
                let found = ctx.cache().assignments_for_item(DemandItemId::new(line));
                let Some((source, assignment)) = found.first().copied() else { continue };
                let target = id(target as u64 + 1);
                if target == source {
                    continue;
                }
                let _ = dispatcher.move_assignment(&mut ctx, assignment, target, Decimal::from(q));

                let all: Vec<&StockUnit> = (1..=3).filter_map(|n| ctx.unit(id(n))).collect();
                for u in &all {
                    prop_assert!(u.verify().is_ok());
                    prop_assert!(u.reservable_quantity() >= Decimal::ZERO);
                }
                for l in 1..=lines {
                    prop_assert_eq!(sold_of_item(&all, l), totals[l as usize - 1]);
                }
            }
        }
    }
}
