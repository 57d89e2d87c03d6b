use rust_decimal::Decimal;

use stockflow_core::{DemandId, DemandItemId, DomainError, Quantity, StockUnitId, SubjectId};
use stockflow_stock::{AssignmentAdjusted, AssignmentCreated, StockEvent, StockUnitState, UnitSoldAdjusted};

use crate::context::PassContext;
use crate::error::AllocationResult;

/// Gives a demand line without assignments its first ones.
///
/// Reservable quantity of existing units is used first (READY units, then
/// PENDING, then NEW, oldest first); whatever is left goes to a new virtual
/// unit that waits for supply.
#[derive(Debug, Default, Clone, Copy)]
pub struct StockUnitAssigner;

impl StockUnitAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Assign `quantity` of `subject` to `item`. Returns whether anything
    /// was assigned.
    pub fn assign_item(
        &self,
        ctx: &mut PassContext<'_>,
        demand: DemandId,
        item: DemandItemId,
        subject: SubjectId,
        quantity: Quantity,
    ) -> AllocationResult<bool> {
        if quantity <= Decimal::ZERO {
            return Ok(false);
        }
        ctx.load_assignable_units(subject)?;

        let mut units: Vec<_> = ctx
            .cache()
            .units_of_subject(subject)
            .filter(|u| u.state() != StockUnitState::Closed)
            .filter(|u| u.reservable_quantity() > Decimal::ZERO)
            .map(|u| (state_rank(u.state()), u.id_typed(), u.reservable_quantity()))
            .collect();
        units.sort();

        let mut remaining = quantity;
        for (_, unit_id, reservable) in units {
            if remaining <= Decimal::ZERO {
                break;
            }
            let share = remaining.min(reservable);
            self.credit(ctx, unit_id, demand, item, share)?;
            remaining -= share;
        }

        if remaining > Decimal::ZERO {
            let unit_id = ctx.create_unit(subject);
            self.credit(ctx, unit_id, demand, item, remaining)?;
        }
        tracing::info!(item = %item, subject = %subject, %quantity, "demand line assigned");
        Ok(true)
    }

    fn credit(
        &self,
        ctx: &mut PassContext<'_>,
        unit_id: StockUnitId,
        demand: DemandId,
        item: DemandItemId,
        quantity: Quantity,
    ) -> AllocationResult<()> {
        let repository = ctx.repository();
        let at = ctx.started_at();
        let Some(unit) = ctx.unit_mut(unit_id) else {
            return Err(DomainError::logic(format!("unit {unit_id} is not loaded")).into());
        };
        let (assignment, created) = unit.credit(item, demand, quantity, || repository.next_assignment_id())?;
        unit.verify()?;
        let subject = unit.subject_id();
        let sold_after = unit.sold_quantity();

        let event = if created {
            StockEvent::AssignmentCreated(AssignmentCreated {
                subject_id: subject,
                unit_id,
                assignment_id: assignment,
                demand_item_id: item,
                quantity,
                occurred_at: at,
            })
        } else {
            StockEvent::AssignmentAdjusted(AssignmentAdjusted {
                subject_id: subject,
                unit_id,
                assignment_id: assignment,
                delta: quantity,
                occurred_at: at,
            })
        };
        ctx.record(event);
        ctx.record(StockEvent::UnitSoldAdjusted(UnitSoldAdjusted {
            subject_id: subject,
            unit_id,
            delta: quantity,
            sold_after,
            occurred_at: at,
        }));
        Ok(())
    }
}

fn state_rank(state: StockUnitState) -> u8 {
    match state {
        StockUnitState::Ready => 0,
        StockUnitState::Pending => 1,
        StockUnitState::New => 2,
        StockUnitState::Closed => 3,
    }
}
