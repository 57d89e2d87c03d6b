//! Audit events: every quantity delta applied to a unit or an assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DemandItemId, Quantity, StockAssignmentId, StockUnitId, SubjectId};
use stockflow_events::Event;

/// Event: UnitCreated (a virtual unit was created for a demand line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCreated {
    pub subject_id: SubjectId,
    pub unit_id: StockUnitId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitSoldAdjusted (a unit's sold counter changed by `delta`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSoldAdjusted {
    pub subject_id: SubjectId,
    pub unit_id: StockUnitId,
    pub delta: Quantity,
    pub sold_after: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCreated {
    pub subject_id: SubjectId,
    pub unit_id: StockUnitId,
    pub assignment_id: StockAssignmentId,
    pub demand_item_id: DemandItemId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentAdjusted (sold quantity changed in place by `delta`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentAdjusted {
    pub subject_id: SubjectId,
    pub unit_id: StockUnitId,
    pub assignment_id: StockAssignmentId,
    pub delta: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentRepointed (a whole assignment now points at another unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRepointed {
    pub subject_id: SubjectId,
    /// Destination unit.
    pub unit_id: StockUnitId,
    pub from_unit_id: StockUnitId,
    pub assignment_id: StockAssignmentId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentMerged (`source` was folded into `into` on `unit_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentMerged {
    pub subject_id: SubjectId,
    pub unit_id: StockUnitId,
    pub source_id: StockAssignmentId,
    pub into_id: StockAssignmentId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentRemoved (its sold quantity reached zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRemoved {
    pub subject_id: SubjectId,
    pub unit_id: StockUnitId,
    pub assignment_id: StockAssignmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    UnitCreated(UnitCreated),
    UnitSoldAdjusted(UnitSoldAdjusted),
    AssignmentCreated(AssignmentCreated),
    AssignmentAdjusted(AssignmentAdjusted),
    AssignmentRepointed(AssignmentRepointed),
    AssignmentMerged(AssignmentMerged),
    AssignmentRemoved(AssignmentRemoved),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::UnitCreated(_) => "stock.unit.created",
            StockEvent::UnitSoldAdjusted(_) => "stock.unit.sold_adjusted",
            StockEvent::AssignmentCreated(_) => "stock.assignment.created",
            StockEvent::AssignmentAdjusted(_) => "stock.assignment.adjusted",
            StockEvent::AssignmentRepointed(_) => "stock.assignment.repointed",
            StockEvent::AssignmentMerged(_) => "stock.assignment.merged",
            StockEvent::AssignmentRemoved(_) => "stock.assignment.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::UnitCreated(e) => e.occurred_at,
            StockEvent::UnitSoldAdjusted(e) => e.occurred_at,
            StockEvent::AssignmentCreated(e) => e.occurred_at,
            StockEvent::AssignmentAdjusted(e) => e.occurred_at,
            StockEvent::AssignmentRepointed(e) => e.occurred_at,
            StockEvent::AssignmentMerged(e) => e.occurred_at,
            StockEvent::AssignmentRemoved(e) => e.occurred_at,
        }
    }

    fn subject_id(&self) -> SubjectId {
        match self {
            StockEvent::UnitCreated(e) => e.subject_id,
            StockEvent::UnitSoldAdjusted(e) => e.subject_id,
            StockEvent::AssignmentCreated(e) => e.subject_id,
            StockEvent::AssignmentAdjusted(e) => e.subject_id,
            StockEvent::AssignmentRepointed(e) => e.subject_id,
            StockEvent::AssignmentMerged(e) => e.subject_id,
            StockEvent::AssignmentRemoved(e) => e.subject_id,
        }
    }

    fn unit_id(&self) -> StockUnitId {
        match self {
            StockEvent::UnitCreated(e) => e.unit_id,
            StockEvent::UnitSoldAdjusted(e) => e.unit_id,
            StockEvent::AssignmentCreated(e) => e.unit_id,
            StockEvent::AssignmentAdjusted(e) => e.unit_id,
            StockEvent::AssignmentRepointed(e) => e.unit_id,
            StockEvent::AssignmentMerged(e) => e.unit_id,
            StockEvent::AssignmentRemoved(e) => e.unit_id,
        }
    }
}
