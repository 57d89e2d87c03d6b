//! Stock domain module.
//!
//! Stock units (lots) and the assignments promising their quantity to demand
//! lines. A unit owns its assignments; every mutation goes through the unit
//! so that `sold == Σ assignment.sold` holds after each call.

pub mod assignment;
pub mod event;
pub mod unit;

pub use assignment::StockAssignment;
pub use event::{
    AssignmentAdjusted, AssignmentCreated, AssignmentMerged, AssignmentRemoved,
    AssignmentRepointed, StockEvent, UnitCreated, UnitSoldAdjusted,
};
pub use unit::{AttachOutcome, DebitOutcome, StockUnit, StockUnitState};
