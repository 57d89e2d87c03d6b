//! Demand domain module.
//!
//! Orders, production orders and generic sales as seen by the allocation
//! engine: a tree of lines that can carry stock assignments, plus the
//! workflow signals (status, shipment state) that gate stock operations.
//! Workflow transitions themselves belong to the surrounding system.

pub mod demand;
pub mod item;

pub use demand::{Demand, DemandKind, DemandStatus, ShipmentState};
pub use item::{Assignable, DemandItem};
