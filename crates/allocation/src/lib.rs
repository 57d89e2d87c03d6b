//! Stock allocation and prioritization engine.
//!
//! Given a demand whose assigned stock cannot currently be shipped, the
//! engine looks for other units of the same subject and moves, splits
//! or merges assignments so that more demand lines become shippable, keeping
//! every unit's counters consistent at each step.
//!
//! ```text
//! Prioritizer::prioritize(demand)
//!   └─ per line (depth-first), per assignment (oldest first)
//!        ├─ PrioritizeUnitResolver::get_unit_candidate  (rank target units)
//!        │    └─ UnitCandidate::get_combination         (subset search)
//!        └─ AssignmentDispatcher::move_assignment / exchange
//! ```
//!
//! All state of a pass lives in a [`PassContext`]: units are loaded through
//! the [`StockUnitRepository`] port at most once, mutated in memory, and
//! handed back as a [`ChangeSet`] for a single atomic commit.

pub mod assigner;
pub mod cache;
pub mod candidate;
pub mod checker;
pub mod combination;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod prioritizer;
pub mod repository;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use assigner::StockUnitAssigner;
pub use cache::StockUnitCache;
pub use candidate::{DemandContext, UnitCandidate};
pub use checker::{KindPolicy, PrioritizeChecker};
pub use combination::AssignmentCombination;
pub use config::AllocationConfig;
pub use context::{PassContext, PassOutcome};
pub use dispatcher::AssignmentDispatcher;
pub use error::{AllocationError, AllocationResult};
pub use prioritizer::Prioritizer;
pub use repository::{ChangeSet, DemandDirectory, RepositoryError, StockUnitRepository};
pub use resolver::PrioritizeUnitResolver;
