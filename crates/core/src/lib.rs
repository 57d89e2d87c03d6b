//! `stockflow-core`: ids, quantities and errors shared by the stock and
//! demand models and the allocation engine. No I/O lives here.

pub mod error;
pub mod id;
pub mod model;
pub mod quantity;

pub use error::{DomainError, DomainResult};
pub use id::{DemandId, DemandItemId, StockAssignmentId, StockUnitId, SubjectId, SupplyLineId};
pub use model::{AggregateRoot, Entity, ExpectedVersion, ValueObject};
pub use quantity::Quantity;
