//! Infrastructure layer: stock store adapters, the prioritization service
//! and the audit journal.

pub mod journal;
pub mod service;
pub mod store;

pub use journal::AuditJournal;
pub use service::{PassReport, PrioritizationService, PrioritizeError};
pub use store::{InMemoryStockStore, StoreError};
