//! Stock unit storage boundary.
//!
//! The engine only sees the ports of `stockflow_allocation::repository`;
//! this module provides their in-memory adapter.

pub mod in_memory;

pub use in_memory::InMemoryStockStore;

use stockflow_allocation::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("lock poisoned")]
    Poisoned,
}

impl From<StoreError> for RepositoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => RepositoryError::Conflict(msg),
            other => RepositoryError::Unavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Serialize(value.to_string())
    }
}
