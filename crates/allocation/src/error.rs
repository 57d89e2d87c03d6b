use stockflow_core::DomainError;

use crate::repository::RepositoryError;

/// Failure of an allocation pass.
///
/// A pass that fails leaves the store untouched: everything it changed only
/// lives in its [`crate::PassContext`], which the caller drops.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AllocationError {
    /// Whether running the pass again on fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AllocationError::Domain(e) => e.is_retryable(),
            AllocationError::Repository(e) => matches!(e, RepositoryError::Conflict(_)),
        }
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;
