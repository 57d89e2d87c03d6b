//! Errors raised by the stock model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure that aborts a whole prioritization pass.
///
/// Finding no unit, no candidate or no combination is not an error: the
/// search returns `None` and the pass simply leaves things as they are.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input, such as a non-positive quantity.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A quantity rule would break: negative counter, oversell, moving
    /// shipped stock.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Loaded units disagree with each other, e.g. a combination names an
    /// assignment the target unit does not hold.
    #[error("stock logic error: {0}")]
    Logic(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Someone else wrote the same unit first.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self::Logic(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Rerunning the pass on fresh state may succeed; everything else is
    /// deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
