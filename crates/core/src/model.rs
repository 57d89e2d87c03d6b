//! Identity and versioning shared by the stock model.

use core::fmt::Display;

use crate::error::{DomainError, DomainResult};

/// Something with a stable identity: a stock assignment keeps its id while
/// quantities are split off it, merged into it or moved with it.
pub trait Entity {
    type Id: Copy + Ord + Display;

    fn id(&self) -> Self::Id;
}

/// Consistency boundary persisted as a whole.
///
/// A stock unit and the assignments it owns are written together; the
/// version is what concurrent passes touching the same unit race on.
pub trait AggregateRoot: Entity {
    /// Persisted version, `0` until the store accepted the aggregate once.
    fn version(&self) -> u64;

    fn is_persisted(&self) -> bool {
        self.version() > 0
    }

    /// What the store must find before writing this aggregate back.
    fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::of(self.version())
    }
}

/// Pure comparison result of a search pass; equal quantities mean equal
/// values, whichever pass produced them.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Stored state a write is conditioned on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Nothing stored under the id yet.
    Absent,
    Exact(u64),
}

impl ExpectedVersion {
    pub fn of(version: u64) -> Self {
        if version == 0 {
            Self::Absent
        } else {
            Self::Exact(version)
        }
    }

    /// `found` is the stored version, `None` when nothing is stored.
    pub fn matches(self, found: Option<u64>) -> bool {
        match (self, found) {
            (Self::Absent, None) => true,
            (Self::Exact(expected), Some(v)) => expected == v,
            _ => false,
        }
    }

    pub fn check(self, id: impl Display, found: Option<u64>) -> DomainResult<()> {
        if self.matches(found) {
            return Ok(());
        }
        let found = found.map_or_else(|| "nothing".to_string(), |v| format!("version {v}"));
        Err(DomainError::conflict(format!(
            "{id}: expected {self:?}, found {found}"
        )))
    }
}
