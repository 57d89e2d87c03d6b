//! Strongly-typed identifiers used across the domain.
//!
//! Identifiers are opaque integers issued by the persistence layer. They grow
//! monotonically, so ascending id order is oldest-first order.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! impl_id_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(u64);

        impl $t {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = u64::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_id_newtype!(
    /// Identifier of a stockable subject (the product a unit holds).
    SubjectId,
    "SubjectId"
);
impl_id_newtype!(
    /// Identifier of a stock unit (one lot).
    StockUnitId,
    "StockUnitId"
);
impl_id_newtype!(
    /// Identifier of a stock assignment.
    StockAssignmentId,
    "StockAssignmentId"
);
impl_id_newtype!(
    /// Identifier of a top-level demand (order, production, sale).
    DemandId,
    "DemandId"
);
impl_id_newtype!(
    /// Identifier of a demand line (leaf or nested child line).
    DemandItemId,
    "DemandItemId"
);
impl_id_newtype!(
    /// Identifier of the inbound supply line feeding a unit.
    SupplyLineId,
    "SupplyLineId"
);
