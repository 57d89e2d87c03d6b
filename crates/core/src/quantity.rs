//! Decimal quantity helpers.
//!
//! Stock quantities are exact decimals (`rust_decimal::Decimal`): lots can be
//! sold by weight or length, and conservation checks compare sums exactly.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// A stock quantity.
pub type Quantity = Decimal;

/// Clamp a quantity at zero (`max(q, 0)`).
pub fn floor_zero(quantity: Quantity) -> Quantity {
    quantity.max(Decimal::ZERO)
}

/// Ensure a quantity is strictly positive.
pub fn ensure_positive(quantity: Quantity, what: &str) -> DomainResult<Quantity> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{what} must be positive (got {quantity})"
        )));
    }
    Ok(quantity)
}

/// Ensure a quantity is not negative.
pub fn ensure_non_negative(quantity: Quantity, what: &str) -> DomainResult<Quantity> {
    if quantity < Decimal::ZERO {
        return Err(DomainError::invariant(format!(
            "{what} cannot be negative (got {quantity})"
        )));
    }
    Ok(quantity)
}
