//! # Validation Module
//!
//! Input validation for values that cross the API boundary, run before
//! any business logic. The database adds its own layer underneath
//! (NOT NULL, UNIQUE, CHECK and FK constraints).

use crate::coupon::DiscountType;
use crate::error::ValidationError;
use crate::{MAX_DISCOUNT_BPS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Quantity
// =============================================================================

/// Validates a cart/order quantity for an add operation.
///
/// Must be positive and within the per-line cap. Zero and negative
/// values are legal only for *updates*, where they mean "remove".
pub fn validate_add_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Coupon Code
// =============================================================================

/// Validates a coupon code.
///
/// ## Rules
/// - Must not be empty (after trimming)
/// - Must be at most 50 characters
/// - Only alphanumeric characters, hyphens and underscores
pub fn validate_coupon_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }
    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 50,
        });
    }
    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(())
}

/// Validates a coupon's discount value at creation time.
///
/// Fixed values must be positive minor units; percentage values must be
/// positive basis points not exceeding 100% (the schema only enforces
/// non-negativity).
pub fn validate_discount_value(discount_type: DiscountType, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "discount_value".to_string(),
        });
    }
    if discount_type == DiscountType::Percentage && value > MAX_DISCOUNT_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount_value".to_string(),
            min: 1,
            max: MAX_DISCOUNT_BPS,
        });
    }
    Ok(())
}

// =============================================================================
// Monetary Amounts
// =============================================================================

/// Validates an externally supplied amount in minor units (payment or
/// refund creation). Must be strictly positive.
pub fn validate_amount_minor(amount: i64, field: &str) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_quantity() {
        assert!(validate_add_quantity(1).is_ok());
        assert!(validate_add_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_add_quantity(0).is_err());
        assert!(validate_add_quantity(-5).is_err());
        assert!(validate_add_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_coupon_code() {
        assert!(validate_coupon_code("SAVE10").is_ok());
        assert!(validate_coupon_code("black-friday_25").is_ok());
        assert!(validate_coupon_code("").is_err());
        assert!(validate_coupon_code("  ").is_err());
        assert!(validate_coupon_code("BAD CODE!").is_err());
        assert!(validate_coupon_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_discount_value() {
        assert!(validate_discount_value(DiscountType::Percentage, 1000).is_ok());
        assert!(validate_discount_value(DiscountType::Percentage, MAX_DISCOUNT_BPS).is_ok());
        assert!(validate_discount_value(DiscountType::Percentage, MAX_DISCOUNT_BPS + 1).is_err());
        assert!(validate_discount_value(DiscountType::Percentage, 0).is_err());
        // Fixed values are minor units; only positivity applies.
        assert!(validate_discount_value(DiscountType::Fixed, 50_000).is_ok());
        assert!(validate_discount_value(DiscountType::Fixed, -1).is_err());
    }

    #[test]
    fn test_amount() {
        assert!(validate_amount_minor(100, "amount").is_ok());
        assert!(validate_amount_minor(0, "amount").is_err());
        assert!(validate_amount_minor(-1, "amount").is_err());
    }
}
