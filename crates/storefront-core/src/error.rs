//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  storefront-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  storefront-checkout errors                                             │
//! │  └── ServiceError     - What API callers see                            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ServiceError → Caller   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (order id, coupon code, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::order::OrderStatus;
use crate::payment::{PaymentStatus, RefundStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations and domain logic failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product referenced by a cart or order operation does not exist
    /// or is inactive.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Requested quantity exceeds available stock.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Cart line for the given product is absent.
    #[error("Product {product_id} not in cart")]
    LineNotFound { product_id: String },

    /// Quantity must be positive for an add.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// Line quantity exceeds the per-line cap.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Cart has exceeded maximum allowed distinct lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Checkout requires a non-empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Coupon cannot be applied: inactive, outside its validity window,
    /// exhausted, or the order is below its minimum amount.
    #[error("Coupon '{code}' is not applicable: {reason}")]
    CouponNotApplicable { code: String, reason: String },

    /// Order status does not permit the requested transition.
    #[error("Order {order_id} is {current:?}, cannot move to {requested:?}")]
    InvalidOrderStatus {
        order_id: String,
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// Payment status does not permit the requested transition.
    #[error("Payment {payment_id} is {current:?}, cannot move to {requested:?}")]
    InvalidPaymentStatus {
        payment_id: String,
        current: PaymentStatus,
        requested: PaymentStatus,
    },

    /// Refund status does not permit the requested transition.
    #[error("Refund {refund_id} is {current:?}, transition rejected")]
    InvalidRefundStatus {
        refund_id: String,
        current: RefundStatus,
    },

    /// Refund amount is invalid (non-positive or exceeds the payment).
    #[error("Invalid refund for payment {payment_id}: {reason}")]
    InvalidRefundAmount { payment_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (bad code characters, malformed id, etc.).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p42".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for p42: available 3, requested 5"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
