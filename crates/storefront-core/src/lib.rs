//! # storefront-core: Pure Business Logic for the Storefront
//!
//! This crate is the heart of the storefront. It contains the pricing and
//! checkout rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Storefront Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 storefront-checkout (Service)                   │   │
//! │  │     place_order, cart mutation API, gateway webhook             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ storefront-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │   cart    │  │  coupon   │  │   order   │  │   │
//! │  │   │   Money   │  │ CartLine  │  │ evaluator │  │  status   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  storefront-db (Database Layer)                 │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Address, statuses, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - Cart line accumulation and totals
//! - [`coupon`] - Discount-rule evaluator
//! - [`order`] - Order snapshot, numbering and status machine
//! - [`payment`] - Payment/Refund lifecycles
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output
//! 2. **No I/O**: database, network, file system access is forbidden here
//! 3. **Integer Money**: all monetary values are minor units (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod coupon;
pub mod error;
pub mod money;
pub mod order;
pub mod payment;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals};
pub use coupon::{Coupon, DiscountType};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use order::{generate_order_number, Order, OrderItem, OrderStatus, OrderTotals};
pub use payment::{Payment, PaymentStatus, Refund, RefundStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default currency code for orders and payments.
///
/// The storefront is single-currency; the column exists so historical
/// orders stay correct if the store ever switches.
pub const DEFAULT_CURRENCY: &str = "UAH";

/// Maximum quantity of a single product in a cart line.
///
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Upper bound for a percentage coupon's value: 10000 basis points = 100%.
pub const MAX_DISCOUNT_BPS: i64 = 10_000;
