//! # Domain Types
//!
//! Shared domain types: the catalog read-model, addresses and saved
//! payment instruments.
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (sku, order_number, coupon code)
//!
//! ## Snapshot vs. Live Data
//! The catalog (`Product`) is owned externally and consumed by reference.
//! Cart totals read the product price *live*; order items freeze it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product (catalog read-model)
// =============================================================================

/// A catalog product, as the cart and checkout see it.
///
/// The catalog itself (categories, brands, variants, attributes) is an
/// external collaborator; this is the slice of it that pricing needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Optional description (searched by the substring filter).
    pub description: Option<String>,

    /// Price in minor units. Read live at cart time, frozen at checkout.
    pub price_minor: i64,

    /// Current stock level.
    pub stock: i64,

    /// Whether stock is tracked for this product.
    pub track_stock: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price_minor)
    }

    /// Checks whether the requested quantity can be sold.
    pub fn can_sell(&self, quantity: i64) -> bool {
        if !self.track_stock {
            return true;
        }
        self.stock >= quantity
    }
}

// =============================================================================
// Address
// =============================================================================

/// Address kind - an address is saved either for shipping or billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Shipping,
    Billing,
}

impl Default for AddressKind {
    fn default() -> Self {
        AddressKind::Shipping
    }
}

/// A saved customer address.
///
/// ## Default Flag Invariant
/// At most one address per (user, kind) carries `is_default = true`.
/// The repository enforces this with an atomic exclusive-flag update;
/// nothing here should flip the flag in isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Address {
    pub id: String,
    pub user_id: String,
    pub kind: AddressKind,
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Short human-readable form for logs and order summaries.
    pub fn display_line(&self) -> String {
        format!("{} {}, {}", self.first_name, self.last_name, self.city)
    }
}

// =============================================================================
// Payment Method Kind
// =============================================================================

/// How a payment is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Cash,
    Card,
    BankTransfer,
    Stripe,
    Paypal,
    ApplePay,
    GooglePay,
}

// =============================================================================
// Saved Payment Instrument
// =============================================================================

/// A saved payment instrument belonging to a user.
///
/// Same exclusive default-flag rule as [`Address`], scoped to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SavedPaymentMethod {
    pub id: String,
    pub user_id: String,
    pub kind: PaymentMethodKind,
    pub is_default: bool,
    /// Gateway-side instrument id (e.g. a Stripe payment method id).
    pub gateway_method_id: Option<String>,
    /// Gateway-side customer id.
    pub gateway_customer_id: Option<String>,
    /// Opaque metadata from the gateway, stored as JSON text.
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
