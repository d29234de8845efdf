//! # Order Module
//!
//! The order snapshot, its numbering scheme, and the status machine.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Status Machine                              │
//! │                                                                         │
//! │  pending ──► confirmed ──► processing ──► shipped ──► delivered        │
//! │     │            │                                                      │
//! │     └────────────┴──► cancelled   (only from pending/confirmed)        │
//! │                                                                         │
//! │  any ──► refunded   (terminal, driven by a completed Refund)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! An order freezes cart contents at checkout: each [`OrderItem`] copies
//! the product's price at that moment and never follows later catalog
//! edits. `total` is derived (`subtotal + tax + shipping - discount`) and
//! recomputed on demand by [`Order::calculate_totals`]; it is *not* kept
//! in sync automatically if items are edited post-creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting confirmation.
    Pending,
    /// Confirmed by the store.
    Confirmed,
    /// Being prepared for shipment.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer (terminal happy path).
    Delivered,
    /// Cancelled before fulfilment (terminal).
    Cancelled,
    /// Money returned (terminal).
    Refunded,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl OrderStatus {
    /// Whether an order in this status may be cancelled.
    ///
    /// Cancellation is permitted only before fulfilment starts.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Whether `next` is a legal forward transition from this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            // Happy path advances one step at a time.
            (Pending, Confirmed) => true,
            (Confirmed, Processing) => true,
            (Processing, Shipped) => true,
            (Shipped, Delivered) => true,
            // Cancellation only before fulfilment.
            (Pending, Cancelled) | (Confirmed, Cancelled) => true,
            // Refund is reachable from anywhere except itself.
            (current, Refunded) => *current != Refunded,
            _ => false,
        }
    }

    /// Whether this status ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }
}

// =============================================================================
// Order
// =============================================================================

/// An immutable-once-placed snapshot of cart contents.
///
/// Only the status field changes after creation; the monetary snapshot
/// is written at checkout and recomputed explicitly, never implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    /// Business identifier: `ORD-` + 8 random uppercase hex characters.
    pub order_number: String,
    pub user_id: String,
    pub status: OrderStatus,
    /// Shipping address reference. Protected against deletion while referenced.
    pub shipping_address_id: String,
    /// Billing address reference. Protected against deletion while referenced.
    pub billing_address_id: String,
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub shipping_minor: i64,
    pub discount_minor: i64,
    pub total_minor: i64,
    pub currency: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_minor(self.subtotal_minor)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_minor)
    }

    /// Recomputes the monetary snapshot from the given items.
    ///
    /// Subtotal becomes the sum of current item totals; total follows
    /// the formula `subtotal + tax + shipping - discount`. Idempotent:
    /// calling it twice with unchanged items yields the same figures.
    pub fn calculate_totals(&mut self, items: &[OrderItem]) {
        self.subtotal_minor = items.iter().map(|i| i.total_minor).sum();
        self.total_minor =
            self.subtotal_minor + self.tax_minor + self.shipping_minor - self.discount_minor;
    }

    /// Total unit count across the given items.
    pub fn total_items(items: &[OrderItem]) -> i64 {
        items.iter().map(|i| i.quantity).sum()
    }

    /// Attempts to cancel the order.
    ///
    /// Permitted only from pending or confirmed; any other status
    /// rejects the transition without mutating state.
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        if !self.status.can_cancel() {
            return Err(CoreError::InvalidOrderStatus {
                order_id: self.id.clone(),
                current: self.status,
                requested: OrderStatus::Cancelled,
            });
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// Attempts a forward transition, rejecting illegal jumps.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidOrderStatus {
                order_id: self.id.clone(),
                current: self.status,
                requested: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A frozen cart line: product reference, quantity, price at snapshot
/// time, and the derived line total. Decoupled from the live catalog
/// price after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price at snapshot time (frozen).
    pub price_minor: i64,
    /// Line total = price × quantity (frozen).
    pub total_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Builds a frozen line from a product reference and live price.
    pub fn snapshot(
        order_id: &str,
        product_id: &str,
        unit_price: Money,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Self {
        OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            price_minor: unit_price.minor(),
            total_minor: unit_price.multiply_quantity(quantity).minor(),
            created_at: at,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_minor(self.total_minor)
    }
}

// =============================================================================
// Order Totals
// =============================================================================

/// The monetary breakdown of an order, computed at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Applies the order total formula to the given components.
    pub fn compute(subtotal: Money, tax: Money, shipping: Money, discount: Money) -> Self {
        OrderTotals {
            subtotal,
            tax,
            shipping,
            discount,
            total: subtotal + tax + shipping - discount,
        }
    }
}

// =============================================================================
// Order Numbering
// =============================================================================

/// Generates an order number: `ORD-` + 8 random uppercase hex characters.
///
/// The space is small enough that collisions are possible; the order
/// repository retries on a unique violation rather than pretending they
/// cannot happen.
pub fn generate_order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", hex[..8].to_uppercase())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: "o1".to_string(),
            order_number: generate_order_number(),
            user_id: "u1".to_string(),
            status,
            shipping_address_id: "a1".to_string(),
            billing_address_id: "a2".to_string(),
            subtotal_minor: 0,
            tax_minor: 0,
            shipping_minor: 0,
            discount_minor: 0,
            total_minor: 0,
            currency: crate::DEFAULT_CURRENCY.to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(order_id: &str, price: i64, qty: i64) -> OrderItem {
        OrderItem::snapshot(order_id, "p1", Money::from_minor(price), qty, Utc::now())
    }

    #[test]
    fn test_order_number_format() {
        let n = generate_order_number();
        assert!(n.starts_with("ORD-"));
        assert_eq!(n.len(), 12);
        assert!(n[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_item_snapshot_freezes_line_total() {
        let i = item("o1", 10000, 2);
        assert_eq!(i.total_minor, 20000);
        assert_eq!(i.line_total(), Money::from_minor(20000));
    }

    #[test]
    fn test_calculate_totals_formula() {
        let mut o = order(OrderStatus::Pending);
        o.tax_minor = 500;
        o.shipping_minor = 1500;
        o.discount_minor = 2000;

        let items = vec![item("o1", 10000, 2), item("o1", 2550, 1)];
        o.calculate_totals(&items);

        assert_eq!(o.subtotal_minor, 22550);
        assert_eq!(o.total_minor, 22550 + 500 + 1500 - 2000);
    }

    #[test]
    fn test_calculate_totals_is_idempotent() {
        let mut o = order(OrderStatus::Pending);
        o.tax_minor = 300;
        let items = vec![item("o1", 1000, 3)];

        o.calculate_totals(&items);
        let first = o.total_minor;
        o.calculate_totals(&items);
        assert_eq!(o.total_minor, first);
    }

    #[test]
    fn test_total_items_sums_quantities() {
        let items = vec![item("o1", 10000, 2), item("o1", 2550, 3)];
        assert_eq!(Order::total_items(&items), 5);
        assert_eq!(Order::total_items(&[]), 0);
    }

    #[test]
    fn test_cancel_from_pending_and_confirmed() {
        for status in [OrderStatus::Pending, OrderStatus::Confirmed] {
            let mut o = order(status);
            o.cancel().unwrap();
            assert_eq!(o.status, OrderStatus::Cancelled);
        }
    }

    #[test]
    fn test_cancel_rejected_elsewhere_without_mutation() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            let mut o = order(status);
            assert!(o.cancel().is_err());
            assert_eq!(o.status, status, "status must not change on rejection");
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut o = order(OrderStatus::Pending);
        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            o.transition_to(next).unwrap();
            assert_eq!(o.status, next);
        }
        assert!(o.status.is_terminal());
    }

    #[test]
    fn test_illegal_jumps_rejected() {
        let mut o = order(OrderStatus::Pending);
        assert!(o.transition_to(OrderStatus::Shipped).is_err());
        assert!(o.transition_to(OrderStatus::Delivered).is_err());
        assert_eq!(o.status, OrderStatus::Pending);
    }

    #[test]
    fn test_refunded_reachable_from_anywhere() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let mut o = order(status);
            o.transition_to(OrderStatus::Refunded).unwrap();
            assert_eq!(o.status, OrderStatus::Refunded);
        }
    }

    #[test]
    fn test_order_totals_compute() {
        let t = OrderTotals::compute(
            Money::from_minor(20000),
            Money::from_minor(0),
            Money::from_minor(0),
            Money::from_minor(2000),
        );
        assert_eq!(t.total, Money::from_minor(18000));
    }
}
