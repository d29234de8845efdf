//! # Cart Module
//!
//! Pure cart accumulation rules and totals.
//!
//! The persistent cart lives in storefront-db (one row per line, unique
//! on (cart, product)); this module holds the arithmetic and the
//! merge/remove rules so they are testable without a database, and so
//! the service layer computes totals the same way the repository does.
//!
//! ## Invariants
//! - Lines are unique by `product_id` (adding the same product merges
//!   quantities into one line)
//! - Quantity is always > 0 (an update to 0 or below removes the line)
//! - `total_price` reads the *live* unit price carried on each line;
//!   prices are only frozen at checkout, never in the cart

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One (product, quantity) pairing within a user's cart.
///
/// `unit_price_minor` is the product's price as currently listed - not a
/// snapshot. A repriced product reprices every cart that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub product_id: String,
    pub unit_price_minor: i64,
    pub quantity: i64,
}

impl CartLine {
    /// The current unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_minor(self.unit_price_minor)
    }

    /// Line total = unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// An in-memory view of a user's cart, used to apply the accumulation
/// rules before they are persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Adds a quantity of a product, merging into an existing line.
    ///
    /// ## Behavior
    /// - Product already in cart: quantities accumulate (q1 then q2
    ///   yields one line at q1+q2)
    /// - Product not in cart: a new line is appended
    pub fn add(&mut self, product_id: &str, unit_price_minor: i64, quantity: i64) -> Result<(), CoreError> {
        if quantity <= 0 {
            return Err(CoreError::InvalidQuantity { quantity });
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge { max: MAX_CART_LINES });
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_LINE_QUANTITY,
            });
        }

        self.lines.push(CartLine {
            product_id: product_id.to_string(),
            unit_price_minor,
            quantity,
        });
        Ok(())
    }

    /// Sets the quantity of an existing line.
    ///
    /// A quantity of zero or below removes the line entirely; a line is
    /// never persisted at zero.
    pub fn update(&mut self, product_id: &str, quantity: i64) -> Result<(), CoreError> {
        if quantity <= 0 {
            self.remove(product_id);
            return Ok(());
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_LINE_QUANTITY,
            });
        }

        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::LineNotFound {
                product_id: product_id.to_string(),
            }),
        }
    }

    /// Removes the line for a product. No-op if the product is absent.
    pub fn remove(&mut self, product_id: &str) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    /// Deletes all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of quantities across all lines.
    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line totals (live unit price × quantity).
    pub fn total_price(&self) -> Money {
        self.lines.iter().map(|l| l.line_total()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Running totals returned by every cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub cart_total_minor: i64,
    pub cart_items_count: i64,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            cart_total_minor: cart.total_price().minor(),
            cart_items_count: cart.total_items(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates_quantities() {
        let mut cart = Cart::new();
        cart.add("p1", 999, 2).unwrap();
        cart.add("p1", 999, 3).unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let mut cart = Cart::new();
        assert!(cart.add("p1", 999, 0).is_err());
        assert!(cart.add("p1", 999, -2).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_to_zero_removes_line() {
        let mut cart = Cart::new();
        cart.add("p1", 999, 2).unwrap();

        cart.update("p1", 0).unwrap();
        assert!(cart.is_empty());

        // Re-adding afterwards creates a fresh line at that quantity.
        cart.add("p1", 999, 4).unwrap();
        assert_eq!(cart.lines[0].quantity, 4);
    }

    #[test]
    fn test_update_negative_removes_line() {
        let mut cart = Cart::new();
        cart.add("p1", 999, 2).unwrap();
        cart.update("p1", -1).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_missing_line_is_an_error() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.update("ghost", 3),
            Err(CoreError::LineNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut cart = Cart::new();
        cart.add("p1", 999, 2).unwrap();
        cart.remove("ghost");
        assert_eq!(cart.lines.len(), 1);
    }

    #[test]
    fn test_total_price_uses_live_unit_price() {
        let mut cart = Cart::new();
        cart.add("p1", 10000, 2).unwrap(); // 100.00 × 2
        cart.add("p2", 2550, 1).unwrap(); // 25.50

        assert_eq!(cart.total_price(), Money::from_minor(22550));
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_quantity_cap() {
        let mut cart = Cart::new();
        cart.add("p1", 999, MAX_LINE_QUANTITY).unwrap();
        assert!(matches!(
            cart.add("p1", 999, 1),
            Err(CoreError::QuantityTooLarge { .. })
        ));
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add("p1", 999, 2).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(CartTotals::from(&cart).cart_total_minor, 0);
    }
}
