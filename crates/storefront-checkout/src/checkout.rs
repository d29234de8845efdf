//! # Checkout Service
//!
//! Turns a cart into an order.
//!
//! ## The Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         place_order                                     │
//! │                                                                         │
//! │  cart lines (live prices) ──► coupon evaluate + redeem                  │
//! │        │                              │                                 │
//! │        ▼                              ▼                                 │
//! │  order + item snapshot ──────► one transaction, number retried          │
//! │        │                       on collision                             │
//! │        ▼                                                                │
//! │  clear cart ──► return the created order                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices freeze here: the order items copy whatever the catalog said at
//! this moment, and later catalog edits never touch them. Tax and
//! shipping are inputs - their computation belongs to outside
//! collaborators.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use storefront_core::{
    generate_order_number, validation, Money, Order, OrderItem, OrderStatus, OrderTotals,
    DEFAULT_CURRENCY,
};
use storefront_db::Database;

use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Request DTO
// =============================================================================

/// Everything checkout needs besides the cart itself.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub shipping_address_id: String,
    pub billing_address_id: String,
    /// Optional coupon code, evaluated against the subtotal.
    pub coupon_code: Option<String>,
    /// Tax in minor units, computed by an external collaborator.
    #[serde(default)]
    pub tax_minor: i64,
    /// Shipping cost in minor units, computed by an external collaborator.
    #[serde(default)]
    pub shipping_minor: i64,
    pub notes: Option<String>,
}

// =============================================================================
// Checkout Service
// =============================================================================

/// Orchestrates cart-to-order conversion.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    db: Database,
}

impl CheckoutService {
    pub fn new(db: Database) -> Self {
        CheckoutService { db }
    }

    /// Places an order from the user's current cart.
    ///
    /// Steps: load the cart lines with live prices, evaluate and redeem
    /// the coupon, write the order with its frozen items in one
    /// transaction (retrying order-number collisions), then clear the
    /// cart. A redeemed coupon is released again if the order write
    /// fails afterwards.
    pub async fn place_order(&self, user_id: &str, req: &PlaceOrderRequest) -> ServiceResult<Order> {
        // ---- Cart -----------------------------------------------------------
        let cart = self.db.carts().get_or_create(user_id).await?;
        let lines = self.db.carts().lines_with_prices(&cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::invalid_input("cart is empty"));
        }

        let subtotal: Money = lines.iter().map(|line| line.line_total()).sum();

        // ---- Addresses ------------------------------------------------------
        self.db
            .addresses()
            .get_for_user(&req.shipping_address_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Address", &req.shipping_address_id))?;
        self.db
            .addresses()
            .get_for_user(&req.billing_address_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Address", &req.billing_address_id))?;

        // ---- Coupon ---------------------------------------------------------
        let now = Utc::now();
        let mut discount = Money::zero();
        let mut redeemed_coupon = None;

        if let Some(code) = req.coupon_code.as_deref() {
            validation::validate_coupon_code(code)
                .map_err(|e| ServiceError::invalid_input(e.to_string()))?;

            let coupon = self
                .db
                .coupons()
                .get_by_code(code.trim())
                .await?
                .ok_or_else(|| {
                    ServiceError::invalid_input(format!("coupon '{code}' does not exist"))
                })?;

            if !coupon.is_valid(now) {
                return Err(ServiceError::invalid_input(format!(
                    "coupon '{}' is inactive, expired or exhausted",
                    coupon.code
                )));
            }

            discount = coupon.calculate_discount(subtotal, now);
            if discount.is_zero() {
                return Err(ServiceError::invalid_input(format!(
                    "coupon '{}' requires a minimum order of {}",
                    coupon.code,
                    Money::from_minor(coupon.minimum_amount_minor)
                )));
            }

            // Conditional increment; a concurrent checkout taking the
            // last use makes this return false.
            if !self.db.coupons().redeem(&coupon.id).await? {
                return Err(ServiceError::invalid_input(format!(
                    "coupon '{}' has no uses left",
                    coupon.code
                )));
            }
            redeemed_coupon = Some(coupon);
        }

        // ---- Order snapshot -------------------------------------------------
        let totals = OrderTotals::compute(
            subtotal,
            Money::from_minor(req.tax_minor),
            Money::from_minor(req.shipping_minor),
            discount,
        );

        let order_id = Uuid::new_v4().to_string();
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| {
                OrderItem::snapshot(
                    &order_id,
                    &line.product_id,
                    line.unit_price(),
                    line.quantity,
                    now,
                )
            })
            .collect();

        let mut order = Order {
            id: order_id,
            order_number: generate_order_number(),
            user_id: user_id.to_string(),
            status: OrderStatus::Pending,
            shipping_address_id: req.shipping_address_id.clone(),
            billing_address_id: req.billing_address_id.clone(),
            subtotal_minor: totals.subtotal.minor(),
            tax_minor: totals.tax.minor(),
            shipping_minor: totals.shipping.minor(),
            discount_minor: totals.discount.minor(),
            total_minor: totals.total.minor(),
            currency: DEFAULT_CURRENCY.to_string(),
            notes: req.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let created = self.db.orders().create_with_items(&order, &items).await;
        let order_number = match created {
            Ok(number) => number,
            Err(e) => {
                // Give the coupon use back; the order never existed.
                if let Some(coupon) = &redeemed_coupon {
                    if let Err(release_err) = self.db.coupons().release(&coupon.id).await {
                        warn!(
                            coupon = %coupon.code,
                            error = %release_err,
                            "Failed to release coupon after aborted checkout"
                        );
                    }
                }
                return Err(e.into());
            }
        };
        order.order_number = order_number;

        // ---- Cart teardown --------------------------------------------------
        // The order is committed at this point; a failed clear must not
        // surface as a checkout error, or a retry would place it twice.
        self.clear_cart_best_effort(&cart.id).await;

        info!(
            user_id = %user_id,
            order_number = %order.order_number,
            total_minor = order.total_minor,
            "Order placed"
        );
        Ok(order)
    }

    /// Clears the cart, logging instead of propagating any failure.
    ///
    /// The stale cart self-heals on the next mutation; the committed
    /// order must still be returned to the caller.
    async fn clear_cart_best_effort(&self, cart_id: &str) {
        if let Err(e) = self.db.carts().clear(cart_id).await {
            warn!(
                cart_id = %cart_id,
                error = %e,
                "Failed to clear cart after order creation"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
