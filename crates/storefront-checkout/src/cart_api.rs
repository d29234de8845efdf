//! # Cart API
//!
//! The cart mutation surface: request DTOs and the service that applies
//! them. Every mutation returns the fresh running totals so a client can
//! update its cart badge from the response alone.
//!
//! Validation happens here (quantity caps, product existence, stock),
//! then the repository applies the change atomically. Totals are always
//! computed from live catalog prices; nothing in the cart is a price
//! snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use storefront_core::{validation, CartTotals, CoreError, MAX_LINE_QUANTITY};
use storefront_db::Database;

use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Request / Response DTOs
// =============================================================================

/// Add a quantity of a product to the caller's cart.
#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Set the quantity of an existing cart line. Zero or below removes it.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemRequest {
    pub cart_item_id: String,
    pub quantity: i64,
}

/// Remove a cart line.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveItemRequest {
    pub cart_item_id: String,
}

/// The totals returned after every cart mutation.
#[derive(Debug, Clone, Serialize)]
pub struct CartResponse {
    pub cart_id: String,
    pub cart_total_minor: i64,
    pub cart_items_count: i64,
}

impl CartResponse {
    fn new(cart_id: String, totals: CartTotals) -> Self {
        CartResponse {
            cart_id,
            cart_total_minor: totals.cart_total_minor,
            cart_items_count: totals.cart_items_count,
        }
    }
}

// =============================================================================
// Cart Service
// =============================================================================

/// Applies cart mutations for a user.
#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
}

impl CartService {
    pub fn new(db: Database) -> Self {
        CartService { db }
    }

    /// Adds a product to the user's cart, merging into an existing line.
    ///
    /// Rejects non-positive quantities, quantities above the per-line
    /// cap, unknown or inactive products, and requests beyond available
    /// stock for tracked products.
    pub async fn add_item(&self, user_id: &str, req: &AddItemRequest) -> ServiceResult<CartResponse> {
        validation::validate_add_quantity(req.quantity)
            .map_err(|e| ServiceError::invalid_input(e.to_string()))?;

        let product = self
            .db
            .products()
            .get_active_by_id(&req.product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", &req.product_id))?;

        let cart = self.db.carts().get_or_create(user_id).await?;

        // Stock check covers the merged quantity, not just the delta.
        let current: i64 = self
            .db
            .carts()
            .items(&cart.id)
            .await?
            .iter()
            .filter(|line| line.product_id == req.product_id)
            .map(|line| line.quantity)
            .sum();

        let merged = current + req.quantity;
        if merged > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: merged,
                max: MAX_LINE_QUANTITY,
            }
            .into());
        }
        if !product.can_sell(merged) {
            return Err(CoreError::InsufficientStock {
                product_id: product.id.clone(),
                available: product.stock,
                requested: merged,
            }
            .into());
        }

        self.db
            .carts()
            .add_item(&cart.id, &req.product_id, req.quantity)
            .await?;

        debug!(user_id = %user_id, product_id = %req.product_id, quantity = req.quantity, "Cart add");
        let totals = self.db.carts().totals(&cart.id).await?;
        Ok(CartResponse::new(cart.id, totals))
    }

    /// Sets the quantity of an existing line; zero or below removes it.
    pub async fn update_item(
        &self,
        user_id: &str,
        req: &UpdateItemRequest,
    ) -> ServiceResult<CartResponse> {
        let cart = self.db.carts().get_or_create(user_id).await?;

        if req.quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: req.quantity,
                max: MAX_LINE_QUANTITY,
            }
            .into());
        }

        self.db
            .carts()
            .update_item(&cart.id, &req.cart_item_id, req.quantity)
            .await?;

        let totals = self.db.carts().totals(&cart.id).await?;
        Ok(CartResponse::new(cart.id, totals))
    }

    /// Removes a line from the cart.
    pub async fn remove_item(
        &self,
        user_id: &str,
        req: &RemoveItemRequest,
    ) -> ServiceResult<CartResponse> {
        let cart = self.db.carts().get_or_create(user_id).await?;

        // Removing an already-absent line is fine; the cart ends up in
        // the requested state either way.
        match self.db.carts().remove_item(&cart.id, &req.cart_item_id).await {
            Ok(()) => {}
            Err(storefront_db::DbError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let totals = self.db.carts().totals(&cart.id).await?;
        Ok(CartResponse::new(cart.id, totals))
    }

    /// Empties the cart.
    pub async fn clear(&self, user_id: &str) -> ServiceResult<CartResponse> {
        let cart = self.db.carts().get_or_create(user_id).await?;
        self.db.carts().clear(&cart.id).await?;
        let totals = self.db.carts().totals(&cart.id).await?;
        Ok(CartResponse::new(cart.id, totals))
    }

    /// The current totals, without mutating anything.
    pub async fn totals(&self, user_id: &str) -> ServiceResult<CartResponse> {
        let cart = self.db.carts().get_or_create(user_id).await?;
        let totals = self.db.carts().totals(&cart.id).await?;
        Ok(CartResponse::new(cart.id, totals))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
