//! # Cart Repository
//!
//! Persistent per-user cart: one `carts` row per user, one `cart_items`
//! row per (cart, product) line.
//!
//! ## Atomic Increments
//! The naive add-to-cart is read-increment-write, and two concurrent
//! requests can lose one of the increments. Here the merge is a single
//! SQL upsert, so the database applies both:
//!
//! ```text
//! INSERT INTO cart_items .. ON CONFLICT(cart_id, product_id)
//! DO UPDATE SET quantity = quantity + excluded.quantity
//! ```
//!
//! Totals always read the *live* product price via a join - the cart
//! never snapshots prices, checkout does.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use storefront_core::{CartLine, CartTotals};

// =============================================================================
// Row Types
// =============================================================================

/// A `carts` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartRecord {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A `cart_items` row, as stored (no live price).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRecord {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets the user's cart, creating it on first use.
    ///
    /// Two concurrent first requests can both attempt the insert; the
    /// loser of that race hits the UNIQUE(user_id) constraint and
    /// re-reads the winner's row.
    pub async fn get_or_create(&self, user_id: &str) -> DbResult<CartRecord> {
        if let Some(cart) = self.get_by_user(user_id).await? {
            return Ok(cart);
        }

        let now = Utc::now();
        let cart = CartRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query(
            "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                debug!(cart_id = %cart.id, user_id = %user_id, "Created cart");
                Ok(cart)
            }
            Err(e) => {
                let db_err = DbError::from(e);
                if db_err.is_unique_violation_on("user_id") {
                    // Lost the creation race; the row exists now.
                    self.get_by_user(user_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Cart", user_id))
                } else {
                    Err(db_err)
                }
            }
        }
    }

    /// Gets a cart by owning user, if one exists.
    pub async fn get_by_user(&self, user_id: &str) -> DbResult<Option<CartRecord>> {
        let cart = sqlx::query_as::<_, CartRecord>(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Adds a quantity of a product to the cart.
    ///
    /// Atomic upsert: if the line exists its quantity grows by
    /// `quantity`, otherwise a fresh line is created. `quantity` must be
    /// positive (the schema CHECK rejects anything else).
    pub async fn add_item(&self, cart_id: &str, product_id: &str, quantity: i64) -> DbResult<()> {
        debug!(cart_id = %cart_id, product_id = %product_id, quantity, "Adding cart item");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(cart_id, product_id)
            DO UPDATE SET quantity = quantity + excluded.quantity,
                          updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets the quantity of a cart line.
    ///
    /// Zero or below deletes the line - a line is never stored at zero.
    /// The line must belong to `cart_id`; a foreign item id is NotFound.
    pub async fn update_item(&self, cart_id: &str, item_id: &str, quantity: i64) -> DbResult<()> {
        if quantity <= 0 {
            return self.remove_item(cart_id, item_id).await;
        }

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE cart_items SET quantity = ?3, updated_at = ?4 WHERE id = ?2 AND cart_id = ?1",
        )
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", item_id));
        }
        Ok(())
    }

    /// Deletes a cart line.
    pub async fn remove_item(&self, cart_id: &str, item_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?2 AND cart_id = ?1")
            .bind(cart_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", item_id));
        }
        Ok(())
    }

    /// Deletes all lines in the cart.
    pub async fn clear(&self, cart_id: &str) -> DbResult<()> {
        debug!(cart_id = %cart_id, "Clearing cart");

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Gets the raw stored lines (no prices).
    pub async fn items(&self, cart_id: &str) -> DbResult<Vec<CartItemRecord>> {
        let items = sqlx::query_as::<_, CartItemRecord>(
            r#"
            SELECT id, cart_id, product_id, quantity, created_at, updated_at
            FROM cart_items
            WHERE cart_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the cart lines with the current catalog price joined in.
    ///
    /// This is the read the totals and the checkout snapshot both use;
    /// prices are whatever the catalog says *now*.
    pub async fn lines_with_prices(&self, cart_id: &str) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT ci.product_id AS product_id,
                   p.price_minor AS unit_price_minor,
                   ci.quantity AS quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = ?1
            ORDER BY ci.created_at
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Computes the running totals: Σ quantity and Σ (live price × quantity).
    pub async fn totals(&self, cart_id: &str) -> DbResult<CartTotals> {
        let (count, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(ci.quantity), 0),
                   COALESCE(SUM(ci.quantity * p.price_minor), 0)
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = ?1
            "#,
        )
        .bind(cart_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CartTotals {
            cart_total_minor: total,
            cart_items_count: count,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use storefront_core::Product;

    async fn seeded_db() -> (Database, Product, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        let make = |name: &str, price: i64| Product {
            id: Uuid::new_v4().to_string(),
            sku: format!("SKU-{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            description: None,
            price_minor: price,
            stock: 10,
            track_stock: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let a = make("Alpha", 10000);
        let b = make("Beta", 2550);
        db.products().insert(&a).await.unwrap();
        db.products().insert(&b).await.unwrap();
        (db, a, b)
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let (db, _, _) = seeded_db().await;
        let repo = db.carts();

        let first = repo.get_or_create("u1").await.unwrap();
        let second = repo.get_or_create("u1").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_add_accumulates_into_one_line() {
        let (db, a, _) = seeded_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("u1").await.unwrap();

        repo.add_item(&cart.id, &a.id, 2).await.unwrap();
        repo.add_item(&cart.id, &a.id, 3).await.unwrap();

        let items = repo.items(&cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_totals_use_live_prices() {
        let (db, a, b) = seeded_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("u1").await.unwrap();

        repo.add_item(&cart.id, &a.id, 2).await.unwrap(); // 2 × 100.00
        repo.add_item(&cart.id, &b.id, 1).await.unwrap(); // 1 × 25.50

        let totals = repo.totals(&cart.id).await.unwrap();
        assert_eq!(totals.cart_items_count, 3);
        assert_eq!(totals.cart_total_minor, 22550);

        // Reprice Alpha; the cart reprices with it.
        db.products().update_price(&a.id, 5000).await.unwrap();
        let totals = repo.totals(&cart.id).await.unwrap();
        assert_eq!(totals.cart_total_minor, 2 * 5000 + 2550);
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let (db, a, _) = seeded_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("u1").await.unwrap();

        repo.add_item(&cart.id, &a.id, 2).await.unwrap();
        let item_id = repo.items(&cart.id).await.unwrap()[0].id.clone();

        repo.update_item(&cart.id, &item_id, 0).await.unwrap();
        assert!(repo.items(&cart.id).await.unwrap().is_empty());

        // Re-adding creates a fresh line at the new quantity.
        repo.add_item(&cart.id, &a.id, 4).await.unwrap();
        assert_eq!(repo.items(&cart.id).await.unwrap()[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_update_rejects_foreign_cart_item() {
        let (db, a, _) = seeded_db().await;
        let repo = db.carts();
        let mine = repo.get_or_create("u1").await.unwrap();
        let theirs = repo.get_or_create("u2").await.unwrap();

        repo.add_item(&theirs.id, &a.id, 1).await.unwrap();
        let foreign_item = repo.items(&theirs.id).await.unwrap()[0].id.clone();

        let err = repo.update_item(&mine.id, &foreign_item, 5).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        // And the other user's line is untouched.
        assert_eq!(repo.items(&theirs.id).await.unwrap()[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let (db, a, b) = seeded_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("u1").await.unwrap();

        repo.add_item(&cart.id, &a.id, 1).await.unwrap();
        repo.add_item(&cart.id, &b.id, 1).await.unwrap();
        repo.clear(&cart.id).await.unwrap();

        let totals = repo.totals(&cart.id).await.unwrap();
        assert_eq!(totals.cart_items_count, 0);
        assert_eq!(totals.cart_total_minor, 0);
    }

    #[tokio::test]
    async fn test_lines_with_prices() {
        let (db, a, _) = seeded_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("u1").await.unwrap();

        repo.add_item(&cart.id, &a.id, 2).await.unwrap();
        let lines = repo.lines_with_prices(&cart.id).await.unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_price_minor, 10000);
        assert_eq!(lines[0].line_total().minor(), 20000);
    }
}
