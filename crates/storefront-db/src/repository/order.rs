//! # Order Repository
//!
//! Order persistence: transactional creation with the item snapshot,
//! guarded status transitions, and history queries.
//!
//! ## Guarded Transitions
//! Status changes are single conditional UPDATEs whose WHERE clause
//! names the states the change is legal from. Two concurrent cancels
//! (or a cancel racing a confirm) resolve at the database: exactly one
//! wins the row, the other sees zero rows affected.
//!
//! ## Order Number Collisions
//! `ORD-` + 8 hex characters is a small space. Creation retries with a
//! fresh number on a unique violation instead of assuming luck.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use storefront_core::{generate_order_number, Order, OrderItem, OrderStatus};

/// How many fresh order numbers to try before giving up.
const ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Inserts an order together with its frozen items in one transaction.
    ///
    /// The caller's `order.order_number` is used for the first attempt;
    /// on a unique violation a fresh number is generated and the whole
    /// transaction retried. Returns the order number that stuck.
    pub async fn create_with_items(&self, order: &Order, items: &[OrderItem]) -> DbResult<String> {
        let mut order_number = order.order_number.clone();

        for attempt in 0..ORDER_NUMBER_ATTEMPTS {
            match self.try_insert(order, &order_number, items).await {
                Ok(()) => {
                    debug!(order_id = %order.id, %order_number, "Created order");
                    return Ok(order_number);
                }
                Err(e) if e.is_unique_violation_on("order_number") => {
                    warn!(%order_number, attempt, "Order number collision, retrying");
                    order_number = generate_order_number();
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::Internal(format!(
            "could not allocate a unique order number after {ORDER_NUMBER_ATTEMPTS} attempts"
        )))
    }

    async fn try_insert(
        &self,
        order: &Order,
        order_number: &str,
        items: &[OrderItem],
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, status,
                                shipping_address_id, billing_address_id,
                                subtotal_minor, tax_minor, shipping_minor,
                                discount_minor, total_minor, currency, notes,
                                created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&order.id)
        .bind(order_number)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(&order.shipping_address_id)
        .bind(&order.billing_address_id)
        .bind(order.subtotal_minor)
        .bind(order.tax_minor)
        .bind(order.shipping_minor)
        .bind(order.discount_minor)
        .bind(order.total_minor)
        .bind(&order.currency)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity,
                                         price_minor, total_minor, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.price_minor)
            .bind(item.total_minor)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Gets an order by id, scoped to its owner.
    pub async fn get_for_user(&self, id: &str, user_id: &str) -> DbResult<Option<Order>> {
        let order =
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1 AND user_id = ?2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(order)
    }

    /// Looks an order up by its business identifier.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = ?1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str, limit: i64) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Frozen items of an order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    // =========================================================================
    // Status Transitions
    // =========================================================================

    /// Compare-and-swap a status transition.
    ///
    /// Applies only if the row is still in `from`; returns whether it
    /// was. The caller validates `from -> to` legality through
    /// [`OrderStatus::can_transition_to`] before getting here.
    pub async fn transition_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() > 0;
        debug!(order_id = %id, ?from, ?to, applied, "Order status transition");
        Ok(applied)
    }

    /// Cancels an order if it is still pending or confirmed.
    ///
    /// Single guarded update, so a cancel racing a fulfilment step
    /// cannot cancel an order that already moved on. Returns whether
    /// the cancel was applied.
    pub async fn cancel(&self, id: &str, user_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'cancelled', updated_at = ?3
            WHERE id = ?1 AND user_id = ?2 AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Moves an order to refunded, legal from any non-refunded status.
    pub async fn mark_refunded(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'refunded', updated_at = ?2
            WHERE id = ?1 AND status != 'refunded'
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Totals
    // =========================================================================

    /// Recomputes the monetary snapshot from the stored items.
    ///
    /// `subtotal` becomes the sum of item totals; `total` follows
    /// `subtotal + tax + shipping - discount`. Explicit, never implicit:
    /// editing items does not touch the snapshot until this is called.
    pub async fn recalculate_totals(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                subtotal_minor = (SELECT COALESCE(SUM(total_minor), 0)
                                  FROM order_items WHERE order_id = ?1),
                total_minor = (SELECT COALESCE(SUM(total_minor), 0)
                               FROM order_items WHERE order_id = ?1)
                              + tax_minor + shipping_minor - discount_minor,
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
