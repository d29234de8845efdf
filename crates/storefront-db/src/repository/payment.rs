//! # Payment Repository
//!
//! Payments, refunds and saved payment instruments.
//!
//! ## Idempotent Completion
//! The gateway retries webhook deliveries, so completing a payment by
//! transaction id is a guarded UPDATE that excludes already-completed
//! rows. A redelivered event matches zero rows and reports
//! [`CompletionOutcome::AlreadyCompleted`] instead of double-applying.
//!
//! ## Refund Cap
//! "Live refunds must not exceed the payment amount" is enforced by a
//! single conditional INSERT that re-checks the cap against the current
//! rows. Two concurrent refund requests cannot both sneak under it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{
    Payment, PaymentStatus, Refund, RefundStatus, SavedPaymentMethod,
};

/// What a completion-by-transaction attempt found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The payment moved to completed.
    Applied,
    /// A payment with this transaction id exists but was already
    /// completed - a redelivered event, safely ignored.
    AlreadyCompleted,
    /// A payment with this transaction id exists but its lifecycle
    /// already ended (failed, cancelled or refunded); completion does
    /// not apply.
    TerminalState(PaymentStatus),
    /// No payment carries this transaction id.
    NoMatch,
}

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    // =========================================================================
    // Payments
    // =========================================================================

    pub async fn insert(&self, payment: &Payment) -> DbResult<()> {
        debug!(payment_id = %payment.id, order_id = %payment.order_id, "Inserting payment");

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, method, status, amount_minor,
                                  currency, transaction_id, gateway_response,
                                  created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.status)
        .bind(payment.amount_minor)
        .bind(&payment.currency)
        .bind(&payment.transaction_id)
        .bind(&payment.gateway_response)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    /// Finds the payment carrying a gateway transaction id.
    pub async fn get_by_transaction(&self, transaction_id: &str) -> DbResult<Option<Payment>> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE transaction_id = ?1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payment)
    }

    /// Payment attempts against an order, newest first.
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE order_id = ?1 ORDER BY created_at DESC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// Attaches the gateway transaction id once the intent is created.
    pub async fn set_transaction_id(&self, id: &str, transaction_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE payments SET transaction_id = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(transaction_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", id));
        }
        Ok(())
    }

    /// Completes the payment matching a gateway transaction id.
    ///
    /// Guarded against redelivery: only pending or processing rows are
    /// touched. The stored gateway response is replaced with the event
    /// payload on the winning application.
    pub async fn complete_by_transaction(
        &self,
        transaction_id: &str,
        gateway_response: Option<&str>,
    ) -> DbResult<CompletionOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'completed', gateway_response = ?2, updated_at = ?3
            WHERE transaction_id = ?1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(transaction_id)
        .bind(gateway_response)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(%transaction_id, "Payment completed");
            return Ok(CompletionOutcome::Applied);
        }

        match self.get_by_transaction(transaction_id).await? {
            Some(p) if p.status == PaymentStatus::Completed => {
                Ok(CompletionOutcome::AlreadyCompleted)
            }
            Some(p) => Ok(CompletionOutcome::TerminalState(p.status)),
            None => Ok(CompletionOutcome::NoMatch),
        }
    }

    /// Compare-and-swap a payment status transition.
    ///
    /// Legality of `from -> to` is the caller's job via
    /// [`PaymentStatus::can_transition_to`]; this only closes the race.
    pub async fn transition_status(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Refunds
    // =========================================================================

    /// Inserts a refund if the cap still holds.
    ///
    /// The INSERT carries the whole check: the payment must be completed
    /// (or already partially refunded), and the new amount plus the live
    /// refunds (not failed, not cancelled) must fit within the payment.
    /// Returns whether the refund was recorded.
    pub async fn create_refund(&self, refund: &Refund) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO refunds (id, payment_id, amount_minor, reason, status,
                                 transaction_id, gateway_response, created_at, updated_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
            WHERE EXISTS (
                SELECT 1 FROM payments p
                WHERE p.id = ?2
                  AND p.status IN ('completed', 'refunded')
                  AND p.amount_minor >= ?3 + (
                      SELECT COALESCE(SUM(r.amount_minor), 0)
                      FROM refunds r
                      WHERE r.payment_id = ?2
                        AND r.status NOT IN ('failed', 'cancelled'))
            )
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.payment_id)
        .bind(refund.amount_minor)
        .bind(&refund.reason)
        .bind(refund.status)
        .bind(&refund.transaction_id)
        .bind(&refund.gateway_response)
        .bind(refund.created_at)
        .bind(refund.updated_at)
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() > 0;
        debug!(refund_id = %refund.id, payment_id = %refund.payment_id, applied, "Refund recorded");
        Ok(applied)
    }

    /// Refunds recorded against a payment, oldest first.
    pub async fn refunds_for_payment(&self, payment_id: &str) -> DbResult<Vec<Refund>> {
        let refunds = sqlx::query_as::<_, Refund>(
            "SELECT * FROM refunds WHERE payment_id = ?1 ORDER BY created_at",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(refunds)
    }

    /// Compare-and-swap a refund status transition.
    pub async fn transition_refund_status(
        &self,
        id: &str,
        from: RefundStatus,
        to: RefundStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE refunds SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a completed payment as refunded once its money is gone.
    pub async fn mark_refunded(&self, payment_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'refunded', updated_at = ?2
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(payment_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Saved Payment Instruments
    // =========================================================================

    /// Saves an instrument; when default, unsets the user's other
    /// defaults in the same transaction.
    pub async fn insert_method(&self, method: &SavedPaymentMethod) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        if method.is_default {
            sqlx::query("UPDATE payment_methods SET is_default = 0 WHERE user_id = ?1 AND id != ?2")
                .bind(&method.user_id)
                .bind(&method.id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO payment_methods (id, user_id, kind, is_default,
                                         gateway_method_id, gateway_customer_id,
                                         metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&method.id)
        .bind(&method.user_id)
        .bind(method.kind)
        .bind(method.is_default)
        .bind(&method.gateway_method_id)
        .bind(&method.gateway_customer_id)
        .bind(&method.metadata)
        .bind(method.created_at)
        .bind(method.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_methods(&self, user_id: &str) -> DbResult<Vec<SavedPaymentMethod>> {
        let methods = sqlx::query_as::<_, SavedPaymentMethod>(
            r#"
            SELECT * FROM payment_methods
            WHERE user_id = ?1
            ORDER BY is_default DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(methods)
    }

    /// Makes an instrument the user's default, atomically exclusive.
    pub async fn set_default_method(&self, id: &str, user_id: &str) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE payment_methods SET is_default = 0 WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE payment_methods SET is_default = 1, updated_at = ?3 WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentMethod", id));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_method(&self, id: &str, user_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentMethod", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
