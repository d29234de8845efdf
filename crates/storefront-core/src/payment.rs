//! # Payment Module
//!
//! Payment and refund records with their status lifecycles.
//!
//! ## Payment Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Payment Status Machine                             │
//! │                                                                         │
//! │  pending ──► processing ──► completed                                  │
//! │     │            │      └──► failed                                    │
//! │     │            └──────────► cancelled                                │
//! │     └───────────────────────► failed | cancelled                       │
//! │                                                                         │
//! │  completed ──► refunded   (via one or more Refund records)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions into `completed` are driven by the gateway webhook, keyed
//! by `transaction_id`. An order may carry multiple payment attempts;
//! refunds have their own lifecycle, independent of the payment's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;
use crate::types::PaymentMethodKind;

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl PaymentStatus {
    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Pending, Completed) | (Processing, Completed) => true,
            (Pending, Failed) | (Processing, Failed) => true,
            (Pending, Cancelled) | (Processing, Cancelled) => true,
            // Only completed money can be given back.
            (Completed, Refunded) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment attempt against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethodKind,
    pub status: PaymentStatus,
    pub amount_minor: i64,
    pub currency: String,
    /// Transaction id from the payment provider. Webhook events are
    /// matched against this value.
    pub transaction_id: Option<String>,
    /// Opaque gateway response payload, stored as JSON text.
    pub gateway_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }

    /// Attempts a status transition, rejecting illegal ones.
    pub fn transition_to(&mut self, next: PaymentStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidPaymentStatus {
                payment_id: self.id.clone(),
                current: self.status,
                requested: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Checks whether a new refund of `amount` fits within the payment.
    ///
    /// The sum of refunds that are still alive (not failed or cancelled)
    /// plus the new amount must not exceed the payment amount.
    pub fn refundable(&self, existing: &[Refund], amount: Money) -> Result<(), CoreError> {
        if self.status != PaymentStatus::Completed && self.status != PaymentStatus::Refunded {
            return Err(CoreError::InvalidPaymentStatus {
                payment_id: self.id.clone(),
                current: self.status,
                requested: PaymentStatus::Refunded,
            });
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidRefundAmount {
                payment_id: self.id.clone(),
                reason: "refund amount must be positive".to_string(),
            });
        }

        let already: Money = existing
            .iter()
            .filter(|r| r.status.counts_against_payment())
            .map(|r| Money::from_minor(r.amount_minor))
            .sum();

        if already + amount > self.amount() {
            return Err(CoreError::InvalidRefundAmount {
                payment_id: self.id.clone(),
                reason: format!(
                    "refunds would total {} against a payment of {}",
                    already + amount,
                    self.amount()
                ),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Refund Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl Default for RefundStatus {
    fn default() -> Self {
        RefundStatus::Pending
    }
}

impl RefundStatus {
    /// Whether a refund in this status reserves part of the payment.
    /// Failed and cancelled refunds free their amount up again.
    pub fn counts_against_payment(&self) -> bool {
        !matches!(self, RefundStatus::Failed | RefundStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        use RefundStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Pending, Completed) | (Processing, Completed) => true,
            (Pending, Failed) | (Processing, Failed) => true,
            (Pending, Cancelled) | (Processing, Cancelled) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Refund
// =============================================================================

/// A refund against a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub amount_minor: i64,
    pub reason: String,
    pub status: RefundStatus,
    pub transaction_id: Option<String>,
    pub gateway_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }

    pub fn transition_to(&mut self, next: RefundStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidRefundStatus {
                refund_id: self.id.clone(),
                current: self.status,
            });
        }
        self.status = next;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(status: PaymentStatus, amount: i64) -> Payment {
        let now = Utc::now();
        Payment {
            id: "pay1".to_string(),
            order_id: "o1".to_string(),
            method: PaymentMethodKind::Stripe,
            status,
            amount_minor: amount,
            currency: crate::DEFAULT_CURRENCY.to_string(),
            transaction_id: Some("pi_123".to_string()),
            gateway_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn refund(status: RefundStatus, amount: i64) -> Refund {
        let now = Utc::now();
        Refund {
            id: "r1".to_string(),
            payment_id: "pay1".to_string(),
            amount_minor: amount,
            reason: "damaged goods".to_string(),
            status,
            transaction_id: None,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_payment_happy_path() {
        let mut p = payment(PaymentStatus::Pending, 10000);
        p.transition_to(PaymentStatus::Processing).unwrap();
        p.transition_to(PaymentStatus::Completed).unwrap();
        p.transition_to(PaymentStatus::Refunded).unwrap();
    }

    #[test]
    fn test_payment_illegal_transitions() {
        let mut p = payment(PaymentStatus::Completed, 10000);
        assert!(p.transition_to(PaymentStatus::Pending).is_err());
        assert!(p.transition_to(PaymentStatus::Failed).is_err());
        assert_eq!(p.status, PaymentStatus::Completed);

        let mut failed = payment(PaymentStatus::Failed, 10000);
        assert!(failed.transition_to(PaymentStatus::Refunded).is_err());
    }

    #[test]
    fn test_refund_only_from_completed() {
        let p = payment(PaymentStatus::Pending, 10000);
        assert!(p.refundable(&[], Money::from_minor(100)).is_err());

        let p = payment(PaymentStatus::Completed, 10000);
        assert!(p.refundable(&[], Money::from_minor(100)).is_ok());
    }

    #[test]
    fn test_refund_sum_capped_at_payment_amount() {
        let p = payment(PaymentStatus::Completed, 10000);
        let existing = vec![refund(RefundStatus::Completed, 6000)];

        assert!(p.refundable(&existing, Money::from_minor(4000)).is_ok());
        assert!(p.refundable(&existing, Money::from_minor(4001)).is_err());
    }

    #[test]
    fn test_failed_refunds_free_their_amount() {
        let p = payment(PaymentStatus::Completed, 10000);
        let existing = vec![
            refund(RefundStatus::Failed, 6000),
            refund(RefundStatus::Cancelled, 6000),
        ];
        // Neither counts, so the full amount is still refundable.
        assert!(p.refundable(&existing, Money::from_minor(10000)).is_ok());
    }

    #[test]
    fn test_refund_amount_must_be_positive() {
        let p = payment(PaymentStatus::Completed, 10000);
        assert!(p.refundable(&[], Money::zero()).is_err());
        assert!(p.refundable(&[], Money::from_minor(-100)).is_err());
    }

    #[test]
    fn test_refund_lifecycle() {
        let mut r = refund(RefundStatus::Pending, 500);
        r.transition_to(RefundStatus::Processing).unwrap();
        r.transition_to(RefundStatus::Completed).unwrap();
        assert!(r.transition_to(RefundStatus::Cancelled).is_err());
    }
}
