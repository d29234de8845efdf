//! # Payment Gateway Webhook
//!
//! Inbound webhook handling: signature verification, event parsing and
//! idempotent application against the payment rows.
//!
//! ## Signature Scheme
//! The gateway signs each delivery with a header of the form
//! `t=<unix>,v1=<hex>` where the hex value is
//! `HMAC-SHA256(secret, "{t}.{payload}")`. Replays of captured
//! deliveries are bounded by a timestamp tolerance (default 5 minutes);
//! redeliveries inside the window are harmless because applying an
//! event is idempotent at the database.
//!
//! ## Unmatched Events
//! An event whose transaction id matches no payment is *accepted* (the
//! gateway must not retry it forever) but logged at WARN - a silently
//! dropped payment confirmation is an operational incident waiting to
//! be discovered weeks later.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use storefront_core::PaymentStatus;
use storefront_db::{CompletionOutcome, Database};

use crate::error::{ServiceError, ServiceResult};

type HmacSha256 = Hmac<Sha256>;

/// Event type the gateway sends when a payment settles.
const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

// =============================================================================
// Configuration
// =============================================================================

/// Webhook endpoint configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared signing secret issued by the gateway.
    pub secret: String,

    /// Maximum accepted age (and clock skew) of the signature
    /// timestamp, in seconds. Default: 300.
    pub tolerance_secs: i64,
}

impl WebhookConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        WebhookConfig {
            secret: secret.into(),
            tolerance_secs: 300,
        }
    }

    pub fn tolerance_secs(mut self, secs: i64) -> Self {
        self.tolerance_secs = secs;
        self
    }
}

// =============================================================================
// Event Envelope
// =============================================================================

/// The gateway's event envelope, reduced to the fields this handler
/// reads. Unknown fields are ignored by serde.
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
struct WebhookEventData {
    object: WebhookEventObject,
}

#[derive(Debug, Deserialize)]
struct WebhookEventObject {
    /// The gateway transaction id, matched against
    /// `payments.transaction_id`.
    id: String,
}

// =============================================================================
// Outcome
// =============================================================================

/// What handling a verified, well-formed event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A payment moved to completed.
    PaymentCompleted { transaction_id: String },
    /// Redelivery of an already-applied event; nothing changed.
    AlreadyProcessed { transaction_id: String },
    /// The matching payment's lifecycle already ended (failed,
    /// cancelled or refunded); completion does not apply. Accepted,
    /// logged at WARN.
    PaymentLifecycleEnded {
        transaction_id: String,
        status: PaymentStatus,
    },
    /// No payment carries this transaction id. Accepted, logged at WARN.
    NoMatchingPayment { transaction_id: String },
    /// An event type this handler does not act on.
    Ignored { event_type: String },
}

// =============================================================================
// Handler
// =============================================================================

/// Verifies and applies gateway webhook deliveries.
#[derive(Debug, Clone)]
pub struct WebhookHandler {
    db: Database,
    config: WebhookConfig,
}

impl WebhookHandler {
    pub fn new(db: Database, config: WebhookConfig) -> Self {
        WebhookHandler { db, config }
    }

    /// Handles one delivery: verify the signature, parse the envelope,
    /// apply the event. A bad signature or malformed body touches no
    /// state.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> ServiceResult<WebhookOutcome> {
        self.verify_signature(payload, signature_header, Utc::now().timestamp())?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::MalformedEvent(e.to_string()))?;

        match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => {
                let transaction_id = event.data.object.id;
                let response = String::from_utf8_lossy(payload);
                let outcome = self
                    .db
                    .payments()
                    .complete_by_transaction(&transaction_id, Some(&response))
                    .await?;

                Ok(match outcome {
                    CompletionOutcome::Applied => {
                        info!(%transaction_id, "Payment completed via webhook");
                        WebhookOutcome::PaymentCompleted { transaction_id }
                    }
                    CompletionOutcome::AlreadyCompleted => {
                        debug!(%transaction_id, "Webhook redelivery, payment already completed");
                        WebhookOutcome::AlreadyProcessed { transaction_id }
                    }
                    CompletionOutcome::TerminalState(status) => {
                        warn!(
                            %transaction_id,
                            ?status,
                            "Webhook event for a payment whose lifecycle already ended"
                        );
                        WebhookOutcome::PaymentLifecycleEnded {
                            transaction_id,
                            status,
                        }
                    }
                    CompletionOutcome::NoMatch => {
                        warn!(
                            %transaction_id,
                            "Webhook event matches no payment, accepting without effect"
                        );
                        WebhookOutcome::NoMatchingPayment { transaction_id }
                    }
                })
            }
            other => {
                debug!(event_type = %other, "Ignoring unhandled webhook event type");
                Ok(WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }

    /// Verifies a `t=<unix>,v1=<hex>` signature header against the
    /// payload. Timestamps outside the tolerance window are rejected
    /// even when the MAC itself is correct.
    fn verify_signature(&self, payload: &[u8], header: &str, now: i64) -> ServiceResult<()> {
        let (timestamp, signature) = parse_signature_header(header)?;

        if (now - timestamp).abs() > self.config.tolerance_secs {
            return Err(ServiceError::InvalidSignature(format!(
                "timestamp {timestamp} outside the {}s tolerance",
                self.config.tolerance_secs
            )));
        }

        let expected = hex::decode(signature)
            .map_err(|_| ServiceError::InvalidSignature("v1 is not valid hex".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|e| ServiceError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        // Constant-time comparison via the hmac crate.
        mac.verify_slice(&expected)
            .map_err(|_| ServiceError::InvalidSignature("signature mismatch".to_string()))
    }
}

/// Splits `t=<unix>,v1=<hex>` into its parts. Both must be present.
fn parse_signature_header(header: &str) -> ServiceResult<(i64, &str)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(v1)) => Ok((t, v1)),
        _ => Err(ServiceError::InvalidSignature(
            "header must contain t=<unix> and v1=<hex>".to_string(),
        )),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
