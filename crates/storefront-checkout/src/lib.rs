//! # storefront-checkout: Orchestration Layer
//!
//! The service tier of the storefront workspace: the cart mutation API,
//! the checkout flow and the payment gateway webhook.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   storefront-checkout (THIS CRATE)                      │
//! │                                                                         │
//! │   ┌──────────────┐   ┌──────────────────┐   ┌────────────────────┐    │
//! │   │  CartService │   │ CheckoutService  │   │   WebhookHandler   │    │
//! │   │  add/update/ │   │   place_order    │   │  verify + apply    │    │
//! │   │ remove/clear │   │ (cart → order)   │   │  gateway events    │    │
//! │   └──────┬───────┘   └────────┬─────────┘   └─────────┬──────────┘    │
//! │          │                    │                       │               │
//! │          ▼                    ▼                       ▼               │
//! │   storefront-core (rules)  +  storefront-db (repositories)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No SQL and no business rules live here; this crate sequences calls
//! into the crates that own them and maps failures into the
//! caller-facing [`ServiceError`] taxonomy.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart_api;
pub mod checkout;
pub mod error;
pub mod telemetry;
pub mod webhook;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart_api::{
    AddItemRequest, CartResponse, CartService, RemoveItemRequest, UpdateItemRequest,
};
pub use checkout::{CheckoutService, PlaceOrderRequest};
pub use error::{ServiceError, ServiceResult};
pub use telemetry::init_tracing;
pub use webhook::{WebhookConfig, WebhookHandler, WebhookOutcome};
