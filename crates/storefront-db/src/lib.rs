//! # storefront-db: Database Layer for the Storefront
//!
//! SQLite persistence for carts, coupons, addresses, orders and
//! payments, using sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Storefront Data Flow                              │
//! │                                                                         │
//! │  storefront-checkout (place_order, webhook, cart API)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   storefront-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ cart, coupon, │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │    │ order, payment│    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                      SQLite Database (WAL)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Contract
//! The known races (cart double-increment, coupon over-redemption,
//! two simultaneous defaults) are all closed at this layer:
//! - cart adds are a single SQL upsert (`ON CONFLICT .. DO UPDATE`)
//! - coupon redemption is a single conditional increment
//! - default-flag flips happen inside one transaction
//! - status transitions are guarded UPDATEs (`WHERE status IN (..)`)

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::address::AddressRepository;
pub use repository::cart::CartRepository;
pub use repository::coupon::CouponRepository;
pub use repository::order::OrderRepository;
pub use repository::payment::{CompletionOutcome, PaymentRepository};
pub use repository::product::ProductRepository;
