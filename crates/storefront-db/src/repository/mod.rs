//! # Repository Module
//!
//! One repository per aggregate, each a thin handle over the shared
//! pool. SQL lives here and nowhere else.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - catalog read-model and substring search
//! - [`cart::CartRepository`] - per-user cart lines with atomic increments
//! - [`coupon::CouponRepository`] - coupon lookup and conditional redemption
//! - [`address::AddressRepository`] - addresses with exclusive default flags
//! - [`order::OrderRepository`] - order snapshots and guarded status moves
//! - [`payment::PaymentRepository`] - payments, refunds, saved instruments

pub mod address;
pub mod cart;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod product;
