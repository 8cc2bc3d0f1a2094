//! Lustre storefront client library.
//!
//! Reconciles a customer's cart, coupon, shipping address and checkout with
//! the Lustre REST backend. The backend owns all state; this crate holds
//! observable snapshots of it and drives the payment flow.
//!
//! # Modules
//!
//! - [`api`] - authenticated HTTP client and token session
//! - [`cart`] - remote cart store with the per-product add guard
//! - [`catalog`] - cached product catalog for display enrichment
//! - [`coupons`] - coupon list and the entered code
//! - [`addresses`] - address book and shipping-address selection
//! - [`checkout`] - order, payment and verification orchestrator
//! - [`state`] - all of the above wired to one session

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod addresses;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod error;
pub mod navigation;
pub mod state;

pub use error::StorefrontError;
pub use state::Storefront;
