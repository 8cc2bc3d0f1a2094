//! Lustre Core - Shared domain types and pure storefront logic.
//!
//! This crate provides the types and rules used by the storefront client:
//! - `storefront` - API client, cart/address stores, checkout orchestration
//! - `cli` - Command-line driver for the storefront client
//!
//! # Architecture
//!
//! The core crate contains only types, traits and pure functions - no I/O,
//! no HTTP clients, no clocks. Everything here can be re-run freely, which is
//! what lets the client recompute pricing and coupon discounts on every
//! cart change.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices and quantities
//! - [`catalog`] - Catalog product snapshots and lookup
//! - [`cart`] - Line items, enrichment, cart count and pricing summary
//! - [`coupon`] - Coupon records and the discount evaluator
//! - [`address`] - Shipping addresses, drafts and ownership filtering
//! - [`checkout`] - Checkout state machine and payment handshake types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupon;
pub mod types;

pub use types::*;
