//! Krushi Sarthi Core - cart, pricing and order types.
//!
//! This crate provides the domain model shared by the storefront client library
//! and the command-line tools:
//! - `storefront` - Client library (remote profile store, shipping, checkout)
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clocks. Everything here is deterministic and can be tested
//! without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, phone numbers, pincodes and statuses
//! - [`catalog`] - Product and variant snapshots
//! - [`weight`] - Variant label to parcel weight parsing
//! - [`cart`] - The cart ledger and its derived totals
//! - [`address`] - Delivery address record and completeness rules
//! - [`shipping`] - Shipping quotes and their request fingerprints
//! - [`pricing`] - Checkout totals and the free-shipping rule
//! - [`order`] - Immutable order drafts and order id generation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod pricing;
pub mod shipping;
pub mod types;
pub mod weight;

pub use address::{Address, AddressError, PostalDetails};
pub use cart::{CartKey, CartLedger, CartLine};
pub use catalog::{CatalogError, Product, Variant};
pub use order::{OrderDraft, OrderError, OrderIdGenerator};
pub use pricing::CheckoutTotals;
pub use shipping::{QuoteFingerprint, ShippingQuote};
pub use types::*;
pub use weight::parse_weight_to_grams;
