//! Krushi Sarthi storefront client library.
//!
//! Everything the storefront does that touches the outside world lives here:
//! the customer profile store, shipping rates, postal-code lookup, OTP
//! providers and on-device persistence. Views talk to a single
//! [`state::AppState`] and to the flow controllers built on it
//! ([`otp::PhoneVerification`], [`checkout::CheckoutAggregator`]).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod error;
pub mod firestore;
pub mod notice;
pub mod orders;
pub mod otp;
pub mod pincode;
pub mod profile;
pub mod shipping;
pub mod state;
pub mod storage;

pub use checkout::{CheckoutAggregator, CheckoutError, CheckoutPhase};
pub use config::StorefrontConfig;
pub use error::{AppError, Result};
pub use notice::{Notice, NoticeKind};
pub use state::{AppState, Services};
