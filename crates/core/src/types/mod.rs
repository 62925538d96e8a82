//! Core types for Krushi Sarthi.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod localized;
pub mod phone;
pub mod pincode;
pub mod price;
pub mod status;

pub use id::*;
pub use localized::{Locale, LocalizedText};
pub use phone::{PhoneError, PhoneNumber};
pub use pincode::{Pincode, PincodeError};
pub use price::{CurrencyCode, Price};
pub use status::*;
