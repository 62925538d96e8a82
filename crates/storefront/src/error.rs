//! Unified error handling with Sentry integration.
//!
//! Every module error converts into [`AppError`], which knows how serious it
//! is and what the customer should be told. Fatal errors are captured to
//! Sentry when reported; internals are never shown to the customer.

use krushi_sarthi_core::{AddressError, CatalogError, PhoneError};
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::firestore::FirestoreError;
use crate::otp::OtpError;
use crate::pincode::PincodeError;
use crate::profile::ProfileError;
use crate::shipping::RateError;
use crate::storage::StorageError;

/// How an error affects the customer's flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Degrades to a fallback value; the flow continues.
    Soft,
    /// The customer must correct something before continuing.
    UserActionable,
    /// The attempted action failed cleanly; prior state is preserved.
    Fatal,
}

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// On-device storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote document store failed.
    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    /// Shipping rate lookup failed.
    #[error("Rate lookup error: {0}")]
    Rate(#[from] RateError),

    /// Pincode lookup failed.
    #[error("Pincode lookup error: {0}")]
    PincodeLookup(#[from] PincodeError),

    /// OTP send or verify failed.
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    /// Saving the profile failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Placing the order failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Address is incomplete or malformed.
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// Phone number is malformed.
    #[error("Phone error: {0}")]
    Phone(#[from] PhoneError),

    /// Catalog data violates its invariants.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Rate(_) | Self::PincodeLookup(_) => Severity::Soft,
            Self::Address(_) | Self::Phone(_) | Self::Catalog(_) | Self::NotFound(_) => {
                Severity::UserActionable
            }
            Self::Otp(err) => match err {
                OtpError::Http(_) | OtpError::Timeout | OtpError::Parse(_) => Severity::Fatal,
                _ => Severity::UserActionable,
            },
            Self::Profile(err) => err.severity(),
            Self::Checkout(err) => err.severity(),
            Self::Config(_) | Self::Storage(_) | Self::Firestore(_) | Self::Internal(_) => {
                Severity::Fatal
            }
        }
    }

    /// Text to show the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rate(_) => "Shipping charges unavailable".to_string(),
            Self::PincodeLookup(_) => crate::pincode::MANUAL_ENTRY_HINT.to_string(),
            Self::Otp(err) => match err {
                OtpError::Rejected(reason) => reason.clone(),
                OtpError::Http(_) | OtpError::Timeout | OtpError::Parse(_) => {
                    "Failed to send OTP. Please try again.".to_string()
                }
                other => other.to_string(),
            },
            Self::Profile(err) => err.user_message(),
            Self::Checkout(err) => err.user_message(),
            Self::Address(err) => err.to_string(),
            Self::Phone(_) => "Enter valid 10-digit mobile number".to_string(),
            Self::Catalog(_) => "This product is unavailable".to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Config(_) | Self::Storage(_) | Self::Firestore(_) | Self::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// Log the error at a level matching its severity; capture fatal errors
    /// to Sentry.
    pub fn report(&self) {
        match self.severity() {
            Severity::Soft => tracing::warn!(error = %self, "Recoverable error"),
            Severity::UserActionable => tracing::info!(error = %self, "User-actionable error"),
            Severity::Fatal => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Operation failed"
                );
            }
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from the verified phone key.
///
/// Call this after successful verification to associate errors with the customer.
pub fn set_sentry_user(user_id: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "neem-oil")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
