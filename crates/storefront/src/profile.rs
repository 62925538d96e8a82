//! Saving the delivery address to the customer's profile.

use krushi_sarthi_core::{Address, AddressError};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::error::{Severity, add_breadcrumb};
use crate::firestore::FirestoreError;
use crate::notice::Notice;
use crate::state::AppState;

const INCOMPLETE_MESSAGE: &str = "Please complete all fields and a valid pincode";

/// Errors from saving an address.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The address has no usable phone number to key the profile on.
    #[error("Phone number missing")]
    MissingPhone,

    /// A required field is blank or the pincode is malformed.
    #[error("Incomplete address: {0}")]
    Incomplete(AddressError),

    /// The profile store rejected the write.
    #[error("Profile store error: {0}")]
    Store(#[from] FirestoreError),

    /// The write did not complete within the configured bound.
    #[error("Saving the address timed out")]
    Timeout,
}

impl From<AddressError> for ProfileError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::MissingPhone | AddressError::InvalidPhone(_) => Self::MissingPhone,
            other => Self::Incomplete(other),
        }
    }
}

impl ProfileError {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::MissingPhone | Self::Incomplete(_) => Severity::UserActionable,
            Self::Store(_) | Self::Timeout => Severity::Fatal,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingPhone => "Phone number missing".to_string(),
            Self::Incomplete(_) => INCOMPLETE_MESSAGE.to_string(),
            Self::Store(_) | Self::Timeout => "Failed to update address".to_string(),
        }
    }
}

/// Validate `address` and write it as the profile's only address.
///
/// On success the normalized address becomes the delivery address in app
/// state. Every outcome publishes one notice; on failure app state is left
/// unchanged.
///
/// # Errors
///
/// Returns an error if the address is incomplete or the store write fails.
#[instrument(skip(state, address))]
pub async fn save_address(state: &AppState, address: &Address) -> Result<Address, ProfileError> {
    let result = save_inner(state, address).await;
    match &result {
        Ok(_) => state.notify(Notice::success("Address updated")),
        Err(e) => {
            warn!(error = %e, "Address not saved");
            state.notify(Notice::error(e.user_message()));
        }
    }
    result
}

async fn save_inner(state: &AppState, address: &Address) -> Result<Address, ProfileError> {
    let address = address.normalized();
    let phone = address.phone_number()?;
    address.validate()?;

    tokio::time::timeout(
        state.config().request_timeout,
        state
            .profiles()
            .save_profile(phone.profile_key(), std::slice::from_ref(&address)),
    )
    .await
    .map_err(|_| ProfileError::Timeout)??;

    info!(phone = %phone, "Address saved");
    add_breadcrumb("profile", "Address saved", Some(&[("pincode", address.pincode.as_str())]));
    state.set_address(address.clone()).await;
    Ok(address)
}
