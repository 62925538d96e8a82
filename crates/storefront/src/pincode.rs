//! Postal-code lookup for address auto-fill.
//!
//! A lookup failure never blocks the address form; the user is asked to fill
//! the fields in by hand instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use krushi_sarthi_core::{Address, Pincode, PostalDetails};
use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, warn};
use url::Url;

/// Hint shown while a lookup is running.
pub const CHECKING_HINT: &str = "Checking serviceability…";

/// Hint shown when the lookup failed.
pub const MANUAL_ENTRY_HINT: &str = "Couldn't fetch details. Please fill manually.";

/// Errors from the postal-code lookup service.
#[derive(Debug, Error)]
pub enum PincodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status}")]
    Api { status: u16 },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The service does not know this pincode.
    #[error("Pincode not serviceable: {0}")]
    NotFound(String),

    /// The lookup did not complete within the configured bound.
    #[error("Pincode lookup timed out")]
    Timeout,
}

/// A postal-code directory.
#[async_trait]
pub trait PostalLookup: Send + Sync {
    async fn lookup(&self, pincode: &Pincode) -> Result<PostalDetails, PincodeError>;
}

#[derive(Debug, Deserialize)]
struct PincodeResponse {
    #[serde(default)]
    delivery_codes: Vec<DeliveryCode>,
}

#[derive(Debug, Deserialize)]
struct DeliveryCode {
    postal_code: PostalCode,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostalCode {
    city: String,
    district: String,
    state_code: String,
}

/// Client for the courier's pincode directory.
#[derive(Clone)]
pub struct PincodeClient {
    inner: Arc<PincodeClientInner>,
}

struct PincodeClientInner {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl PincodeClient {
    #[must_use]
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(PincodeClientInner {
                client: reqwest::Client::new(),
                base_url,
                timeout,
            }),
        }
    }

    fn endpoint(&self, pincode: &Pincode) -> Result<Url, PincodeError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/pincode"))
            .map_err(|e| PincodeError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("pin_code", pincode.as_str());
        Ok(url)
    }
}

fn parse_pincode_response(body: &str, pincode: &Pincode) -> Result<PostalDetails, PincodeError> {
    let response: PincodeResponse =
        serde_json::from_str(body).map_err(|e| PincodeError::Parse(e.to_string()))?;
    let code = response
        .delivery_codes
        .into_iter()
        .next()
        .ok_or_else(|| PincodeError::NotFound(pincode.to_string()))?
        .postal_code;

    Ok(PostalDetails {
        city: code.city.trim().to_string(),
        district: code.district.trim().to_string(),
        state_code: code.state_code.trim().to_string(),
    })
}

#[async_trait]
impl PostalLookup for PincodeClient {
    #[instrument(skip(self), fields(pincode = %pincode))]
    async fn lookup(&self, pincode: &Pincode) -> Result<PostalDetails, PincodeError> {
        let url = self.endpoint(pincode)?;
        let response = self
            .inner
            .client
            .get(url)
            .timeout(self.inner.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PincodeError::Timeout
                } else {
                    PincodeError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PincodeError::Api {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_pincode_response(&body, pincode)
    }
}

/// Result of auto-filling an address from its pincode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autofill {
    /// The address with any looked-up fields merged in.
    pub address: Address,
    /// Text for the hint under the pincode field.
    pub hint: String,
    /// Whether the lookup succeeded.
    pub found: bool,
}

/// Look up `pincode` and merge the result into `address`.
///
/// Lookup failures are soft: the address comes back with only the pincode
/// changed and a hint asking for manual entry.
#[instrument(skip(lookup, address), fields(pincode = %pincode))]
pub async fn autofill(lookup: &dyn PostalLookup, address: &Address, pincode: &Pincode) -> Autofill {
    let mut address = address.clone();
    address.pincode = pincode.to_string();

    match lookup.lookup(pincode).await {
        Ok(details) => {
            address.apply_postal_details(pincode, &details);
            Autofill {
                address,
                hint: details.hint(),
                found: true,
            }
        }
        Err(e) => {
            warn!(error = %e, "Pincode lookup failed, falling back to manual entry");
            Autofill {
                address,
                hint: MANUAL_ENTRY_HINT.to_string(),
                found: false,
            }
        }
    }
}
