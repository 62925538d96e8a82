//! Customer profile documents in Firestore.
//!
//! One collection holds a document per customer, keyed by the bare 10-digit
//! phone number:
//!
//! ```text
//! userProfilesAndOrderStatus/9876543210
//!   profile: [Address, ...]
//!   orders:  [OrderDraft, ...]
//! ```
//!
//! The client only ever reads a document, replaces its `profile` field, or
//! appends to its `orders` field. Appends go through a server-side
//! `appendMissingElements` transform so orders written concurrently from
//! another device are never overwritten.

pub mod value;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use krushi_sarthi_core::{Address, OrderDraft};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::FirebaseConfig;

const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";

/// Errors that can occur when talking to Firestore.
#[derive(Debug, Error)]
pub enum FirestoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The document a write requires does not exist.
    #[error("Document not found: {0}")]
    DocumentMissing(String),

    /// A document or value could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The request did not complete within the configured bound.
    #[error("Request timed out")]
    Timeout,

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FirestoreError {
    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Decoded contents of a customer profile document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProfileDocument {
    /// Saved addresses; the first one is the delivery address.
    pub profile: Vec<Address>,
    /// Order history as written; entries from older app versions vary in shape.
    pub orders: Vec<Value>,
}

impl ProfileDocument {
    /// The delivery address, if one was saved.
    #[must_use]
    pub fn primary_address(&self) -> Option<&Address> {
        self.profile.first()
    }
}

/// Storage for customer profile documents.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read the document for `key`. A missing document is `Ok(None)`.
    async fn get_profile(&self, key: &str) -> Result<Option<ProfileDocument>, FirestoreError>;

    /// Append `order` to the existing document's order list.
    ///
    /// Fails with [`FirestoreError::DocumentMissing`] if the document does not exist.
    async fn append_order(&self, key: &str, order: &OrderDraft) -> Result<(), FirestoreError>;

    /// Replace the document's address list, creating the document if needed.
    /// Other fields are left untouched.
    async fn save_profile(&self, key: &str, profile: &[Address]) -> Result<(), FirestoreError>;
}

// =============================================================================
// FirestoreClient
// =============================================================================

/// Firestore REST client for the profile collection.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreClientInner>,
}

struct FirestoreClientInner {
    client: reqwest::Client,
    /// `projects/{project}/databases/(default)/documents`
    database_path: String,
    collection: String,
    api_key: SecretString,
    timeout: Duration,
}

#[derive(Deserialize)]
struct DocumentResponse {
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    #[must_use]
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(FirestoreClientInner {
                client: reqwest::Client::new(),
                database_path: format!(
                    "projects/{}/databases/(default)/documents",
                    config.project_id
                ),
                collection: config.collection.clone(),
                api_key: config.api_key.clone(),
                timeout,
            }),
        }
    }

    /// Full resource name of a profile document.
    fn document_name(&self, key: &str) -> String {
        format!(
            "{}/{}/{key}",
            self.inner.database_path, self.inner.collection
        )
    }

    fn url(&self, path: &str) -> Result<Url, FirestoreError> {
        let mut url = Url::parse(&format!("{FIRESTORE_API}/{path}"))
            .map_err(|e| FirestoreError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        Ok(url)
    }

    /// Read the response body and map failure statuses.
    async fn check(
        response: reqwest::Response,
        key: &str,
    ) -> Result<reqwest::Response, FirestoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND || message.contains("FAILED_PRECONDITION") {
            return Err(FirestoreError::DocumentMissing(key.to_string()));
        }
        Err(FirestoreError::Api {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl ProfileStore for FirestoreClient {
    #[instrument(skip(self), fields(collection = %self.inner.collection))]
    async fn get_profile(&self, key: &str) -> Result<Option<ProfileDocument>, FirestoreError> {
        let url = self.url(&self.document_name(key))?;

        let response = self
            .inner
            .client
            .get(url)
            .timeout(self.inner.timeout)
            .send()
            .await
            .map_err(FirestoreError::from_send)?;

        let response = match Self::check(response, key).await {
            Ok(response) => response,
            Err(FirestoreError::DocumentMissing(_)) => {
                debug!("Profile document does not exist");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let document: DocumentResponse = response
            .json()
            .await
            .map_err(|e| FirestoreError::Decode(e.to_string()))?;
        let fields = value::decode_fields(&document.fields)?;
        let profile = serde_json::from_value(Value::Object(fields))
            .map_err(|e| FirestoreError::Decode(e.to_string()))?;

        Ok(Some(profile))
    }

    #[instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn append_order(&self, key: &str, order: &OrderDraft) -> Result<(), FirestoreError> {
        let url = self.url(&format!("{}:commit", self.inner.database_path))?;
        let order =
            serde_json::to_value(order).map_err(|e| FirestoreError::Decode(e.to_string()))?;

        let body = json!({
            "writes": [{
                "transform": {
                    "document": self.document_name(key),
                    "fieldTransforms": [{
                        "fieldPath": "orders",
                        "appendMissingElements": { "values": [value::encode(&order)] }
                    }]
                },
                "currentDocument": { "exists": true }
            }]
        });

        let response = self
            .inner
            .client
            .post(url)
            .timeout(self.inner.timeout)
            .json(&body)
            .send()
            .await
            .map_err(FirestoreError::from_send)?;
        Self::check(response, key).await?;

        debug!("Order appended");
        Ok(())
    }

    #[instrument(skip(self, profile), fields(addresses = profile.len()))]
    async fn save_profile(&self, key: &str, profile: &[Address]) -> Result<(), FirestoreError> {
        let mut url = self.url(&self.document_name(key))?;
        url.query_pairs_mut()
            .append_pair("updateMask.fieldPaths", "profile");

        let profile =
            serde_json::to_value(profile).map_err(|e| FirestoreError::Decode(e.to_string()))?;
        let body = json!({ "fields": { "profile": value::encode(&profile) } });

        let response = self
            .inner
            .client
            .patch(url)
            .timeout(self.inner.timeout)
            .json(&body)
            .send()
            .await
            .map_err(FirestoreError::from_send)?;
        Self::check(response, key).await?;

        debug!("Profile saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> FirestoreClient {
        FirestoreClient::new(
            &FirebaseConfig {
                project_id: "krushi-sarthi".to_string(),
                api_key: SecretString::from("AIzaTestKey"),
                collection: "userProfilesAndOrderStatus".to_string(),
                recaptcha_token: None,
            },
            Duration::from_secs(15),
        )
    }

    #[test]
    fn test_document_url() {
        let client = client();
        let url = client.url(&client.document_name("9876543210")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/krushi-sarthi/databases/(default)/documents/userProfilesAndOrderStatus/9876543210?key=AIzaTestKey"
        );
    }

    #[test]
    fn test_profile_document_from_decoded_fields() {
        let fields = json!({
            "profile": { "arrayValue": { "values": [
                { "mapValue": { "fields": {
                    "name": { "stringValue": "Sunil" },
                    "phone": { "stringValue": "9876543210" },
                    "pincode": { "stringValue": "413512" }
                } } }
            ] } },
            "orders": { "arrayValue": {} }
        });
        let decoded = value::decode_fields(fields.as_object().unwrap()).unwrap();
        let document: ProfileDocument = serde_json::from_value(Value::Object(decoded)).unwrap();

        let address = document.primary_address().unwrap();
        assert_eq!(address.name, "Sunil");
        assert_eq!(address.country, "India");
        assert!(document.orders.is_empty());
    }

    #[test]
    fn test_profile_document_without_fields() {
        let document: ProfileDocument = serde_json::from_value(json!({})).unwrap();
        assert!(document.primary_address().is_none());
    }
}
