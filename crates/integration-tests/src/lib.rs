//! Integration tests for Krushi Sarthi.
//!
//! # Running Tests
//!
//! ```bash
//! # Everything that runs offline
//! cargo test -p krushi-sarthi-integration-tests
//!
//! # Smoke tests against the live rate and pincode services
//! cargo test -p krushi-sarthi-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_ledger` - Cart mutations, derived totals, device persistence
//! - `shipping` - Weight parsing, free-shipping rule, stale-response guard
//! - `checkout` - Order commit, abort and retry
//! - `phone_verification` - OTP send, resend and verify
//! - `live_services` - Network smoke tests (ignored by default)
//!
//! Every external collaborator is replaced by an in-memory fake from this
//! crate, so the offline tests need no credentials.

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use krushi_sarthi_core::{
    Address, LocalizedText, OrderDraft, PhoneNumber, Pincode, PostalDetails, Product, ProductId,
    QuoteFingerprint, ShippingQuote, Variant,
};
use krushi_sarthi_storefront::config::{OtpProviderKind, StorefrontConfig};
use krushi_sarthi_storefront::firestore::{FirestoreError, ProfileDocument, ProfileStore};
use krushi_sarthi_storefront::otp::{OtpError, OtpProvider, OtpSession};
use krushi_sarthi_storefront::pincode::{PincodeError, PostalLookup};
use krushi_sarthi_storefront::shipping::{RateError, RateLookup};
use krushi_sarthi_storefront::storage::{DeviceStore, MemoryStore};
use krushi_sarthi_storefront::{AppState, Services};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::Mutex;

/// Test phone number, as the bare profile key.
pub const PHONE: &str = "9876543210";

/// Configuration with fixed test credentials and defaults for everything else.
#[must_use]
pub fn config() -> StorefrontConfig {
    StorefrontConfig::from_lookup(|key| match key {
        "FIREBASE_PROJECT_ID" => Some("krushi-sarthi-test".to_string()),
        "FIREBASE_API_KEY" => Some("AIzaSyB3xQ9mK2nL5pR7tV0wZ4cF6hJ8".to_string()),
        "OTP_RESEND_COOLDOWN_SECS" => Some("0".to_string()),
        _ => None,
    })
    .expect("test configuration is valid")
}

/// A single-variant product.
#[must_use]
pub fn product(id: &str, variant_title: &str, price: i64, compare_at: i64) -> (Product, Variant) {
    let variant = Variant::new(
        LocalizedText::en(variant_title),
        Decimal::from(price),
        Decimal::from(compare_at),
    )
    .expect("valid variant");
    let product = Product::new(
        ProductId::new(id),
        LocalizedText::en(id),
        "Krushi Kendra",
        vec![variant.clone()],
    )
    .expect("valid product");
    (product, variant)
}

/// A complete address in Latur for [`PHONE`].
#[must_use]
pub fn address() -> Address {
    Address {
        name: "Sunil Patil".to_string(),
        phone: PHONE.to_string(),
        flat: "12".to_string(),
        street: "Station Road".to_string(),
        landmark: "Near bus stand".to_string(),
        city: "Latur".to_string(),
        district: "Latur".to_string(),
        state: "Maharashtra".to_string(),
        pincode: "413512".to_string(),
        ..Address::default()
    }
}

// =============================================================================
// Profile store
// =============================================================================

/// In-memory profile documents keyed by phone.
#[derive(Default)]
pub struct MemoryProfiles {
    documents: Mutex<HashMap<String, ProfileDocument>>,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryProfiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document with `orders`.
    pub async fn insert(&self, key: &str, profile: Vec<Address>, orders: Vec<Value>) {
        self.documents
            .lock()
            .await
            .insert(key.to_string(), ProfileDocument { profile, orders });
    }

    pub async fn document(&self, key: &str) -> Option<ProfileDocument> {
        self.documents.lock().await.get(key).cloned()
    }

    pub async fn orders(&self, key: &str) -> Vec<Value> {
        self.document(key)
            .await
            .map(|document| document.orders)
            .unwrap_or_default()
    }

    /// Make every later write fail with a server error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), FirestoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FirestoreError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn get_profile(&self, key: &str) -> Result<Option<ProfileDocument>, FirestoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.document(key).await)
    }

    async fn append_order(&self, key: &str, order: &OrderDraft) -> Result<(), FirestoreError> {
        self.check_writable()?;
        let value =
            serde_json::to_value(order).map_err(|e| FirestoreError::Decode(e.to_string()))?;
        let mut documents = self.documents.lock().await;
        let document = documents
            .get_mut(key)
            .ok_or_else(|| FirestoreError::DocumentMissing(key.to_string()))?;
        if !document.orders.contains(&value) {
            document.orders.push(value);
        }
        Ok(())
    }

    async fn save_profile(&self, key: &str, profile: &[Address]) -> Result<(), FirestoreError> {
        self.check_writable()?;
        self.documents
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .profile = profile.to_vec();
        Ok(())
    }
}

// =============================================================================
// Rate lookup
// =============================================================================

/// Rates per parcel weight, each answered after its own delay.
#[derive(Default)]
pub struct ScriptedRates {
    rates: std::sync::Mutex<HashMap<u64, (Decimal, Duration)>>,
    default_cost: Option<Decimal>,
    calls: AtomicUsize,
}

impl ScriptedRates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer lookups for `weight_grams` with `cost` after `delay`.
    #[must_use]
    pub fn with_rate(self, weight_grams: u64, cost: i64, delay: Duration) -> Self {
        self.rates
            .lock()
            .expect("rates lock")
            .insert(weight_grams, (Decimal::from(cost), delay));
        self
    }

    /// Answer lookups for any other weight with `cost`, immediately.
    #[must_use]
    pub fn with_default(mut self, cost: i64) -> Self {
        self.default_cost = Some(Decimal::from(cost));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLookup for ScriptedRates {
    async fn lookup(&self, fingerprint: &QuoteFingerprint) -> Result<ShippingQuote, RateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rate = self
            .rates
            .lock()
            .expect("rates lock")
            .get(&fingerprint.weight_grams)
            .copied()
            .or_else(|| self.default_cost.map(|cost| (cost, Duration::ZERO)));
        let (cost, delay) = rate.ok_or(RateError::NoQuotes)?;
        tokio::time::sleep(delay).await;
        Ok(ShippingQuote::from_decimal(cost)?)
    }
}

// =============================================================================
// Postal lookup
// =============================================================================

/// Knows exactly one pincode.
pub struct OnePincode {
    pub pincode: String,
    pub details: PostalDetails,
}

impl OnePincode {
    #[must_use]
    pub fn latur() -> Self {
        Self {
            pincode: "413512".to_string(),
            details: PostalDetails {
                city: "Latur".to_string(),
                district: "Latur".to_string(),
                state_code: "MH".to_string(),
            },
        }
    }
}

#[async_trait]
impl PostalLookup for OnePincode {
    async fn lookup(&self, pincode: &Pincode) -> Result<PostalDetails, PincodeError> {
        if pincode.as_str() == self.pincode {
            Ok(self.details.clone())
        } else {
            Err(PincodeError::NotFound(pincode.to_string()))
        }
    }
}

// =============================================================================
// OTP provider
// =============================================================================

/// Accepts one fixed code and counts sends.
pub struct FixedCodeOtp {
    kind: OtpProviderKind,
    code: String,
    sends: AtomicUsize,
    offline: AtomicBool,
}

impl FixedCodeOtp {
    #[must_use]
    pub fn new(kind: OtpProviderKind, code: &str) -> Self {
        Self {
            kind,
            code: code.to_string(),
            sends: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Make every later verification time out.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl OtpProvider for FixedCodeOtp {
    fn kind(&self) -> OtpProviderKind {
        self.kind
    }

    fn sent_message(&self) -> &'static str {
        match self.kind {
            OtpProviderKind::Lambda => "OTP sent via SMS (Lambda)",
            OtpProviderKind::Firebase => "OTP sent via Firebase",
        }
    }

    async fn send(&self, phone: &PhoneNumber) -> Result<OtpSession, OtpError> {
        let count = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OtpSession {
            phone: phone.clone(),
            handle: Some(format!("{:?}-session-{count}", self.kind)),
        })
    }

    async fn verify(&self, _session: &OtpSession, code: &str) -> Result<(), OtpError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(OtpError::Timeout);
        }
        if code == self.code {
            Ok(())
        } else {
            Err(OtpError::Rejected("OTP Mismatch".to_string()))
        }
    }
}

// =============================================================================
// TestContext
// =============================================================================

/// App state wired to in-memory fakes, with handles to inspect them.
pub struct TestContext {
    pub state: AppState,
    pub profiles: Arc<MemoryProfiles>,
    pub rates: Arc<ScriptedRates>,
    pub device: Arc<dyn DeviceStore>,
}

impl TestContext {
    /// Fakes with a flat ₹70 rate for any weight.
    #[must_use]
    pub fn new() -> Self {
        Self::with(ScriptedRates::new().with_default(70), Arc::new(MemoryStore::new()))
    }

    #[must_use]
    pub fn with(rates: ScriptedRates, device: Arc<dyn DeviceStore>) -> Self {
        let profiles = Arc::new(MemoryProfiles::new());
        let rates = Arc::new(rates);
        let services = Services {
            profiles: profiles.clone(),
            rates: rates.clone(),
            postal: Arc::new(OnePincode::latur()),
            device: device.clone(),
        };
        Self {
            state: AppState::new(config(), services),
            profiles,
            rates,
            device,
        }
    }

    /// A second app instance sharing this one's fakes and device storage.
    pub async fn restart(&self) -> AppState {
        let services = Services {
            profiles: self.profiles.clone(),
            rates: self.rates.clone(),
            postal: Arc::new(OnePincode::latur()),
            device: self.device.clone(),
        };
        AppState::restore(config(), services).await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
