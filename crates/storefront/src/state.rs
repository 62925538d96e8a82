//! Application state shared across views.
//!
//! [`AppState`] owns the cart and the delivery address. Its mutation methods
//! are the only write path; each one hands the resulting snapshot to a
//! background writer, so persistence never blocks the caller and the newest
//! snapshot always wins.

use std::sync::Arc;

use krushi_sarthi_core::pricing::CheckoutTotals;
use krushi_sarthi_core::{
    Address, CartKey, CartLedger, PhoneNumber, Product, QuoteFingerprint, ShippingQuote, Variant,
};
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, info, instrument, warn};

use crate::config::StorefrontConfig;
use crate::error::{AppError, add_breadcrumb};
use crate::firestore::{FirestoreClient, FirestoreError, ProfileStore};
use crate::notice::Notice;
use crate::pincode::{PincodeClient, PostalLookup};
use crate::shipping::{DeliveryRateClient, RateLookup, ShippingEstimator};
use crate::storage::{DeviceSnapshot, DeviceStore, JsonFileStore};

const NOTICE_CAPACITY: usize = 32;

/// External collaborators, injectable for tests.
#[derive(Clone)]
pub struct Services {
    pub profiles: Arc<dyn ProfileStore>,
    pub rates: Arc<dyn RateLookup>,
    pub postal: Arc<dyn PostalLookup>,
    pub device: Arc<dyn DeviceStore>,
}

impl Services {
    /// Production clients built from configuration.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            profiles: Arc::new(FirestoreClient::new(
                &config.firebase,
                config.request_timeout,
            )),
            rates: Arc::new(DeliveryRateClient::new(
                config.delivery_api_base_url.clone(),
                config.shipping_origin_pincode.clone(),
            )),
            postal: Arc::new(PincodeClient::new(
                config.delivery_api_base_url.clone(),
                config.request_timeout,
            )),
            device: Arc::new(JsonFileStore::new(config.device_state_path.clone())),
        }
    }
}

/// A snapshot handed to the persistence writer.
#[derive(Debug, Clone, Default)]
pub struct Revision {
    pub number: u64,
    pub snapshot: DeviceSnapshot,
}

/// Application state shared across all views.
///
/// This struct is cheaply cloneable via `Arc`. Constructing it spawns the
/// persistence writer, so it must be created inside a Tokio runtime.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    session: RwLock<DeviceSnapshot>,
    profiles: Arc<dyn ProfileStore>,
    postal: Arc<dyn PostalLookup>,
    estimator: ShippingEstimator,
    notices: broadcast::Sender<Notice>,
    revisions: watch::Sender<Revision>,
    persisted: watch::Receiver<u64>,
}

impl AppState {
    /// Create state with an empty cart and no address.
    #[must_use]
    pub fn new(config: StorefrontConfig, services: Services) -> Self {
        Self::with_snapshot(config, services, DeviceSnapshot::default())
    }

    /// Create state from the snapshot saved on the device.
    ///
    /// A missing or unreadable snapshot starts empty.
    pub async fn restore(config: StorefrontConfig, services: Services) -> Self {
        let snapshot = match services.device.load().await {
            Ok(Some(snapshot)) => {
                debug!(lines = snapshot.cart.len(), "Restored device state");
                snapshot
            }
            Ok(None) => DeviceSnapshot::default(),
            Err(e) => {
                warn!(error = %e, "Could not restore device state, starting empty");
                DeviceSnapshot::default()
            }
        };
        Self::with_snapshot(config, services, snapshot)
    }

    fn with_snapshot(config: StorefrontConfig, services: Services, snapshot: DeviceSnapshot) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let (revisions, revision_rx) = watch::channel(Revision {
            number: 0,
            snapshot: snapshot.clone(),
        });
        let (persisted_tx, persisted) = watch::channel(0);
        spawn_writer(services.device, revision_rx, persisted_tx);

        let estimator = ShippingEstimator::new(services.rates, config.request_timeout);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                session: RwLock::new(snapshot),
                profiles: services.profiles,
                postal: services.postal,
                estimator,
                notices,
                revisions,
                persisted,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn profiles(&self) -> &dyn ProfileStore {
        self.inner.profiles.as_ref()
    }

    #[must_use]
    pub fn postal(&self) -> &dyn PostalLookup {
        self.inner.postal.as_ref()
    }

    #[must_use]
    pub fn estimator(&self) -> &ShippingEstimator {
        &self.inner.estimator
    }

    // =========================================================================
    // Notices
    // =========================================================================

    /// Receive every notice published from now on.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Publish a notice to all subscribers.
    pub fn notify(&self, notice: Notice) {
        info!(kind = ?notice.kind, message = %notice.message, "Notice");
        // No subscribers is fine.
        let _ = self.inner.notices.send(notice);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn cart(&self) -> CartLedger {
        self.inner.session.read().await.cart.clone()
    }

    pub async fn address(&self) -> Option<Address> {
        self.inner.session.read().await.address.clone()
    }

    /// Receive every committed snapshot of cart and address.
    #[must_use]
    pub fn subscribe_changes(&self) -> watch::Receiver<Revision> {
        self.inner.revisions.subscribe()
    }

    /// The (pincode, weight) the current shipping quote must match.
    pub async fn shipping_fingerprint(&self) -> QuoteFingerprint {
        fingerprint_of(&*self.inner.session.read().await)
    }

    /// The estimator's quote if it matches the current cart and address.
    pub async fn current_shipping_quote(&self) -> Option<ShippingQuote> {
        let fingerprint = self.shipping_fingerprint().await;
        self.inner.estimator.quote_for(&fingerprint)
    }

    /// Request a fresh estimate for the current cart and address.
    ///
    /// Returns `None` if a newer request superseded this one.
    pub async fn refresh_shipping_quote(&self) -> Option<ShippingQuote> {
        let fingerprint = self.shipping_fingerprint().await;
        self.inner.estimator.refresh(fingerprint).await
    }

    /// Totals for the current cart with the matching shipping quote, if any.
    pub async fn totals(&self) -> CheckoutTotals {
        let session = self.inner.session.read().await;
        let quote = self.inner.estimator.quote_for(&fingerprint_of(&session));
        CheckoutTotals::compute(
            &session.cart,
            quote.as_ref(),
            self.inner.config.free_shipping_threshold,
        )
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply `change` to the session and queue the result for persistence.
    async fn mutate<R>(&self, change: impl FnOnce(&mut DeviceSnapshot) -> R) -> R {
        let mut session = self.inner.session.write().await;
        let result = change(&mut session);
        let snapshot = session.clone();
        self.inner.revisions.send_modify(|revision| {
            revision.number += 1;
            revision.snapshot = snapshot;
        });
        drop(session);
        result
    }

    /// Add one unit of `variant` to the cart.
    pub async fn add_to_cart(&self, product: Product, variant: Variant) {
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[
                ("product_id", product.id().as_str()),
                ("variant", variant.key()),
            ]),
        );
        self.mutate(|s| s.cart.add(product, variant)).await;
    }

    /// Overwrite a line's quantity; zero or less removes it.
    pub async fn set_cart_quantity(&self, key: &CartKey, quantity: i64) -> bool {
        self.mutate(|s| s.cart.set_quantity(key, quantity)).await
    }

    pub async fn remove_from_cart(&self, key: &CartKey) -> bool {
        self.mutate(|s| s.cart.remove(key)).await
    }

    pub async fn clear_cart(&self) {
        self.mutate(|s| s.cart.clear()).await;
    }

    /// Replace the delivery address.
    pub async fn set_address(&self, address: Address) {
        self.mutate(|s| s.address = Some(address)).await;
    }

    pub async fn clear_address(&self) {
        self.mutate(|s| s.address = None).await;
    }

    /// Wait until every mutation so far has been written to the device.
    pub async fn flush(&self) {
        let target = self.inner.revisions.borrow().number;
        let mut persisted = self.inner.persisted.clone();
        if persisted.wait_for(|saved| *saved >= target).await.is_err() {
            warn!("Device writer stopped before flushing");
        }
    }

    // =========================================================================
    // Remote profile
    // =========================================================================

    /// Load the saved delivery address for `phone` into state.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile document cannot be read in time.
    #[instrument(skip(self), fields(phone = %phone))]
    pub async fn load_remote_address(&self, phone: &PhoneNumber) -> Result<Option<Address>, AppError> {
        let document = tokio::time::timeout(
            self.inner.config.request_timeout,
            self.inner.profiles.get_profile(phone.profile_key()),
        )
        .await
        .map_err(|_| FirestoreError::Timeout)??;

        let Some(address) = document.as_ref().and_then(|d| d.primary_address()) else {
            return Ok(None);
        };

        let mut address = address.normalized();
        if address.phone.is_empty() {
            address.phone = phone.profile_key().to_string();
        }
        self.set_address(address.clone()).await;
        Ok(Some(address))
    }
}

fn fingerprint_of(session: &DeviceSnapshot) -> QuoteFingerprint {
    let pincode = session
        .address
        .as_ref()
        .map_or("", |address| address.pincode.as_str());
    QuoteFingerprint::for_cart(pincode, &session.cart)
}

impl Revision {
    /// The shipping inputs this revision implies.
    #[must_use]
    pub fn fingerprint(&self) -> QuoteFingerprint {
        fingerprint_of(&self.snapshot)
    }
}

/// Persist the newest revision whenever one is published.
fn spawn_writer(
    device: Arc<dyn DeviceStore>,
    mut revisions: watch::Receiver<Revision>,
    persisted: watch::Sender<u64>,
) {
    tokio::spawn(async move {
        while revisions.changed().await.is_ok() {
            let Revision { number, snapshot } = revisions.borrow_and_update().clone();
            if let Err(e) = device.save(&snapshot).await {
                warn!(error = %e, revision = number, "Failed to persist device state");
            }
            persisted.send_replace(number);
        }
        debug!("Device writer stopped");
    });
}
