//! Checkout Aggregator.
//!
//! Combines the cart, the delivery address, the shipping estimate and the
//! payment method into an [`OrderDraft`] and appends it to the customer's
//! remote order history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use krushi_sarthi_core::{
    Address, CartLedger, CheckoutTotals, OrderDraft, OrderError, OrderIdGenerator, PaymentMethod,
    PhoneError, PhoneNumber, QuoteFingerprint,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Severity, add_breadcrumb};
use crate::firestore::FirestoreError;
use crate::notice::Notice;
use crate::state::AppState;

/// Where the checkout view stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    /// No delivery address; the customer must add one first.
    NoAddress,
    /// Address present but nothing to buy.
    EmptyCart,
    /// A shipping estimate is in flight; totals assume free shipping.
    EstimatingShipping,
    /// Payment confirmation is enabled.
    Ready,
    /// An order is being placed.
    Submitting,
    /// The order was placed and the cart cleared.
    Committed,
    /// The last attempt failed; the customer may retry.
    Failed,
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("No delivery address")]
    NoAddress,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Phone number missing")]
    MissingPhone,

    #[error("Invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    #[error("An order is already being placed")]
    SubmissionInProgress,

    #[error("{} payment is not available yet", .0.label())]
    PaymentMethodUnavailable(PaymentMethod),

    /// The remote profile document for the address phone does not exist.
    #[error("User profile not found")]
    ProfileNotFound,

    #[error("Profile store error: {0}")]
    Store(FirestoreError),

    #[error("Placing the order timed out")]
    Timeout,
}

impl From<OrderError> for CheckoutError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart => Self::EmptyCart,
            OrderError::PaymentMethodUnavailable(method) => Self::PaymentMethodUnavailable(method),
        }
    }
}

impl From<FirestoreError> for CheckoutError {
    fn from(err: FirestoreError) -> Self {
        match err {
            FirestoreError::DocumentMissing(_) => Self::ProfileNotFound,
            FirestoreError::Timeout => Self::Timeout,
            other => Self::Store(other),
        }
    }
}

impl CheckoutError {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::ProfileNotFound | Self::Store(_) | Self::Timeout => Severity::Fatal,
            _ => Severity::UserActionable,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoAddress => "Please add a delivery address".to_string(),
            Self::MissingPhone | Self::InvalidPhone(_) => "Phone number missing".to_string(),
            Self::ProfileNotFound => "User profile not found".to_string(),
            Self::Store(_) | Self::Timeout => "Failed to place order".to_string(),
            other => other.to_string(),
        }
    }
}

/// Resets the submit flag when the attempt ends, however it ends.
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Background task re-estimating shipping while the view is open.
struct EstimateWatcher {
    handle: JoinHandle<()>,
    /// Cleared by [`EstimateWatcher::stop`]; tickets are only begun while set.
    active: Arc<Mutex<bool>>,
}

impl EstimateWatcher {
    fn stop(self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.handle.abort();
    }
}

/// The checkout view's controller.
pub struct CheckoutAggregator {
    state: AppState,
    ids: OrderIdGenerator,
    payment: Mutex<PaymentMethod>,
    submitting: AtomicBool,
    committed: AtomicBool,
    phases: watch::Sender<CheckoutPhase>,
    estimates: Mutex<Option<EstimateWatcher>>,
}

impl CheckoutAggregator {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        let (phases, _) = watch::channel(CheckoutPhase::NoAddress);
        Self {
            state,
            ids: OrderIdGenerator::new(),
            payment: Mutex::new(PaymentMethod::default()),
            submitting: AtomicBool::new(false),
            committed: AtomicBool::new(false),
            phases,
            estimates: Mutex::new(None),
        }
    }

    /// Watch the checkout phase.
    ///
    /// Receivers see the latest phase only. A failed attempt publishes
    /// `Failed` and then the phase it falls back to, so a receiver that reads
    /// after both sends sees just the fallback.
    #[must_use]
    pub fn subscribe_phases(&self) -> watch::Receiver<CheckoutPhase> {
        self.phases.subscribe()
    }

    fn publish(&self, phase: CheckoutPhase) {
        debug!(?phase, "Checkout phase");
        self.phases.send_replace(phase);
    }

    // =========================================================================
    // Payment method
    // =========================================================================

    #[must_use]
    pub fn payment_method(&self) -> PaymentMethod {
        *self
            .payment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Choose how the customer pays.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentMethodUnavailable`] for methods without
    /// a working flow; the current selection is kept.
    pub fn select_payment(&self, method: PaymentMethod) -> Result<(), CheckoutError> {
        if !method.is_available() {
            return Err(CheckoutError::PaymentMethodUnavailable(method));
        }
        *self
            .payment
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = method;
        Ok(())
    }

    // =========================================================================
    // View lifecycle
    // =========================================================================

    /// Start estimating shipping for the current cart and address, and again
    /// whenever the pincode or cart weight changes, until [`Self::leave`].
    pub fn enter(&self) {
        let state = self.state.clone();
        let mut changes = state.subscribe_changes();
        let active = Arc::new(Mutex::new(true));
        let gate = Arc::clone(&active);
        let handle = tokio::spawn(async move {
            let mut last: Option<QuoteFingerprint> = None;
            loop {
                let fingerprint = changes.borrow_and_update().fingerprint();
                if last.as_ref() != Some(&fingerprint) {
                    debug!(%fingerprint, "Shipping inputs changed");
                    let estimator = state.estimator().clone();
                    let ticket = {
                        let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
                        if !*open {
                            break;
                        }
                        estimator.begin(fingerprint.clone())
                    };
                    tokio::spawn(async move {
                        estimator.complete(ticket).await;
                    });
                    last = Some(fingerprint);
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        let previous = self
            .estimates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(EstimateWatcher { handle, active });
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    /// Stop re-estimating and ignore any estimate still in flight.
    pub fn leave(&self) {
        let watcher = self
            .estimates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.stop();
        }
        self.state.estimator().cancel();
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current totals; shipping counts only if its quote matches the cart.
    pub async fn totals(&self) -> CheckoutTotals {
        self.state.totals().await
    }

    /// The phase implied by the current cart, address and estimate.
    pub async fn phase(&self) -> CheckoutPhase {
        if self.submitting.load(Ordering::Acquire) {
            return CheckoutPhase::Submitting;
        }
        let cart = self.state.cart().await;
        if cart.is_empty() && self.committed.load(Ordering::Acquire) {
            return CheckoutPhase::Committed;
        }
        self.committed.store(false, Ordering::Release);

        if self.state.address().await.is_none() {
            CheckoutPhase::NoAddress
        } else if cart.is_empty() {
            CheckoutPhase::EmptyCart
        } else if self.state.estimator().is_estimating() {
            CheckoutPhase::EstimatingShipping
        } else {
            CheckoutPhase::Ready
        }
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Place the order.
    ///
    /// On success the cart is cleared and the appended order returned. On any
    /// failure the cart is left untouched and the customer may retry. Either
    /// way exactly one notice is published, except for a rejected duplicate
    /// submission, which publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the address, cart or phone is missing, if the
    /// profile document does not exist, or if the remote write fails.
    #[instrument(skip(self))]
    pub async fn handle_make_payment(&self) -> Result<OrderDraft, CheckoutError> {
        if self.submitting.swap(true, Ordering::AcqRel) {
            warn!("Duplicate order submission ignored");
            return Err(CheckoutError::SubmissionInProgress);
        }
        let guard = SubmitGuard(&self.submitting);
        self.publish(CheckoutPhase::Submitting);

        let result = self.commit().await;
        drop(guard);

        match &result {
            Ok(order) => {
                info!(order_id = %order.id(), total = %order.payable(), "Order placed");
                self.committed.store(true, Ordering::Release);
                self.state.notify(Notice::success("Order placed successfully!"));
                self.publish(CheckoutPhase::Committed);
            }
            Err(e) => {
                if e.severity() == Severity::Fatal {
                    let event_id = sentry::capture_error(e);
                    error!(error = %e, sentry_event_id = %event_id, "Order not placed");
                } else {
                    info!(error = %e, "Order not placed");
                }
                self.state.notify(Notice::error(e.user_message()));
                self.publish(CheckoutPhase::Failed);
                self.publish(self.phase().await);
            }
        }
        result
    }

    async fn commit(&self) -> Result<OrderDraft, CheckoutError> {
        let address = self.state.address().await.ok_or(CheckoutError::NoAddress)?;
        let cart = self.state.cart().await;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let phone = profile_phone(&address)?;

        let draft = self.draft(&address, &cart)?;
        add_breadcrumb(
            "checkout",
            "Placing order",
            Some(&[("order_id", draft.id().as_str())]),
        );

        let timeout = self.state.config().request_timeout;
        let key = phone.profile_key();

        let profile = tokio::time::timeout(timeout, self.state.profiles().get_profile(key))
            .await
            .map_err(|_| CheckoutError::Timeout)??;
        if profile.is_none() {
            return Err(CheckoutError::ProfileNotFound);
        }

        tokio::time::timeout(timeout, self.state.profiles().append_order(key, &draft))
            .await
            .map_err(|_| CheckoutError::Timeout)??;

        self.state.clear_cart().await;
        Ok(draft)
    }

    fn draft(&self, address: &Address, cart: &CartLedger) -> Result<OrderDraft, CheckoutError> {
        let fingerprint = QuoteFingerprint::for_cart(&address.pincode, cart);
        let quote = self.state.estimator().quote_for(&fingerprint);
        let totals = CheckoutTotals::compute(
            cart,
            quote.as_ref(),
            self.state.config().free_shipping_threshold,
        );
        let now = Utc::now();
        OrderDraft::new(
            self.ids.next_id(now),
            cart,
            &totals,
            self.payment_method(),
            now,
        )
        .map_err(CheckoutError::from)
    }
}

impl Drop for CheckoutAggregator {
    fn drop(&mut self) {
        if let Some(watcher) = self
            .estimates
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.stop();
        }
    }
}

fn profile_phone(address: &Address) -> Result<PhoneNumber, CheckoutError> {
    if address.phone.trim().is_empty() {
        return Err(CheckoutError::MissingPhone);
    }
    Ok(PhoneNumber::parse(&address.phone)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use tokio::sync::Mutex as AsyncMutex;

    use krushi_sarthi_core::ShippingQuote;

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::firestore::{ProfileDocument, ProfileStore};
    use crate::notice::NoticeKind;
    use crate::shipping::{RateError, RateLookup};
    use crate::state::Services;
    use crate::state::tests::{API_KEY, address, config, product, services};
    use crate::storage::MemoryStore;

    #[derive(Default)]
    struct Profiles {
        exists: bool,
        fail_append: bool,
        delay: Option<Duration>,
        append_delay: Option<Duration>,
        orders: AsyncMutex<Vec<Value>>,
    }

    #[async_trait]
    impl ProfileStore for Profiles {
        async fn get_profile(&self, _: &str) -> Result<Option<ProfileDocument>, FirestoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.exists.then(ProfileDocument::default))
        }
        async fn append_order(&self, key: &str, order: &OrderDraft) -> Result<(), FirestoreError> {
            if let Some(delay) = self.append_delay {
                tokio::time::sleep(delay).await;
            }
            if !self.exists {
                return Err(FirestoreError::DocumentMissing(key.to_string()));
            }
            if self.fail_append {
                return Err(FirestoreError::Api {
                    status: 500,
                    message: "write failed".to_string(),
                });
            }
            self.orders
                .lock()
                .await
                .push(serde_json::to_value(order).unwrap());
            Ok(())
        }
        async fn save_profile(&self, _: &str, _: &[Address]) -> Result<(), FirestoreError> {
            Ok(())
        }
    }

    /// Answers after 100ms.
    struct SlowRate;

    #[async_trait]
    impl RateLookup for SlowRate {
        async fn lookup(&self, _: &QuoteFingerprint) -> Result<ShippingQuote, RateError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(ShippingQuote::from_decimal(Decimal::from(90)).unwrap())
        }
    }

    async fn checkout_with(profiles: Arc<Profiles>) -> CheckoutAggregator {
        let mut services = services(Arc::new(MemoryStore::new()));
        services.profiles = profiles;
        checkout_from(config(), services).await
    }

    async fn checkout_from(config: StorefrontConfig, services: Services) -> CheckoutAggregator {
        let state = AppState::new(config, services);
        let (p, v) = product("urea", "1kg", 300);
        state.add_to_cart(p, v).await;
        state.set_address(address()).await;
        CheckoutAggregator::new(state)
    }

    #[tokio::test]
    async fn test_successful_commit_clears_cart() {
        let profiles = Arc::new(Profiles {
            exists: true,
            ..Profiles::default()
        });
        let checkout = checkout_with(profiles.clone()).await;
        checkout.state.refresh_shipping_quote().await.unwrap();
        let mut notices = checkout.state.subscribe_notices();

        let order = checkout.handle_make_payment().await.unwrap();

        assert_eq!(order.total_amount(), Decimal::from(300));
        assert_eq!(order.shipping_fee(), Decimal::from(70));
        assert!(checkout.state.cart().await.is_empty());
        assert_eq!(profiles.orders.lock().await.len(), 1);
        assert_eq!(checkout.phase().await, CheckoutPhase::Committed);

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.message, "Order placed successfully!");
    }

    #[tokio::test]
    async fn test_missing_profile_aborts_without_writing() {
        let profiles = Arc::new(Profiles::default());
        let checkout = checkout_with(profiles.clone()).await;
        let mut notices = checkout.state.subscribe_notices();
        let before = checkout.state.cart().await;

        let err = checkout.handle_make_payment().await.unwrap_err();

        assert!(matches!(err, CheckoutError::ProfileNotFound));
        assert_eq!(checkout.state.cart().await, before);
        assert!(profiles.orders.lock().await.is_empty());
        assert_eq!(notices.recv().await.unwrap().message, "User profile not found");
        assert_eq!(checkout.phase().await, CheckoutPhase::Ready);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_cart() {
        let profiles = Arc::new(Profiles {
            exists: true,
            fail_append: true,
            ..Profiles::default()
        });
        let checkout = checkout_with(profiles).await;
        let mut phases = checkout.subscribe_phases();

        let err = checkout.handle_make_payment().await.unwrap_err();

        assert_eq!(err.user_message(), "Failed to place order");
        assert_eq!(checkout.state.cart().await.len(), 1);
        assert_eq!(*phases.borrow_and_update(), CheckoutPhase::Ready);
    }

    #[tokio::test]
    async fn test_slow_profile_store_times_out() {
        let config = StorefrontConfig::from_lookup(|key| match key {
            "FIREBASE_PROJECT_ID" => Some("krushi-sarthi".to_string()),
            "FIREBASE_API_KEY" => Some(API_KEY.to_string()),
            "REQUEST_TIMEOUT_SECS" => Some("1".to_string()),
            _ => None,
        })
        .unwrap();
        let slow_read = Profiles {
            exists: true,
            delay: Some(Duration::from_secs(2)),
            ..Profiles::default()
        };
        let slow_append = Profiles {
            exists: true,
            append_delay: Some(Duration::from_secs(2)),
            ..Profiles::default()
        };

        for profiles in [slow_read, slow_append] {
            let profiles = Arc::new(profiles);
            let mut services = services(Arc::new(MemoryStore::new()));
            services.profiles = profiles.clone();
            let checkout = checkout_from(config.clone(), services).await;
            let mut notices = checkout.state.subscribe_notices();
            let mut phases = checkout.subscribe_phases();
            let before = checkout.state.cart().await;

            let err = checkout.handle_make_payment().await.unwrap_err();

            assert!(matches!(err, CheckoutError::Timeout));
            assert_eq!(checkout.state.cart().await, before);
            assert!(profiles.orders.lock().await.is_empty());
            let notice = notices.recv().await.unwrap();
            assert_eq!(notice.kind, NoticeKind::Error);
            assert_eq!(notice.message, "Failed to place order");
            assert_eq!(*phases.borrow_and_update(), CheckoutPhase::Ready);
            assert_eq!(checkout.phase().await, CheckoutPhase::Ready);
        }
    }

    #[tokio::test]
    async fn test_shipping_waived_over_threshold() {
        let profiles = Arc::new(Profiles {
            exists: true,
            ..Profiles::default()
        });
        let checkout = checkout_with(profiles).await;
        let (p, v) = product("dap", "50kg", 1000);
        checkout.state.add_to_cart(p, v).await;
        checkout.state.refresh_shipping_quote().await.unwrap();

        let order = checkout.handle_make_payment().await.unwrap();
        assert_eq!(order.total_amount(), Decimal::from(1300));
        assert_eq!(order.shipping_fee(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let profiles = Arc::new(Profiles {
            exists: true,
            delay: Some(Duration::from_millis(50)),
            ..Profiles::default()
        });
        let checkout = checkout_with(profiles.clone()).await;

        let (first, second) = tokio::join!(
            checkout.handle_make_payment(),
            checkout.handle_make_payment()
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(CheckoutError::SubmissionInProgress)));
        assert_eq!(profiles.orders.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_preconditions() {
        let checkout = checkout_with(Arc::new(Profiles::default())).await;
        checkout.state.clear_address().await;
        assert_eq!(checkout.phase().await, CheckoutPhase::NoAddress);
        assert!(matches!(
            checkout.handle_make_payment().await,
            Err(CheckoutError::NoAddress)
        ));

        let mut draft = address();
        draft.phone = String::new();
        checkout.state.set_address(draft).await;
        assert!(matches!(
            checkout.handle_make_payment().await,
            Err(CheckoutError::MissingPhone)
        ));

        checkout.state.clear_cart().await;
        assert_eq!(checkout.phase().await, CheckoutPhase::EmptyCart);
        assert!(matches!(
            checkout.handle_make_payment().await,
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_online_payment_is_refused() {
        let checkout = checkout_with(Arc::new(Profiles::default())).await;
        assert!(matches!(
            checkout.select_payment(PaymentMethod::Online),
            Err(CheckoutError::PaymentMethodUnavailable(PaymentMethod::Online))
        ));
        assert_eq!(checkout.payment_method(), PaymentMethod::CashOnDelivery);
    }

    #[tokio::test]
    async fn test_enter_estimates_and_leave_cancels() {
        let checkout = checkout_with(Arc::new(Profiles::default())).await;
        checkout.enter();
        for _ in 0..50 {
            if checkout.state.current_shipping_quote().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(checkout.totals().await.shipping_charged, Decimal::from(70));

        checkout.leave();
        assert!(!checkout.state.estimator().is_estimating());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_leave_discards_estimate_in_flight() {
        let mut services = services(Arc::new(MemoryStore::new()));
        services.rates = Arc::new(SlowRate);
        let checkout = checkout_from(config(), services).await;

        checkout.enter();
        for _ in 0..50 {
            if checkout.state.estimator().is_estimating() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(checkout.state.estimator().is_estimating());

        checkout.leave();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(checkout.state.current_shipping_quote().await.is_none());
        assert!(!checkout.state.estimator().is_estimating());
    }
}
