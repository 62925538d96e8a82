//! Shipping estimation.
//!
//! [`DeliveryRateClient`] asks the courier rate service for a fee;
//! [`ShippingEstimator`] turns that into a fail-soft [`ShippingQuote`] and
//! keeps the quote for the most recently requested (pincode, weight).
//!
//! Estimates are requested whenever the destination or cart weight changes,
//! so several may be in flight at once. Each request takes a ticket from a
//! monotonically increasing counter; a response is applied only if its ticket
//! is still the newest when it arrives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use krushi_sarthi_core::shipping::QuoteError;
use krushi_sarthi_core::{QuoteFingerprint, ShippingQuote};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// Fixed payment-type tag sent to the rate service. It selects the courier's
/// prepaid tariff and does not reflect the customer's payment method.
const PAYMENT_TYPE: &str = "Pre-paid";

/// Errors from the rate lookup service.
#[derive(Debug, Error)]
pub enum RateError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The service returned no rate entries.
    #[error("No rate quotes returned")]
    NoQuotes,

    /// The first entry's amount was unusable.
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] QuoteError),

    /// The lookup did not complete within the configured bound.
    #[error("Rate lookup timed out")]
    Timeout,
}

/// A courier rate service.
#[async_trait]
pub trait RateLookup: Send + Sync {
    /// Fee for shipping `fingerprint.weight_grams` to `fingerprint.pincode`.
    async fn lookup(&self, fingerprint: &QuoteFingerprint) -> Result<ShippingQuote, RateError>;
}

// =============================================================================
// DeliveryRateClient
// =============================================================================

/// One rate entry. Only the gross amount is relied upon.
#[derive(Debug, Deserialize)]
struct RateEntry {
    #[serde(alias = "gross_amount")]
    total_amount: Option<Value>,
}

/// Client for the courier rate endpoint.
#[derive(Clone)]
pub struct DeliveryRateClient {
    inner: Arc<DeliveryRateClientInner>,
}

struct DeliveryRateClientInner {
    client: reqwest::Client,
    base_url: Url,
    origin_pincode: Option<String>,
}

impl DeliveryRateClient {
    /// Create a new rate client against `base_url`.
    #[must_use]
    pub fn new(base_url: Url, origin_pincode: Option<String>) -> Self {
        Self {
            inner: Arc::new(DeliveryRateClientInner {
                client: reqwest::Client::new(),
                base_url,
                origin_pincode,
            }),
        }
    }

    fn endpoint(&self, fingerprint: &QuoteFingerprint) -> Result<Url, RateError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/shipping-cost"))
            .map_err(|e| RateError::Parse(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("d_pin", &fingerprint.pincode)
                .append_pair("cgm", &fingerprint.weight_grams.to_string())
                .append_pair("pt", PAYMENT_TYPE);
            if let Some(origin) = &self.inner.origin_pincode {
                query.append_pair("o_pin", origin);
            }
        }
        Ok(url)
    }
}

/// Parse a rate response body into a quote from its first entry.
fn parse_rate_response(body: &str) -> Result<ShippingQuote, RateError> {
    let entries: Vec<RateEntry> =
        serde_json::from_str(body).map_err(|e| RateError::Parse(e.to_string()))?;
    let first = entries.into_iter().next().ok_or(RateError::NoQuotes)?;

    match first.total_amount {
        Some(Value::Number(n)) => {
            let amount = n
                .as_f64()
                .ok_or_else(|| RateError::Parse(format!("amount out of range: {n}")))?;
            Ok(ShippingQuote::from_f64(amount)?)
        }
        Some(Value::String(s)) => Ok(ShippingQuote::from_amount_str(&s)?),
        Some(other) => Err(RateError::Parse(format!("unexpected amount: {other}"))),
        None => Err(RateError::Parse("missing total_amount".to_string())),
    }
}

#[async_trait]
impl RateLookup for DeliveryRateClient {
    #[instrument(skip(self), fields(pincode = %fingerprint.pincode, weight_grams = fingerprint.weight_grams))]
    async fn lookup(&self, fingerprint: &QuoteFingerprint) -> Result<ShippingQuote, RateError> {
        let url = self.endpoint(fingerprint)?;
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RateError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        parse_rate_response(&body)
    }
}

// =============================================================================
// ShippingEstimator
// =============================================================================

/// A quote together with the inputs it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatedQuote {
    pub fingerprint: QuoteFingerprint,
    pub quote: ShippingQuote,
}

/// A started estimate request. Pass it to [`ShippingEstimator::complete`].
#[derive(Debug)]
#[must_use = "an estimate ticket does nothing until completed"]
pub struct QuoteTicket {
    token: u64,
    fingerprint: QuoteFingerprint,
}

impl QuoteTicket {
    #[must_use]
    pub const fn fingerprint(&self) -> &QuoteFingerprint {
        &self.fingerprint
    }
}

/// Fail-soft shipping estimator with a stale-response guard.
///
/// Cheaply cloneable; clones share the request counter and current quote.
#[derive(Clone)]
pub struct ShippingEstimator {
    inner: Arc<ShippingEstimatorInner>,
}

struct ShippingEstimatorInner {
    rates: Arc<dyn RateLookup>,
    timeout: Duration,
    cache: Cache<QuoteFingerprint, ShippingQuote>,
    /// Token of the newest request issued.
    issued: AtomicU64,
    /// Token of the newest request that has been applied or cancelled.
    settled: AtomicU64,
    current: Mutex<Option<EstimatedQuote>>,
}

impl ShippingEstimator {
    /// Create an estimator. Valid quotes are cached for 5 minutes.
    #[must_use]
    pub fn new(rates: Arc<dyn RateLookup>, timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(ShippingEstimatorInner {
                rates,
                timeout,
                cache,
                issued: AtomicU64::new(0),
                settled: AtomicU64::new(0),
                current: Mutex::new(None),
            }),
        }
    }

    /// Quote for `fingerprint`. Never fails.
    ///
    /// Returns [`ShippingQuote::unavailable`] without a network call when the
    /// pincode is empty or the weight is zero, and on any lookup failure.
    #[instrument(skip(self), fields(pincode = %fingerprint.pincode, weight_grams = fingerprint.weight_grams))]
    pub async fn estimate(&self, fingerprint: &QuoteFingerprint) -> ShippingQuote {
        if !fingerprint.is_estimable() {
            debug!("Nothing to estimate");
            return ShippingQuote::unavailable();
        }

        if let Some(quote) = self.inner.cache.get(fingerprint).await {
            debug!("Shipping quote cache hit");
            return quote;
        }

        let result =
            match tokio::time::timeout(self.inner.timeout, self.inner.rates.lookup(fingerprint))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(RateError::Timeout),
            };

        match result {
            Ok(quote) if quote.is_valid() => {
                self.inner.cache.insert(fingerprint.clone(), quote).await;
                quote
            }
            Ok(_) => ShippingQuote::unavailable(),
            Err(e) => {
                warn!(error = %e, "Shipping estimate failed, continuing without a fee");
                ShippingQuote::unavailable()
            }
        }
    }

    /// Start a request for `fingerprint`, superseding any earlier one.
    pub fn begin(&self, fingerprint: QuoteFingerprint) -> QuoteTicket {
        let token = self.inner.issued.fetch_add(1, Ordering::AcqRel) + 1;
        QuoteTicket { token, fingerprint }
    }

    /// Run the request and apply its quote unless a newer request was begun
    /// (or the estimator was cancelled) meanwhile.
    ///
    /// Returns `None` when the response was discarded as stale.
    pub async fn complete(&self, ticket: QuoteTicket) -> Option<ShippingQuote> {
        let quote = self.estimate(&ticket.fingerprint).await;

        let mut current = self
            .inner
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.inner.issued.load(Ordering::Acquire) != ticket.token {
            debug!(fingerprint = %ticket.fingerprint, "Discarding stale shipping quote");
            return None;
        }
        *current = Some(EstimatedQuote {
            fingerprint: ticket.fingerprint,
            quote,
        });
        self.inner.settled.store(ticket.token, Ordering::Release);
        drop(current);

        Some(quote)
    }

    /// Begin and complete a request in one step.
    pub async fn refresh(&self, fingerprint: QuoteFingerprint) -> Option<ShippingQuote> {
        let ticket = self.begin(fingerprint);
        self.complete(ticket).await
    }

    /// Ignore every request currently in flight.
    pub fn cancel(&self) {
        let _guard = self
            .inner
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let token = self.inner.issued.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.settled.store(token, Ordering::Release);
    }

    /// Whether the newest request has not resolved yet.
    #[must_use]
    pub fn is_estimating(&self) -> bool {
        self.inner.issued.load(Ordering::Acquire) != self.inner.settled.load(Ordering::Acquire)
    }

    /// The most recently applied quote.
    #[must_use]
    pub fn current(&self) -> Option<EstimatedQuote> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The applied quote, if it was computed for `fingerprint`.
    #[must_use]
    pub fn quote_for(&self, fingerprint: &QuoteFingerprint) -> Option<ShippingQuote> {
        self.current()
            .filter(|estimate| &estimate.fingerprint == fingerprint)
            .map(|estimate| estimate.quote)
    }
}
