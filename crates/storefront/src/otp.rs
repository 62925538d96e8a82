//! Phone verification by one-time password.
//!
//! Two interchangeable providers can deliver codes: an SMS gateway behind a
//! serverless function, and Firebase phone auth. The customer picks one; the
//! code is always verified (and resent) through the provider that actually
//! sent it, even if the selection changes in between.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use krushi_sarthi_core::{Address, PhoneError, PhoneNumber};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use url::Url;

use crate::config::{FirebaseConfig, OtpConfig, OtpProviderKind};
use crate::error::set_sentry_user;
use crate::notice::Notice;
use crate::state::AppState;

const IDENTITY_TOOLKIT_API: &str = "https://identitytoolkit.googleapis.com/v1";

/// Minimum number of digits in a code.
pub const MIN_CODE_DIGITS: usize = 4;

/// Hint shown after a code is sent.
pub const SENT_HINT: &str = "OTP sent! If SMS delays, you might get a quick call.";

/// Errors from OTP sending and verification.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Enter valid 10-digit mobile number")]
    InvalidPhone(#[from] PhoneError),

    #[error("Enter a valid OTP")]
    InvalidCode,

    #[error("No OTP has been sent yet")]
    NotSent,

    #[error("Please wait {remaining_secs}s before requesting another OTP")]
    CooldownActive { remaining_secs: u64 },

    /// The provider refused to send or did not accept the code.
    #[error("Rejected by provider: {0}")]
    Rejected(String),

    #[error("Too many requests. Please try again later.")]
    TooManyRequests,

    #[error("Provider is not configured: {0}")]
    NotConfigured(&'static str),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("OTP request timed out")]
    Timeout,
}

impl OtpError {
    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// A code sent to a phone, with whatever the provider needs to verify it.
#[derive(Debug, Clone)]
pub struct OtpSession {
    pub phone: PhoneNumber,
    /// Provider-specific verification handle (Firebase `sessionInfo`).
    pub handle: Option<String>,
}

/// A service that sends and verifies one-time passwords.
#[async_trait]
pub trait OtpProvider: Send + Sync {
    fn kind(&self) -> OtpProviderKind;

    /// Notice text after a successful send.
    fn sent_message(&self) -> &'static str;

    async fn send(&self, phone: &PhoneNumber) -> Result<OtpSession, OtpError>;

    async fn verify(&self, session: &OtpSession, code: &str) -> Result<(), OtpError>;
}

// =============================================================================
// LambdaOtpProvider
// =============================================================================

/// SMS gateway behind a serverless function.
#[derive(Clone)]
pub struct LambdaOtpProvider {
    inner: Arc<LambdaOtpProviderInner>,
}

struct LambdaOtpProviderInner {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LambdaSendResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct LambdaVerifyResponse {
    status: String,
    details: String,
}

impl LambdaOtpProvider {
    #[must_use]
    pub fn new(config: &OtpConfig, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(LambdaOtpProviderInner {
                client: reqwest::Client::new(),
                base_url: config.lambda_base_url.clone(),
                timeout,
            }),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, OtpError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| OtpError::Parse(e.to_string()))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(u16, String), OtpError> {
        let response = self
            .inner
            .client
            .post(self.endpoint(path)?)
            .timeout(self.inner.timeout)
            .json(&body)
            .send()
            .await
            .map_err(OtpError::from_send)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(OtpError::from_send)?;
        Ok((status, text))
    }
}

fn check_lambda_send(status: u16, body: &str) -> Result<(), OtpError> {
    let parsed: LambdaSendResponse = serde_json::from_str(body).unwrap_or_default();
    if status == 200 && parsed.ok {
        return Ok(());
    }
    if status == 429 {
        return Err(OtpError::TooManyRequests);
    }
    Err(OtpError::Rejected(
        parsed
            .error
            .unwrap_or_else(|| "Failed to send OTP".to_string()),
    ))
}

fn check_lambda_verify(status: u16, body: &str) -> Result<(), OtpError> {
    let parsed: LambdaVerifyResponse = serde_json::from_str(body).unwrap_or_default();
    if status == 200 && parsed.status == "Success" && parsed.details == "OTP Matched" {
        return Ok(());
    }
    let reason = if parsed.details.is_empty() {
        "OTP verification failed".to_string()
    } else {
        parsed.details
    };
    Err(OtpError::Rejected(reason))
}

#[async_trait]
impl OtpProvider for LambdaOtpProvider {
    fn kind(&self) -> OtpProviderKind {
        OtpProviderKind::Lambda
    }

    fn sent_message(&self) -> &'static str {
        "OTP sent via SMS (Lambda)"
    }

    #[instrument(skip(self, phone), fields(phone = %phone))]
    async fn send(&self, phone: &PhoneNumber) -> Result<OtpSession, OtpError> {
        let (status, body) = self
            .post("/otp/send", json!({ "phone": phone.e164() }))
            .await?;
        check_lambda_send(status, &body)?;
        Ok(OtpSession {
            phone: phone.clone(),
            handle: None,
        })
    }

    #[instrument(skip(self, session, code), fields(phone = %session.phone))]
    async fn verify(&self, session: &OtpSession, code: &str) -> Result<(), OtpError> {
        let (status, body) = self
            .post(
                "/otp/verify",
                json!({ "phone": session.phone.e164(), "otp": code }),
            )
            .await?;
        check_lambda_verify(status, &body)
    }
}

// =============================================================================
// FirebasePhoneAuth
// =============================================================================

/// Firebase Identity Toolkit phone authentication.
#[derive(Clone)]
pub struct FirebasePhoneAuth {
    inner: Arc<FirebasePhoneAuthInner>,
}

struct FirebasePhoneAuthInner {
    client: reqwest::Client,
    api_key: SecretString,
    recaptcha_token: Option<SecretString>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendVerificationCodeResponse {
    session_info: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentityToolkitErrorBody {
    error: IdentityToolkitError,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentityToolkitError {
    message: String,
}

impl FirebasePhoneAuth {
    #[must_use]
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(FirebasePhoneAuthInner {
                client: reqwest::Client::new(),
                api_key: config.api_key.clone(),
                recaptcha_token: config.recaptcha_token.clone(),
                timeout,
            }),
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<String, OtpError> {
        let mut url = Url::parse(&format!("{IDENTITY_TOOLKIT_API}/accounts:{method}"))
            .map_err(|e| OtpError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());

        let response = self
            .inner
            .client
            .post(url)
            .timeout(self.inner.timeout)
            .json(&body)
            .send()
            .await
            .map_err(OtpError::from_send)?;
        let status = response.status();
        let text = response.text().await.map_err(OtpError::from_send)?;

        if status.is_success() {
            return Ok(text);
        }
        Err(identity_toolkit_error(&text))
    }
}

fn identity_toolkit_error(body: &str) -> OtpError {
    let parsed: IdentityToolkitErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.error.message;
    if message.starts_with("TOO_MANY_ATTEMPTS") || message.starts_with("QUOTA_EXCEEDED") {
        OtpError::TooManyRequests
    } else if message.starts_with("INVALID_PHONE_NUMBER") {
        OtpError::Rejected("Invalid phone number. Try again.".to_string())
    } else if message.is_empty() {
        OtpError::Rejected("Firebase request failed".to_string())
    } else {
        OtpError::Rejected(message)
    }
}

#[async_trait]
impl OtpProvider for FirebasePhoneAuth {
    fn kind(&self) -> OtpProviderKind {
        OtpProviderKind::Firebase
    }

    fn sent_message(&self) -> &'static str {
        "OTP sent via Firebase"
    }

    #[instrument(skip(self, phone), fields(phone = %phone))]
    async fn send(&self, phone: &PhoneNumber) -> Result<OtpSession, OtpError> {
        let recaptcha = self
            .inner
            .recaptcha_token
            .as_ref()
            .ok_or(OtpError::NotConfigured("FIREBASE_RECAPTCHA_TOKEN"))?;

        let body = self
            .call(
                "sendVerificationCode",
                json!({
                    "phoneNumber": phone.e164(),
                    "recaptchaToken": recaptcha.expose_secret(),
                }),
            )
            .await?;
        let response: SendVerificationCodeResponse =
            serde_json::from_str(&body).map_err(|e| OtpError::Parse(e.to_string()))?;

        Ok(OtpSession {
            phone: phone.clone(),
            handle: Some(response.session_info),
        })
    }

    #[instrument(skip(self, session, code), fields(phone = %session.phone))]
    async fn verify(&self, session: &OtpSession, code: &str) -> Result<(), OtpError> {
        let session_info = session.handle.as_deref().ok_or(OtpError::NotSent)?;
        self.call(
            "signInWithPhoneNumber",
            json!({ "sessionInfo": session_info, "code": code }),
        )
        .await?;
        Ok(())
    }
}

// =============================================================================
// PhoneVerification
// =============================================================================

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verified {
    /// The saved delivery address was loaded into app state.
    AddressLoaded(Address),
    /// No saved address; the customer should fill in this pre-filled draft.
    NeedsAddress(Address),
}

struct PendingCode {
    session: OtpSession,
    provider: Arc<dyn OtpProvider>,
    sent_at: Instant,
}

/// The send / resend / verify flow for one customer.
pub struct PhoneVerification {
    state: AppState,
    providers: Vec<Arc<dyn OtpProvider>>,
    selected: std::sync::Mutex<OtpProviderKind>,
    cooldown: Duration,
    pending: Mutex<Option<PendingCode>>,
}

impl PhoneVerification {
    /// Create a verification flow over `providers`, starting with `selected`.
    #[must_use]
    pub fn new(
        state: AppState,
        providers: Vec<Arc<dyn OtpProvider>>,
        selected: OtpProviderKind,
        cooldown: Duration,
    ) -> Self {
        Self {
            state,
            providers,
            selected: std::sync::Mutex::new(selected),
            cooldown,
            pending: Mutex::new(None),
        }
    }

    /// Both production providers, configured from `state`.
    #[must_use]
    pub fn from_config(state: AppState) -> Self {
        let config = state.config();
        let providers: Vec<Arc<dyn OtpProvider>> = vec![
            Arc::new(LambdaOtpProvider::new(&config.otp, config.request_timeout)),
            Arc::new(FirebasePhoneAuth::new(
                &config.firebase,
                config.request_timeout,
            )),
        ];
        let selected = config.otp.provider;
        let cooldown = config.otp.resend_cooldown;
        Self::new(state, providers, selected, cooldown)
    }

    /// Choose the provider for the next send.
    pub fn select(&self, kind: OtpProviderKind) {
        *self
            .selected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = kind;
    }

    fn selected_provider(&self) -> Result<Arc<dyn OtpProvider>, OtpError> {
        let kind = *self
            .selected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.providers
            .iter()
            .find(|p| p.kind() == kind)
            .cloned()
            .ok_or(OtpError::NotConfigured("selected OTP provider"))
    }

    /// Seconds left before another code may be requested.
    pub async fn resend_remaining(&self) -> Duration {
        self.pending.lock().await.as_ref().map_or(Duration::ZERO, |p| {
            self.cooldown.saturating_sub(p.sent_at.elapsed())
        })
    }

    /// Send a code to `raw_phone` through the selected provider.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed phone number, while the resend
    /// cooldown for the same number is running, or if the provider fails.
    #[instrument(skip(self))]
    pub async fn send(&self, raw_phone: &str) -> Result<(), OtpError> {
        let result = self.send_inner(raw_phone).await;
        match &result {
            Ok(message) => self.state.notify(Notice::success(*message)),
            Err(e) => self.state.notify(Notice::error(send_failure_message(e))),
        }
        result.map(|_| ())
    }

    async fn send_inner(&self, raw_phone: &str) -> Result<&'static str, OtpError> {
        let phone = PhoneNumber::parse(raw_phone)?;
        let provider = self.selected_provider()?;

        let mut pending = self.pending.lock().await;
        if let Some(existing) = pending.as_ref()
            && existing.session.phone == phone
        {
            let remaining = self.cooldown.saturating_sub(existing.sent_at.elapsed());
            if !remaining.is_zero() {
                return Err(OtpError::CooldownActive {
                    remaining_secs: remaining.as_secs().max(1),
                });
            }
        }

        let session = provider.send(&phone).await?;
        info!(provider = ?provider.kind(), "OTP sent");
        let message = provider.sent_message();
        *pending = Some(PendingCode {
            session,
            provider,
            sent_at: Instant::now(),
        });
        Ok(message)
    }

    /// Resend through the provider that sent the last code.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::NotSent`] if nothing was sent yet, or
    /// [`OtpError::CooldownActive`] while the cooldown is running.
    #[instrument(skip(self))]
    pub async fn resend(&self) -> Result<(), OtpError> {
        let result = self.resend_inner().await;
        match &result {
            Ok(()) => self.state.notify(Notice::success("OTP resent")),
            Err(e) => self.state.notify(Notice::error(send_failure_message(e))),
        }
        result
    }

    async fn resend_inner(&self) -> Result<(), OtpError> {
        let mut pending = self.pending.lock().await;
        let existing = pending.as_ref().ok_or(OtpError::NotSent)?;

        let remaining = self.cooldown.saturating_sub(existing.sent_at.elapsed());
        if !remaining.is_zero() {
            return Err(OtpError::CooldownActive {
                remaining_secs: remaining.as_secs().max(1),
            });
        }

        let provider = Arc::clone(&existing.provider);
        let session = provider.send(&existing.session.phone).await?;
        *pending = Some(PendingCode {
            session,
            provider,
            sent_at: Instant::now(),
        });
        Ok(())
    }

    /// Verify `code`, then load the customer's saved address.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidCode`] for codes shorter than four digits,
    /// [`OtpError::NotSent`] before a send, or the provider's rejection.
    #[instrument(skip(self, code))]
    pub async fn verify(&self, code: &str) -> Result<Verified, OtpError> {
        let code = code.trim();
        if code.len() < MIN_CODE_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            self.state.notify(Notice::error(OtpError::InvalidCode.to_string()));
            return Err(OtpError::InvalidCode);
        }

        let mut pending = self.pending.lock().await;
        let Some(current) = pending.as_ref() else {
            self.state.notify(Notice::error("Please request an OTP first"));
            return Err(OtpError::NotSent);
        };

        if let Err(e) = current.provider.verify(&current.session, code).await {
            warn!(error = %e, "OTP verification failed");
            self.state.notify(Notice::error(verify_failure_message(&e)));
            return Err(e);
        }

        let phone = current.session.phone.clone();
        *pending = None;
        drop(pending);

        set_sentry_user(phone.profile_key());
        Ok(self.load_or_prompt_address(&phone).await)
    }

    async fn load_or_prompt_address(&self, phone: &PhoneNumber) -> Verified {
        match self.state.load_remote_address(phone).await {
            Ok(Some(address)) => {
                self.state
                    .notify(Notice::success("Verified & address loaded"));
                Verified::AddressLoaded(address)
            }
            Ok(None) => {
                self.state
                    .notify(Notice::info("Verified. Please add your delivery address"));
                Verified::NeedsAddress(Address::for_phone(phone))
            }
            Err(e) => {
                warn!(error = %e, "Could not load saved address after verification");
                self.state
                    .notify(Notice::info("Verified. Please add your delivery address"));
                Verified::NeedsAddress(Address::for_phone(phone))
            }
        }
    }
}

fn send_failure_message(err: &OtpError) -> String {
    match err {
        OtpError::InvalidPhone(_)
        | OtpError::CooldownActive { .. }
        | OtpError::TooManyRequests
        | OtpError::NotSent => err.to_string(),
        OtpError::Rejected(reason) => reason.clone(),
        _ => "Failed to send OTP. Please try again.".to_string(),
    }
}

fn verify_failure_message(err: &OtpError) -> String {
    match err {
        OtpError::InvalidCode | OtpError::Rejected(_) => {
            "Incorrect OTP. Please try again.".to_string()
        }
        OtpError::TooManyRequests | OtpError::NotSent => err.to_string(),
        _ => "Could not verify OTP. Please check your connection and try again.".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lambda_send_response() {
        assert!(check_lambda_send(200, r#"{"ok":true}"#).is_ok());
        assert!(matches!(
            check_lambda_send(200, r#"{"ok":false,"error":"DND number"}"#),
            Err(OtpError::Rejected(reason)) if reason == "DND number"
        ));
        assert!(matches!(
            check_lambda_send(500, "gateway down"),
            Err(OtpError::Rejected(_))
        ));
        assert!(matches!(
            check_lambda_send(429, ""),
            Err(OtpError::TooManyRequests)
        ));
    }

    #[test]
    fn test_lambda_verify_response() {
        assert!(check_lambda_verify(200, r#"{"Status":"Success","Details":"OTP Matched"}"#).is_ok());
        assert!(matches!(
            check_lambda_verify(200, r#"{"Status":"Error","Details":"OTP Mismatch"}"#),
            Err(OtpError::Rejected(reason)) if reason == "OTP Mismatch"
        ));
        assert!(check_lambda_verify(502, "").is_err());
    }

    #[test]
    fn test_identity_toolkit_errors() {
        assert!(matches!(
            identity_toolkit_error(r#"{"error":{"message":"TOO_MANY_ATTEMPTS_TRY_LATER"}}"#),
            OtpError::TooManyRequests
        ));
        assert!(matches!(
            identity_toolkit_error(r#"{"error":{"message":"INVALID_CODE"}}"#),
            OtpError::Rejected(reason) if reason == "INVALID_CODE"
        ));
        assert!(matches!(
            identity_toolkit_error("<html>"),
            OtpError::Rejected(_)
        ));
    }

    #[test]
    fn test_send_failure_messages() {
        assert_eq!(
            send_failure_message(&OtpError::InvalidPhone(PhoneError::Empty)),
            "Enter valid 10-digit mobile number"
        );
        assert_eq!(
            send_failure_message(&OtpError::Timeout),
            "Failed to send OTP. Please try again."
        );
    }

    #[test]
    fn test_verify_failure_messages() {
        assert_eq!(
            verify_failure_message(&OtpError::Rejected("OTP Mismatch".to_string())),
            "Incorrect OTP. Please try again."
        );
        assert_eq!(
            verify_failure_message(&OtpError::Timeout),
            "Could not verify OTP. Please check your connection and try again."
        );
        assert_eq!(
            verify_failure_message(&OtpError::Parse("not json".to_string())),
            "Could not verify OTP. Please check your connection and try again."
        );
    }
}
