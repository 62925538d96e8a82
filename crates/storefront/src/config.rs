//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIREBASE_PROJECT_ID` - Firebase project hosting the Firestore database
//! - `FIREBASE_API_KEY` - Web API key for Firestore REST and Identity Toolkit
//!
//! ## Optional
//! - `FIRESTORE_COLLECTION` - Profile collection (default: userProfilesAndOrderStatus)
//! - `DELIVERY_API_BASE_URL` - Rate and pincode lookup service
//! - `SHIPPING_ORIGIN_PINCODE` - Warehouse pincode sent with rate lookups
//! - `FREE_SHIPPING_THRESHOLD` - Merchandise total for free shipping, rupees (default: 1000)
//! - `REQUEST_TIMEOUT_SECS` - Bound on every remote call (default: 15)
//! - `OTP_PROVIDER` - `lambda` or `firebase` (default: lambda)
//! - `OTP_LAMBDA_BASE_URL` - SMS gateway function URL
//! - `OTP_RESEND_COOLDOWN_SECS` - Seconds before a code can be resent (default: 30)
//! - `FIREBASE_RECAPTCHA_TOKEN` - App verification token for Firebase phone auth
//! - `DEVICE_STATE_PATH` - On-device state file (default: ./.krushi-sarthi/state.json)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry event sample rate (default: 1.0)

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_COLLECTION: &str = "userProfilesAndOrderStatus";
const DEFAULT_DELIVERY_API_BASE_URL: &str = "https://farmers-choice-admin.vercel.app/api/v1/delhivery";
const DEFAULT_OTP_LAMBDA_BASE_URL: &str =
    "https://l2rosu7sbeafj6rmenz4p2qd4i0owegl.lambda-url.ap-south-1.on.aws";
const DEFAULT_DEVICE_STATE_PATH: &str = "./.krushi-sarthi/state.json";

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which OTP provider sends verification codes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtpProviderKind {
    /// SMS gateway behind a serverless function.
    #[default]
    Lambda,
    /// Firebase Identity Toolkit phone auth.
    Firebase,
}

impl FromStr for OtpProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lambda" | "sms" => Ok(Self::Lambda),
            "firebase" => Ok(Self::Firebase),
            other => Err(format!("expected 'lambda' or 'firebase', got '{other}'")),
        }
    }
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Firebase project and Firestore settings
    pub firebase: FirebaseConfig,
    /// Rate and pincode lookup service base URL
    pub delivery_api_base_url: Url,
    /// Warehouse pincode, sent as the rate lookup origin when set
    pub shipping_origin_pincode: Option<String>,
    /// Merchandise total at or above which shipping is free
    pub free_shipping_threshold: Decimal,
    /// Bound on every remote call
    pub request_timeout: Duration,
    /// OTP verification settings
    pub otp: OtpConfig,
    /// On-device state file
    pub device_state_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry event sample rate
    pub sentry_sample_rate: f32,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: SecretString,
    /// Collection holding one profile document per phone number
    pub collection: String,
    pub recaptcha_token: Option<SecretString>,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("collection", &self.collection)
            .field(
                "recaptcha_token",
                &self.recaptcha_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// OTP verification configuration.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub provider: OtpProviderKind,
    pub lambda_base_url: Url,
    pub resend_cooldown: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let firebase = FirebaseConfig {
            project_id: env.required("FIREBASE_PROJECT_ID")?,
            api_key: env.validated_secret("FIREBASE_API_KEY")?,
            collection: env.or_default("FIRESTORE_COLLECTION", DEFAULT_COLLECTION),
            recaptcha_token: env.optional("FIREBASE_RECAPTCHA_TOKEN").map(SecretString::from),
        };

        let delivery_api_base_url = env.url("DELIVERY_API_BASE_URL", DEFAULT_DELIVERY_API_BASE_URL)?;
        let shipping_origin_pincode = env.optional("SHIPPING_ORIGIN_PINCODE");
        let free_shipping_threshold = env.parsed::<Decimal>("FREE_SHIPPING_THRESHOLD", "1000")?;
        if free_shipping_threshold.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "FREE_SHIPPING_THRESHOLD".to_string(),
                "must not be negative".to_string(),
            ));
        }
        let request_timeout =
            Duration::from_secs(env.parsed::<u64>("REQUEST_TIMEOUT_SECS", "15")?);

        let otp = OtpConfig {
            provider: env.parsed::<OtpProviderKind>("OTP_PROVIDER", "lambda")?,
            lambda_base_url: env.url("OTP_LAMBDA_BASE_URL", DEFAULT_OTP_LAMBDA_BASE_URL)?,
            resend_cooldown: Duration::from_secs(
                env.parsed::<u64>("OTP_RESEND_COOLDOWN_SECS", "30")?,
            ),
        };

        let device_state_path =
            PathBuf::from(env.or_default("DEVICE_STATE_PATH", DEFAULT_DEVICE_STATE_PATH));

        let sentry_sample_rate = env.parsed::<f32>("SENTRY_SAMPLE_RATE", "1.0")?;
        if !(0.0..=1.0).contains(&sentry_sample_rate) {
            return Err(ConfigError::InvalidEnvVar(
                "SENTRY_SAMPLE_RATE".to_string(),
                "must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(Self {
            firebase,
            delivery_api_base_url,
            shipping_origin_pincode,
            free_shipping_threshold,
            request_timeout,
            otp,
            device_state_path,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
        })
    }
}

impl FirebaseConfig {
    /// The API key, for query strings.
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn url(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        self.parsed::<Url>(key, default)
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const API_KEY: &str = "AIzaSyB3xQ9mK2nL5pR7tV0wZ4cF6hJ8";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("FIREBASE_PROJECT_ID", "krushi-sarthi"),
            ("FIREBASE_API_KEY", API_KEY),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::from_lookup(lookup(&minimal())).unwrap();
        assert_eq!(config.firebase.collection, "userProfilesAndOrderStatus");
        assert_eq!(config.free_shipping_threshold, Decimal::from(1000));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.otp.provider, OtpProviderKind::Lambda);
        assert_eq!(config.otp.resend_cooldown, Duration::from_secs(30));
        assert_eq!(
            config.delivery_api_base_url.as_str(),
            "https://farmers-choice-admin.vercel.app/api/v1/delhivery"
        );
        assert!(config.shipping_origin_pincode.is_none());
        assert!((config.sentry_sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_required() {
        let err = StorefrontConfig::from_lookup(lookup(&[("FIREBASE_API_KEY", API_KEY)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "FIREBASE_PROJECT_ID"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = StorefrontConfig::from_lookup(lookup(&[
            ("FIREBASE_PROJECT_ID", "  "),
            ("FIREBASE_API_KEY", API_KEY),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn test_invalid_numbers() {
        for (key, value) in [
            ("FREE_SHIPPING_THRESHOLD", "lots"),
            ("FREE_SHIPPING_THRESHOLD", "-5"),
            ("REQUEST_TIMEOUT_SECS", "soon"),
            ("SENTRY_SAMPLE_RATE", "2.5"),
            ("OTP_PROVIDER", "carrier-pigeon"),
        ] {
            let mut pairs = minimal();
            pairs.push((key, value));
            let err = StorefrontConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == key),
                "{key}={value} gave {err}"
            );
        }
    }

    #[test]
    fn test_overrides() {
        let mut pairs = minimal();
        pairs.extend([
            ("OTP_PROVIDER", "Firebase"),
            ("FREE_SHIPPING_THRESHOLD", "499.50"),
            ("SHIPPING_ORIGIN_PINCODE", "411001"),
            ("DEVICE_STATE_PATH", "/tmp/ks/state.json"),
        ]);
        let config = StorefrontConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.otp.provider, OtpProviderKind::Firebase);
        assert_eq!(config.free_shipping_threshold, Decimal::new(49950, 2));
        assert_eq!(config.shipping_origin_pincode.as_deref(), Some("411001"));
        assert_eq!(config.device_state_path, PathBuf::from("/tmp/ks/state.json"));
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(API_KEY, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_firebase_config_debug_redacts_secrets() {
        let config = FirebaseConfig {
            project_id: "krushi-sarthi".to_string(),
            api_key: SecretString::from("super_secret_api_key"),
            collection: DEFAULT_COLLECTION.to_string(),
            recaptcha_token: Some(SecretString::from("super_secret_recaptcha")),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("krushi-sarthi"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_api_key"));
        assert!(!debug_output.contains("super_secret_recaptcha"));
    }
}
