//! Stripe configuration.

use std::time::Duration;

use crate::error::{StripeError, StripeResult};

/// Default API base.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Default webhook timestamp tolerance.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Platform secret key (`sk_...`)
    pub secret_key: String,
    /// Endpoint signing secret (`whsec_...`)
    pub webhook_secret: String,
    /// API base URL, overridable for tests
    pub api_base: String,
    /// Accepted clock skew for webhook timestamps
    pub webhook_tolerance_secs: i64,
    /// Request timeout
    pub timeout: Duration,
}

impl StripeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StripeResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StripeError::config("STRIPE_SECRET_KEY not set"))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();

        Ok(Self {
            secret_key,
            webhook_secret,
            api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            webhook_tolerance_secs: std::env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS),
            timeout: Duration::from_secs(30),
        })
    }

    /// Config pointing at an arbitrary base URL.
    pub fn with_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: String::new(),
            api_base: api_base.into(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
            timeout: Duration::from_secs(30),
        }
    }
}
