//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Frontend origin used for checkout and onboarding redirects
    pub app_base_url: String,
    /// Platform fee taken on checkout, in percent of the price
    pub platform_fee_percent: f64,
    /// Enables `POST /api/purchase/grant-immediate-access`
    pub allow_unverified_access_grants: bool,
    /// How long a cached payout status is served without asking the gateway
    pub status_cache_ttl: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
            environment: "development".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            platform_fee_percent: 0.0,
            allow_unverified_access_grants: false,
            status_cache_ttl: Duration::from_secs(300),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            request_timeout: env_parse("REQUEST_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            app_base_url: std::env::var("APP_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.app_base_url),
            platform_fee_percent: env_parse::<f64>("PLATFORM_FEE_PERCENT")
                .filter(|p| (0.0..100.0).contains(p))
                .unwrap_or(defaults.platform_fee_percent),
            allow_unverified_access_grants: env_flag("ALLOW_UNVERIFIED_ACCESS_GRANTS"),
            status_cache_ttl: env_parse("STATUS_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.status_cache_ttl),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Platform fee in minor units for a charge of `unit_amount`.
    pub fn platform_fee(&self, unit_amount: i64) -> Option<i64> {
        let fee = (unit_amount as f64 * self.platform_fee_percent / 100.0).round() as i64;
        (fee > 0).then_some(fee)
    }
}

/// Webhook endpoint settings.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub secret: String,
    pub tolerance_secs: i64,
}

impl From<&massclip_stripe::StripeConfig> for WebhookSettings {
    fn from(config: &massclip_stripe::StripeConfig) -> Self {
        Self {
            secret: config.webhook_secret.clone(),
            tolerance_secs: config.webhook_tolerance_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_reads_payment_settings() {
        std::env::set_var("APP_BASE_URL", "https://massclip.test/");
        std::env::set_var("PLATFORM_FEE_PERCENT", "10");
        std::env::set_var("ALLOW_UNVERIFIED_ACCESS_GRANTS", "true");
        std::env::set_var("STATUS_CACHE_TTL_SECS", "60");

        let config = ApiConfig::from_env();
        assert_eq!(config.app_base_url, "https://massclip.test");
        assert_eq!(config.platform_fee(999), Some(100));
        assert!(config.allow_unverified_access_grants);
        assert_eq!(config.status_cache_ttl, Duration::from_secs(60));

        for key in [
            "APP_BASE_URL",
            "PLATFORM_FEE_PERCENT",
            "ALLOW_UNVERIFIED_ACCESS_GRANTS",
            "STATUS_CACHE_TTL_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_disable_bypass_and_fee() {
        std::env::remove_var("ALLOW_UNVERIFIED_ACCESS_GRANTS");
        std::env::remove_var("PLATFORM_FEE_PERCENT");
        let config = ApiConfig::from_env();
        assert!(!config.allow_unverified_access_grants);
        assert_eq!(config.platform_fee(999), None);
        assert_eq!(config.status_cache_ttl, Duration::from_secs(300));
    }
}
