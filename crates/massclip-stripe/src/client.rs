//! Stripe REST client.
//!
//! Requests are form encoded with bearer auth. Calls made on behalf of a
//! connected account carry the `Stripe-Account` header.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::StripeConfig;
use crate::error::{StripeError, StripeResult};
use crate::types::{
    Account, AccountLink, Balance, BalanceTransaction, Charge, CheckoutSession,
    CheckoutSessionParams, IdentitySubmission, List, Payout, Price, Product,
};

const REQUESTS_TOTAL: &str = "stripe_requests_total";
const LATENCY_SECONDS: &str = "stripe_latency_seconds";

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> StripeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("massclip-stripe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> StripeResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base, path.trim_start_matches('/'))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        form: &[(String, String)],
        account: Option<&str>,
    ) -> StripeResult<T> {
        let url = self.url(path);
        let span = info_span!("stripe_request", operation, path);

        async {
            let start = Instant::now();
            let mut builder = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.config.secret_key);
            if let Some(account) = account {
                builder = builder.header("Stripe-Account", account);
            }
            builder = if method == Method::GET {
                builder.query(form)
            } else {
                builder.form(form)
            };

            let result = builder.send().await;
            let latency = start.elapsed().as_secs_f64();
            let response = match result {
                Ok(r) => r,
                Err(e) => {
                    record(operation, 0, latency);
                    return Err(StripeError::Network(e));
                }
            };
            let status = response.status().as_u16();
            record(operation, status, latency);
            debug!(status, latency_ms = latency * 1000.0, "stripe response");

            if !response.status().is_success() {
                return Err(Self::error_from(status, response).await);
            }
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| StripeError::InvalidResponse(format!("{}: {}", operation, e)))
        }
        .instrument(span)
        .await
    }

    async fn error_from(status: u16, response: Response) -> StripeError {
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => {
                let message = envelope
                    .error
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status));
                warn!(status, code = ?envelope.error.code, "stripe api error: {}", message);
                StripeError::Api {
                    status,
                    error_type: envelope.error.error_type,
                    code: envelope.error.code,
                    message,
                }
            }
            Err(_) => StripeError::Api {
                status,
                error_type: None,
                code: None,
                message: body,
            },
        }
    }

    // =========================================================================
    // Connect accounts
    // =========================================================================

    /// Create an Express account with card payments and transfers requested.
    pub async fn create_express_account(
        &self,
        email: Option<&str>,
        uid: &str,
    ) -> StripeResult<Account> {
        let mut form = vec![
            ("type".to_string(), "express".to_string()),
            (
                "capabilities[card_payments][requested]".to_string(),
                "true".to_string(),
            ),
            (
                "capabilities[transfers][requested]".to_string(),
                "true".to_string(),
            ),
            ("metadata[uid]".to_string(), uid.to_string()),
        ];
        if let Some(email) = email {
            form.push(("email".to_string(), email.to_string()));
        }
        self.request("create_account", Method::POST, "accounts", &form, None)
            .await
    }

    pub async fn retrieve_account(&self, account_id: &str) -> StripeResult<Account> {
        self.request(
            "retrieve_account",
            Method::GET,
            &format!("accounts/{}", account_id),
            &[],
            None,
        )
        .await
    }

    pub async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> StripeResult<AccountLink> {
        let form = vec![
            ("account".to_string(), account_id.to_string()),
            ("refresh_url".to_string(), refresh_url.to_string()),
            ("return_url".to_string(), return_url.to_string()),
            ("type".to_string(), "account_onboarding".to_string()),
        ];
        self.request("create_account_link", Method::POST, "account_links", &form, None)
            .await
    }

    pub async fn update_account_identity(
        &self,
        account_id: &str,
        identity: &IdentitySubmission,
    ) -> StripeResult<Account> {
        self.request(
            "update_account",
            Method::POST,
            &format!("accounts/{}", account_id),
            &identity.to_form(),
            None,
        )
        .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
        account: Option<&str>,
    ) -> StripeResult<Product> {
        let mut form = vec![("name".to_string(), name.to_string())];
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            form.push(("description".to_string(), description.to_string()));
        }
        self.request("create_product", Method::POST, "products", &form, account)
            .await
    }

    pub async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        account: Option<&str>,
    ) -> StripeResult<Price> {
        let form = vec![
            ("product".to_string(), product_id.to_string()),
            ("unit_amount".to_string(), unit_amount.to_string()),
            ("currency".to_string(), currency.to_string()),
        ];
        self.request("create_price", Method::POST, "prices", &form, account)
            .await
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> StripeResult<CheckoutSession> {
        self.request(
            "create_checkout_session",
            Method::POST,
            "checkout/sessions",
            &params.to_form(),
            None,
        )
        .await
    }

    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        account: Option<&str>,
    ) -> StripeResult<CheckoutSession> {
        self.request(
            "retrieve_checkout_session",
            Method::GET,
            &format!("checkout/sessions/{}", session_id),
            &[],
            account,
        )
        .await
    }

    // =========================================================================
    // Balances and payouts (connected account scope)
    // =========================================================================

    pub async fn retrieve_balance(&self, account: &str) -> StripeResult<Balance> {
        self.request("retrieve_balance", Method::GET, "balance", &[], Some(account))
            .await
    }

    pub async fn list_balance_transactions(
        &self,
        account: &str,
        limit: u32,
    ) -> StripeResult<List<BalanceTransaction>> {
        self.request(
            "list_balance_transactions",
            Method::GET,
            "balance_transactions",
            &limit_param(limit),
            Some(account),
        )
        .await
    }

    pub async fn list_charges(&self, account: &str, limit: u32) -> StripeResult<List<Charge>> {
        self.request("list_charges", Method::GET, "charges", &limit_param(limit), Some(account))
            .await
    }

    pub async fn list_payouts(&self, account: &str, limit: u32) -> StripeResult<List<Payout>> {
        self.request("list_payouts", Method::GET, "payouts", &limit_param(limit), Some(account))
            .await
    }
}

fn limit_param(limit: u32) -> Vec<(String, String)> {
    vec![("limit".to_string(), limit.clamp(1, 100).to_string())]
}

fn record(operation: &'static str, status: u16, latency_secs: f64) {
    counter!(REQUESTS_TOTAL, "operation" => operation, "status" => status.to_string())
        .increment(1);
    histogram!(LATENCY_SECONDS, "operation" => operation).record(latency_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_version_prefix() {
        let client = StripeClient::new(StripeConfig::with_base("sk", "http://localhost:1")).unwrap();
        assert_eq!(client.url("/accounts/a"), "http://localhost:1/v1/accounts/a");
        assert_eq!(client.url("balance"), "http://localhost:1/v1/balance");
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(limit_param(0)[0].1, "1");
        assert_eq!(limit_param(500)[0].1, "100");
    }
}
