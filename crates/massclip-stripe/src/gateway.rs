//! Payment gateway seam used by the API services.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::StripeClient;
use crate::error::StripeResult;
use crate::types::{
    Account, AccountLink, Balance, BalanceTransaction, Charge, CheckoutSession,
    CheckoutSessionParams, IdentitySubmission, List, Payout, Price, Product,
};

pub type SharedGateway = Arc<dyn PaymentGateway>;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_express_account(&self, email: Option<&str>, uid: &str)
        -> StripeResult<Account>;

    async fn retrieve_account(&self, account_id: &str) -> StripeResult<Account>;

    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> StripeResult<AccountLink>;

    async fn update_account_identity(
        &self,
        account_id: &str,
        identity: &IdentitySubmission,
    ) -> StripeResult<Account>;

    /// Create a product, optionally on a connected account.
    async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
        account: Option<&str>,
    ) -> StripeResult<Product>;

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        account: Option<&str>,
    ) -> StripeResult<Price>;

    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> StripeResult<CheckoutSession>;

    /// Retrieve a session, looking on the connected account when given.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        account: Option<&str>,
    ) -> StripeResult<CheckoutSession>;

    async fn retrieve_balance(&self, account: &str) -> StripeResult<Balance>;

    async fn list_balance_transactions(
        &self,
        account: &str,
        limit: u32,
    ) -> StripeResult<List<BalanceTransaction>>;

    async fn list_charges(&self, account: &str, limit: u32) -> StripeResult<List<Charge>>;

    async fn list_payouts(&self, account: &str, limit: u32) -> StripeResult<List<Payout>>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_express_account(
        &self,
        email: Option<&str>,
        uid: &str,
    ) -> StripeResult<Account> {
        StripeClient::create_express_account(self, email, uid).await
    }

    async fn retrieve_account(&self, account_id: &str) -> StripeResult<Account> {
        StripeClient::retrieve_account(self, account_id).await
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> StripeResult<AccountLink> {
        StripeClient::create_account_link(self, account_id, refresh_url, return_url).await
    }

    async fn update_account_identity(
        &self,
        account_id: &str,
        identity: &IdentitySubmission,
    ) -> StripeResult<Account> {
        StripeClient::update_account_identity(self, account_id, identity).await
    }

    async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
        account: Option<&str>,
    ) -> StripeResult<Product> {
        StripeClient::create_product(self, name, description, account).await
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        account: Option<&str>,
    ) -> StripeResult<Price> {
        StripeClient::create_price(self, product_id, unit_amount, currency, account).await
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> StripeResult<CheckoutSession> {
        StripeClient::create_checkout_session(self, params).await
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        account: Option<&str>,
    ) -> StripeResult<CheckoutSession> {
        StripeClient::retrieve_checkout_session(self, session_id, account).await
    }

    async fn retrieve_balance(&self, account: &str) -> StripeResult<Balance> {
        StripeClient::retrieve_balance(self, account).await
    }

    async fn list_balance_transactions(
        &self,
        account: &str,
        limit: u32,
    ) -> StripeResult<List<BalanceTransaction>> {
        StripeClient::list_balance_transactions(self, account, limit).await
    }

    async fn list_charges(&self, account: &str, limit: u32) -> StripeResult<List<Charge>> {
        StripeClient::list_charges(self, account, limit).await
    }

    async fn list_payouts(&self, account: &str, limit: u32) -> StripeResult<List<Payout>> {
        StripeClient::list_payouts(self, account, limit).await
    }
}
