//! Shared fixtures for router tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value as Json;
use sha2::Sha256;
use tower::ServiceExt;

use massclip_api::auth::{AuthUser, SharedVerifier, TokenVerifier};
use massclip_api::{create_router, ApiConfig, ApiError, ApiResult, AppState, WebhookSettings};
use massclip_firestore::{
    BundleRepository, MemoryStore, UploadRepository, UserRepository,
};
use massclip_models::{new_id, Bundle, Upload, UploadType, UserProfile};
use massclip_storage::MemoryObjectStore;
use massclip_stripe::{
    Account, AccountLink, Balance, BalanceTransaction, Charge, CheckoutSession,
    CheckoutSessionParams, IdentitySubmission, List, PaymentGateway, Payout, Price, Product,
    StripeError, StripeResult,
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const CDN: &str = "https://cdn.test";

/// Accepts `token-<uid>` and nothing else.
pub struct FakeVerifier;

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> ApiResult<AuthUser> {
        match token.strip_prefix("token-") {
            Some(uid) if !uid.is_empty() => Ok(AuthUser {
                uid: uid.to_string(),
                email: Some(format!("{}@example.com", uid)),
                email_verified: true,
            }),
            _ => Err(ApiError::unauthorized("Invalid token")),
        }
    }
}

#[derive(Default)]
struct GatewayState {
    calls: HashMap<&'static str, usize>,
    account: Option<Account>,
    sessions: HashMap<String, CheckoutSession>,
    checkouts: Vec<CheckoutSessionParams>,
    fail_accounts: bool,
    fail_products: bool,
    next_id: u32,
}

/// Records calls and serves canned gateway objects.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap()
    }

    fn record(&self, name: &'static str) -> u32 {
        let mut state = self.lock();
        *state.calls.entry(name).or_default() += 1;
        state.next_id += 1;
        state.next_id
    }

    pub fn calls(&self, name: &str) -> usize {
        self.lock().calls.get(name).copied().unwrap_or(0)
    }

    pub fn set_account(&self, account: Account) {
        self.lock().account = Some(account);
    }

    pub fn fail_accounts(&self, fail: bool) {
        self.lock().fail_accounts = fail;
    }

    pub fn fail_products(&self, fail: bool) {
        self.lock().fail_products = fail;
    }

    pub fn add_session(&self, session: CheckoutSession) {
        self.lock().sessions.insert(session.id.clone(), session);
    }

    pub fn checkouts(&self) -> Vec<CheckoutSessionParams> {
        self.lock().checkouts.clone()
    }

    fn unavailable() -> StripeError {
        StripeError::Api {
            status: 503,
            error_type: Some("api_error".into()),
            code: None,
            message: "Gateway unavailable".into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_express_account(&self, email: Option<&str>, _uid: &str) -> StripeResult<Account> {
        let n = self.record("create_express_account");
        Ok(Account {
            id: format!("acct_new{}", n),
            email: email.map(str::to_string),
            charges_enabled: false,
            payouts_enabled: false,
            details_submitted: false,
            requirements: None,
        })
    }

    async fn retrieve_account(&self, account_id: &str) -> StripeResult<Account> {
        self.record("retrieve_account");
        let state = self.lock();
        if state.fail_accounts {
            return Err(Self::unavailable());
        }
        state
            .account
            .clone()
            .filter(|a| a.id == account_id)
            .ok_or_else(|| StripeError::Api {
                status: 404,
                error_type: Some("invalid_request_error".into()),
                code: Some("resource_missing".into()),
                message: format!("No such account: {}", account_id),
            })
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> StripeResult<AccountLink> {
        self.record("create_account_link");
        Ok(AccountLink {
            url: format!("https://connect.test/setup/{}", account_id),
            expires_at: None,
        })
    }

    async fn update_account_identity(
        &self,
        account_id: &str,
        _identity: &IdentitySubmission,
    ) -> StripeResult<Account> {
        self.record("update_account_identity");
        Ok(account(account_id, false))
    }

    async fn create_product(
        &self,
        name: &str,
        _description: Option<&str>,
        _account: Option<&str>,
    ) -> StripeResult<Product> {
        let n = self.record("create_product");
        if self.lock().fail_products {
            return Err(Self::unavailable());
        }
        Ok(Product {
            id: format!("prod_{}", n),
            name: Some(name.to_string()),
        })
    }

    async fn create_price(
        &self,
        _product_id: &str,
        unit_amount: i64,
        currency: &str,
        _account: Option<&str>,
    ) -> StripeResult<Price> {
        let n = self.record("create_price");
        Ok(Price {
            id: format!("price_{}", n),
            unit_amount: Some(unit_amount),
            currency: Some(currency.to_string()),
        })
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> StripeResult<CheckoutSession> {
        let n = self.record("create_checkout_session");
        self.lock().checkouts.push(params.clone());
        let id = format!("cs_test_{}", n);
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/{}", id)),
            ..session(&id, "unpaid", HashMap::new())
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        _account: Option<&str>,
    ) -> StripeResult<CheckoutSession> {
        self.record("retrieve_checkout_session");
        self.lock()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StripeError::Api {
                status: 404,
                error_type: Some("invalid_request_error".into()),
                code: Some("resource_missing".into()),
                message: format!("No such checkout.session: {}", session_id),
            })
    }

    async fn retrieve_balance(&self, _account: &str) -> StripeResult<Balance> {
        self.record("retrieve_balance");
        Ok(Balance {
            available: vec![massclip_stripe::BalanceAmount {
                amount: 1250,
                currency: "usd".into(),
            }],
            pending: vec![],
        })
    }

    async fn list_balance_transactions(
        &self,
        _account: &str,
        _limit: u32,
    ) -> StripeResult<List<BalanceTransaction>> {
        self.record("list_balance_transactions");
        Ok(List {
            data: vec![],
            has_more: false,
        })
    }

    async fn list_charges(&self, _account: &str, _limit: u32) -> StripeResult<List<Charge>> {
        self.record("list_charges");
        Ok(List {
            data: vec![Charge {
                id: "ch_1".into(),
                amount: 999,
                currency: "usd".into(),
                status: Some("succeeded".into()),
                paid: true,
                created: 1_700_000_000,
                description: None,
            }],
            has_more: false,
        })
    }

    async fn list_payouts(&self, _account: &str, _limit: u32) -> StripeResult<List<Payout>> {
        self.record("list_payouts");
        Ok(List {
            data: vec![Payout {
                id: "po_1".into(),
                amount: 1000,
                currency: "usd".into(),
                status: Some("paid".into()),
                arrival_date: None,
                created: 1_700_000_000,
            }],
            has_more: false,
        })
    }
}

pub fn account(id: &str, active: bool) -> Account {
    Account {
        id: id.to_string(),
        email: None,
        charges_enabled: active,
        payouts_enabled: active,
        details_submitted: active,
        requirements: None,
    }
}

pub fn session(id: &str, payment_status: &str, metadata: HashMap<String, String>) -> CheckoutSession {
    CheckoutSession {
        id: id.to_string(),
        url: None,
        status: Some("complete".into()),
        payment_status: Some(payment_status.to_string()),
        mode: Some("payment".into()),
        amount_total: Some(999),
        currency: Some("usd".into()),
        customer: None,
        customer_email: None,
        payment_intent: Some(format!("pi_{}", id)),
        subscription: None,
        metadata,
    }
}

/// Metadata of a bundle checkout.
pub fn bundle_metadata(bundle_id: &str, buyer: &str, creator: &str) -> HashMap<String, String> {
    HashMap::from([
        ("type".to_string(), "product_box".to_string()),
        ("productBoxId".to_string(), bundle_id.to_string()),
        ("buyerUid".to_string(), buyer.to_string()),
        ("creatorId".to_string(), creator.to_string()),
    ])
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub gateway: Arc<FakeGateway>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::default())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let objects = Arc::new(MemoryObjectStore::new(CDN));
        let gateway = Arc::new(FakeGateway::default());
        let verifier: SharedVerifier = Arc::new(FakeVerifier);

        let state = AppState::from_parts(
            config,
            store.clone(),
            objects.clone(),
            gateway.clone(),
            verifier,
            WebhookSettings {
                secret: WEBHOOK_SECRET.to_string(),
                tolerance_secs: 300,
            },
        );

        Self {
            router: create_router(state, None),
            store,
            objects,
            gateway,
        }
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.store.clone())
    }

    pub fn uploads(&self) -> UploadRepository {
        UploadRepository::new(self.store.clone())
    }

    pub fn bundles(&self) -> BundleRepository {
        BundleRepository::new(self.store.clone())
    }

    pub async fn seed_user(&self, uid: &str, stripe_account_id: Option<&str>) -> UserProfile {
        let mut user = UserProfile::new(uid, Some(format!("{}@example.com", uid)));
        user.stripe_account_id = stripe_account_id.map(str::to_string);
        self.users().create(&user).await.unwrap();
        user
    }

    pub async fn seed_upload(&self, uid: &str, upload_type: UploadType, size: u64) -> Upload {
        let id = new_id();
        let upload = Upload {
            file_url: format!("{}/uploads/{}/{}", CDN, uid, id),
            id,
            uid: uid.to_string(),
            r2_key: None,
            filename: "clip.mp4".into(),
            title: "clip".into(),
            upload_type,
            size,
            mime_type: "video/mp4".into(),
            duration: Some(10.0),
            thumbnail_url: None,
            created_at: Utc::now(),
        };
        self.uploads().create(&upload).await.unwrap();
        upload
    }

    pub async fn seed_bundle(&self, creator: &str, content: &[&Upload]) -> Bundle {
        let mut bundle = Bundle::new(new_id(), creator, "Pack", "", 9.99, "usd");
        bundle.content_items = content.iter().map(|u| u.id.clone()).collect();
        bundle.content_count = content.len() as u32;
        self.bundles().create(&bundle).await.unwrap();
        bundle
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Json) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Json::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Json::Null)
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        uid: Option<&str>,
        body: Option<Json>,
    ) -> (StatusCode, Json) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(uid) = uid {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer token-{}", uid));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, uid: Option<&str>) -> (StatusCode, Json) {
        self.request(Method::GET, uri, uid, None).await
    }

    pub async fn post(&self, uri: &str, uid: Option<&str>, body: Json) -> (StatusCode, Json) {
        self.request(Method::POST, uri, uid, Some(body)).await
    }

    pub async fn raw(
        &self,
        method: Method,
        uri: &str,
        uid: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> (StatusCode, Json) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer token-{}", uid))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Deliver a webhook payload signed with the test secret.
    pub async fn deliver_webhook(&self, payload: &Json) -> (StatusCode, Json) {
        let body = payload.to_string();
        let signature = sign(&body, WEBHOOK_SECRET, Utc::now().timestamp());
        self.deliver_webhook_raw(body, &signature).await
    }

    pub async fn deliver_webhook_raw(&self, body: String, signature: &str) -> (StatusCode, Json) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/stripe")
            .header("Stripe-Signature", signature)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

pub fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("t={},v1={}", timestamp, hex)
}

/// A `checkout.session.completed` event for a bundle.
pub fn checkout_event(event_id: &str, session_id: &str, bundle_id: &str, buyer: &str) -> Json {
    serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "payment_status": "paid",
                "mode": "payment",
                "amount_total": 999,
                "currency": "usd",
                "payment_intent": format!("pi_{}", session_id),
                "metadata": {
                    "type": "product_box",
                    "productBoxId": bundle_id,
                    "buyerUid": buyer
                }
            }
        }
    })
}
