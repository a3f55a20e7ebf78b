//! Stripe client tests against a mock HTTP server.

use massclip_stripe::{CheckoutSessionParams, StripeClient, StripeConfig, StripeError};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> StripeClient {
    StripeClient::new(StripeConfig::with_base("sk_test_123", server.uri())).unwrap()
}

#[tokio::test]
async fn test_retrieve_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts/acct_1"))
        .and(header("authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acct_1",
            "charges_enabled": true,
            "payouts_enabled": false,
            "details_submitted": true,
            "requirements": {
                "currently_due": ["external_account"],
                "past_due": [],
                "eventually_due": [],
                "pending_verification": [],
                "disabled_reason": null
            }
        })))
        .mount(&server)
        .await;

    let account = client(&server).retrieve_account("acct_1").await.unwrap();
    assert!(account.charges_enabled);
    assert!(!account.payouts_enabled);
    assert_eq!(
        account.requirements.unwrap().currently_due,
        vec!["external_account".to_string()]
    );
}

#[tokio::test]
async fn test_api_error_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "resource_missing",
                "message": "No such checkout.session: 'cs_missing'"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .retrieve_checkout_session("cs_missing", None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    match err {
        StripeError::Api { code, .. } => assert_eq!(code.as_deref(), Some("resource_missing")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_connected_account_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_1"))
        .and(header("stripe-account", "acct_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_1",
            "payment_status": "paid",
            "metadata": {}
        })))
        .mount(&server)
        .await;

    let session = client(&server)
        .retrieve_checkout_session("cs_1", Some("acct_9"))
        .await
        .unwrap();
    assert!(session.is_paid());
}

#[tokio::test]
async fn test_checkout_session_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("transfer_data%5D%5Bdestination%5D=acct_7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_new",
            "url": "https://checkout.stripe.com/pay/cs_new",
            "payment_status": "unpaid",
            "metadata": {}
        })))
        .mount(&server)
        .await;

    let params = CheckoutSessionParams {
        product_name: "Pack".into(),
        unit_amount: 500,
        currency: "usd".into(),
        success_url: "https://app/s".into(),
        cancel_url: "https://app/c".into(),
        destination_account: Some("acct_7".into()),
        ..Default::default()
    };
    let session = client(&server).create_checkout_session(&params).await.unwrap();
    assert_eq!(session.id, "cs_new");
    assert!(session.url.is_some());
}

#[tokio::test]
async fn test_list_payouts_with_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payouts"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "has_more": false,
            "data": [
                { "id": "po_1", "amount": 1200, "currency": "usd", "status": "paid", "created": 1 }
            ]
        })))
        .mount(&server)
        .await;

    let payouts = client(&server).list_payouts("acct_1", 10).await.unwrap();
    assert_eq!(payouts.data.len(), 1);
    assert_eq!(payouts.data[0].amount, 1200);
}
