//! Bundle catalog routes.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use massclip_firestore::collections::BUNDLES;
use massclip_firestore::MAX_FULFILLMENT_GRANTS;
use massclip_models::{Bundle, UploadType};

#[tokio::test]
async fn test_create_bundle_without_connected_account_then_add_content() {
    let app = TestApp::new();
    app.seed_user("creator", None).await;
    let upload = app.seed_upload("creator", UploadType::Video, 2048).await;

    let (status, body) = app
        .post(
            "/api/creator/bundles",
            Some("creator"),
            json!({ "title": "Pack", "price": 9.99 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert!(body["bundle"]["productId"].is_null());
    let bundle_id = body["bundleId"].as_str().unwrap().to_string();
    assert_eq!(app.gateway.calls("create_product"), 0);

    let stored = app.bundles().get(&bundle_id).await.unwrap().unwrap();
    assert!(stored.product_id.is_none());
    assert_eq!(stored.price, 9.99);

    let (status, body) = app
        .post(
            &format!("/api/creator/bundles/{}/content", bundle_id),
            Some("creator"),
            json!({ "contentIds": [upload.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["contentCount"], 1);
    assert_eq!(body["contentItems"], json!([upload.id]));
    assert_eq!(body["contentMetadata"]["videoCount"], 1);
    assert_eq!(body["contentMetadata"]["totalSize"], 2048);

    let stored = app.bundles().get(&bundle_id).await.unwrap().unwrap();
    assert_eq!(stored.content_count, 1);
    assert_eq!(stored.content_items, vec![upload.id.clone()]);
}

#[tokio::test]
async fn test_price_bounds_reject_without_writing() {
    let app = TestApp::new();
    for price in [0.49, 1000.0, -1.0] {
        let (status, body) = app
            .post(
                "/api/creator/bundles",
                Some("creator"),
                json!({ "title": "Pack", "price": price }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "price {}", price);
        assert_eq!(body["code"], "INVALID_PRICE");
    }
    assert_eq!(app.store.count(BUNDLES), 0);

    let (status, body) = app
        .post("/api/creator/bundles", Some("creator"), json!({ "title": "  ", "price": 5.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_TITLE");
    assert_eq!(app.store.count(BUNDLES), 0);
}

#[tokio::test]
async fn test_connected_creator_gets_gateway_product() {
    let app = TestApp::new();
    app.seed_user("creator", Some("acct_creator")).await;

    let (status, body) = app
        .post(
            "/api/creator/bundles",
            Some("creator"),
            json!({ "title": "Pack", "price": 4.5 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["bundle"]["productId"].as_str().unwrap().starts_with("prod_"));
    assert!(body["bundle"]["priceId"].as_str().unwrap().starts_with("price_"));
}

#[tokio::test]
async fn test_gateway_failure_does_not_block_creation() {
    let app = TestApp::new();
    app.seed_user("creator", Some("acct_creator")).await;
    app.gateway.fail_products(true);

    let (status, body) = app
        .post(
            "/api/creator/bundles",
            Some("creator"),
            json!({ "title": "Pack", "price": 4.5 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["bundle"]["productId"].is_null());
    assert_eq!(app.store.count(BUNDLES), 1);
}

#[tokio::test]
async fn test_non_owner_cannot_update_or_remove_content() {
    let app = TestApp::new();
    let upload = app.seed_upload("creator", UploadType::Video, 10).await;
    let bundle = app.seed_bundle("creator", &[&upload]).await;

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/creator/bundles/{}", bundle.id),
            Some("intruder"),
            Some(json!({ "title": "Mine now", "price": 1.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/creator/bundles/{}/content/{}", bundle.id, upload.id),
            Some("intruder"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.bundles().get(&bundle.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Pack");
    assert_eq!(stored.price, 9.99);
    assert_eq!(stored.content_items, vec![upload.id.clone()]);
}

#[tokio::test]
async fn test_owner_update_and_remove_content() {
    let app = TestApp::new();
    let first = app.seed_upload("creator", UploadType::Video, 10).await;
    let second = app.seed_upload("creator", UploadType::Audio, 5).await;
    let bundle = app.seed_bundle("creator", &[&first, &second]).await;

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/api/creator/bundles/{}", bundle.id),
            Some("creator"),
            Some(json!({ "title": "Renamed", "price": 19.99 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["bundle"]["title"], "Renamed");
    assert_eq!(body["bundle"]["price"], 19.99);

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/api/creator/bundles/{}", bundle.id),
            Some("creator"),
            Some(json!({ "price": 0.1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PRICE");

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/creator/bundles/{}/content/{}", bundle.id, first.id),
            Some("creator"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["contentCount"], 1);
    assert_eq!(body["contentItems"], json!([second.id]));
    assert_eq!(body["contentMetadata"]["audioCount"], 1);
    assert_eq!(body["contentMetadata"]["videoCount"], 0);
}

#[tokio::test]
async fn test_add_content_checks_each_upload() {
    let app = TestApp::new();
    let mine = app.seed_upload("creator", UploadType::Video, 10).await;
    let theirs = app.seed_upload("other", UploadType::Video, 10).await;
    let bundle = app.seed_bundle("creator", &[&mine]).await;
    let uri = format!("/api/creator/bundles/{}/content", bundle.id);

    let (status, _) = app
        .post(&uri, Some("creator"), json!({ "contentIds": ["missing"] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&uri, Some("creator"), json!({ "contentIds": [theirs.id] }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&uri, Some("creator"), json!({ "contentIds": [mine.id, mine.id] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contentCount"], 1);

    let (status, body) = app.post(&uri, Some("creator"), json!({ "contentIds": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_CONTENT_IDS");
}

#[tokio::test]
async fn test_add_content_caps_bundle_size() {
    let app = TestApp::new();
    let upload = app.seed_upload("creator", UploadType::Video, 10).await;
    let mut bundle = Bundle::new("full", "creator", "Pack", "", 9.99, "usd");
    bundle.content_items = (0..MAX_FULFILLMENT_GRANTS).map(|i| format!("u{}", i)).collect();
    bundle.content_count = MAX_FULFILLMENT_GRANTS as u32;
    app.bundles().create(&bundle).await.unwrap();

    let (status, body) = app
        .post(
            "/api/creator/bundles/full/content",
            Some("creator"),
            json!({ "contentIds": [upload.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BUNDLE_TOO_LARGE");

    let stored = app.bundles().get("full").await.unwrap().unwrap();
    assert_eq!(stored.content_items.len(), MAX_FULFILLMENT_GRANTS);
    assert!(!stored.contains(&upload.id));
}

#[tokio::test]
async fn test_public_read_and_listing() {
    let app = TestApp::new();
    let bundle = app.seed_bundle("creator", &[]).await;

    let (status, body) = app.get(&format!("/api/bundles/{}", bundle.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bundle"]["title"], "Pack");

    let (status, _) = app.get("/api/bundles/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/creator/bundles", Some("creator")).await;
    assert_eq!(body["bundles"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_requires_connected_creator() {
    let app = TestApp::new();
    app.seed_user("creator", None).await;
    let bundle = app.seed_bundle("creator", &[]).await;

    let (status, body) = app
        .post(&format!("/api/bundles/{}/checkout", bundle.id), Some("buyer"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CREATOR_NOT_CONNECTED");
}

#[tokio::test]
async fn test_checkout_carries_bundle_metadata() {
    let app = TestApp::new();
    app.seed_user("creator", Some("acct_creator")).await;
    let bundle = app.seed_bundle("creator", &[]).await;

    let (status, body) = app
        .post(&format!("/api/bundles/{}/checkout", bundle.id), Some("buyer"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["sessionId"].as_str().unwrap().starts_with("cs_test_"));
    assert!(body["url"].as_str().is_some());

    let params = app.gateway.checkouts().pop().unwrap();
    assert_eq!(params.unit_amount, 999);
    assert_eq!(params.destination_account.as_deref(), Some("acct_creator"));
    assert_eq!(params.metadata["type"], "product_box");
    assert_eq!(params.metadata["productBoxId"], bundle.id);
    assert_eq!(params.metadata["buyerUid"], "buyer");
    assert_eq!(params.metadata["creatorId"], "creator");
    assert!(params.success_url.contains("{CHECKOUT_SESSION_ID}"));
}
