//! Free content area and public profile views.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;

use common::TestApp;
use massclip_firestore::collections::{DAILY_STATS, FREE_CONTENT, USERS};
use massclip_firestore::{DocumentStore, FromFirestoreValue};
use massclip_models::UploadType;

#[tokio::test]
async fn test_add_free_content_is_deduplicated() {
    let app = TestApp::new();
    let upload = app.seed_upload("creator", UploadType::Video, 10).await;

    let (status, body) = app
        .post("/api/free-content", Some("creator"), json!({ "uploadId": upload.id }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["alreadyExists"], false);
    assert_eq!(body["item"]["originalId"], upload.id);
    assert_eq!(body["item"]["fileUrl"], upload.file_url);
    let first_id = body["item"]["id"].clone();

    let (status, body) = app
        .post("/api/free-content", Some("creator"), json!({ "uploadId": upload.id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alreadyExists"], true);
    assert_eq!(body["item"]["id"], first_id);
    assert_eq!(app.store.count(FREE_CONTENT), 1);
}

#[tokio::test]
async fn test_add_free_content_checks_upload() {
    let app = TestApp::new();
    let theirs = app.seed_upload("other", UploadType::Image, 10).await;

    let (status, _) = app
        .post("/api/free-content", Some("creator"), json!({ "uploadId": theirs.id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/api/free-content", Some("creator"), json!({ "uploadId": "missing" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.count(FREE_CONTENT), 0);
}

#[tokio::test]
async fn test_list_and_delete_free_content() {
    let app = TestApp::new();
    let upload = app.seed_upload("creator", UploadType::Video, 10).await;
    let (_, body) = app
        .post("/api/free-content", Some("creator"), json!({ "uploadId": upload.id }))
        .await;
    let id = body["item"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.get("/api/free-content", Some("creator")).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    // Visitors list a creator's items by uid
    let (_, body) = app.get("/api/free-content?uid=creator", Some("visitor")).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    let (_, body) = app.get("/api/free-content", Some("visitor")).await;
    assert!(body["items"].as_array().unwrap().is_empty());

    let uri = format!("/api/free-content/{}", id);
    let (status, _) = app.request(Method::DELETE, &uri, Some("visitor"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.count(FREE_CONTENT), 1);

    let (status, body) = app.request(Method::DELETE, &uri, Some("creator"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.store.count(FREE_CONTENT), 0);

    let (status, _) = app.request(Method::DELETE, &uri, Some("creator"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_views_are_counted() {
    let app = TestApp::new();
    app.seed_user("creator", None).await;

    for _ in 0..2 {
        let (status, _) = app.post("/api/profile/creator/view", None, json!({})).await;
        assert_eq!(status, StatusCode::OK);
    }

    let user = app.users().get("creator").await.unwrap().unwrap();
    assert_eq!(user.profile_views, 2);

    let stats = format!("{}/creator/{}", USERS, DAILY_STATS);
    assert_eq!(app.store.count(&stats), 1);
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let doc = app.store.get(&stats, &today).await.unwrap().unwrap();
    let views = doc
        .fields
        .as_ref()
        .and_then(|f| f.get("views"))
        .and_then(i64::from_firestore_value);
    assert_eq!(views, Some(2));

    let (status, _) = app.post("/api/profile/ghost/view", None, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
