//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::bundles::{
    add_bundle_content, create_bundle, create_checkout, get_bundle, list_creator_bundles,
    remove_bundle_content, update_bundle,
};
use crate::handlers::free_content::{add_free_content, delete_free_content, list_free_content};
use crate::handlers::payouts::{account_link, get_earnings, get_status, onboard, submit_identity};
use crate::handlers::profile::{record_profile_view, upload_profile_picture};
use crate::handlers::purchases::{
    check_access, grant_immediate_access, list_purchases, stripe_webhook, verify_purchase,
};
use crate::handlers::uploads::{
    create_upload, finalize_chunked_upload, list_uploads, start_chunked_upload, upload_chunk,
};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_routes = Router::new()
        .route("/uploads", post(create_upload).get(list_uploads))
        .route("/uploads/chunked/start", post(start_chunked_upload))
        .route("/uploads/chunked/:session_id/chunks/:index", put(upload_chunk))
        .route("/uploads/chunked/:session_id/finalize", post(finalize_chunked_upload));

    let bundle_routes = Router::new()
        .route("/creator/bundles", post(create_bundle).get(list_creator_bundles))
        .route("/creator/bundles/:bundle_id", patch(update_bundle))
        .route("/creator/bundles/:bundle_id/content", post(add_bundle_content))
        .route(
            "/creator/bundles/:bundle_id/content/:content_id",
            delete(remove_bundle_content),
        )
        .route("/bundles/:bundle_id", get(get_bundle))
        .route("/bundles/:bundle_id/checkout", post(create_checkout));

    let purchase_routes = Router::new()
        .route("/purchase/verify", post(verify_purchase))
        .route("/purchase/grant-immediate-access", post(grant_immediate_access))
        .route("/user/purchases", get(list_purchases))
        .route("/access/:content_id", get(check_access));

    let stripe_routes = Router::new()
        .route("/stripe/status", get(get_status))
        .route("/stripe/onboard", post(onboard))
        .route("/stripe/account-link", post(account_link))
        .route("/stripe/identity", post(submit_identity))
        .route("/stripe/earnings", get(get_earnings));

    let profile_routes = Router::new()
        .route("/profile/picture", post(upload_profile_picture))
        .route("/profile/:uid/view", post(record_profile_view))
        .route("/free-content", post(add_free_content).get(list_free_content))
        .route("/free-content/:id", delete(delete_free_content));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(bundle_routes)
        .merge(purchase_routes)
        .merge(stripe_routes)
        .merge(profile_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    // Gateway retries are paced by the gateway; keep them out of the per-IP limiter
    let webhook_routes = Router::new().route("/api/webhooks/stripe", post(stripe_webhook));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
