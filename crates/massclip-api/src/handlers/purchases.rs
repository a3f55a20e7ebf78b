//! Purchase handlers, including the payment gateway webhook.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use massclip_models::Purchase;
use massclip_stripe::construct_event;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::require_id;
use crate::metrics;
use crate::services::purchases::{AccessCheck, Fulfillment};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPurchaseRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantAccessRequest {
    pub bundle_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub success: bool,
    pub already_processed: bool,
    pub purchase: Purchase,
}

impl From<Fulfillment> for PurchaseResponse {
    fn from(f: Fulfillment) -> Self {
        Self {
            success: true,
            already_processed: f.already_processed,
            purchase: f.purchase,
        }
    }
}

#[derive(Serialize)]
pub struct PurchaseListResponse {
    pub purchases: Vec<Purchase>,
}

/// Gateway webhook.
///
/// A bad signature is rejected before anything is read or written. Once the
/// event is authentic the delivery is always acknowledged; processing errors
/// are logged and counted so the gateway does not retry.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe-Signature header"))?;

    let event = construct_event(
        &body,
        signature,
        &state.webhook.secret,
        state.webhook.tolerance_secs,
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected webhook delivery");
        metrics::record_webhook_event("unknown", "rejected");
        ApiError::bad_request(format!("Webhook signature verification failed: {}", e))
    })?;

    match state.purchases.handle_event(&event).await {
        Ok(outcome) => {
            info!(event_id = %event.id, event_type = %event.event_type, outcome = outcome.as_str(), "Processed webhook");
            metrics::record_webhook_event(&event.event_type, outcome.as_str());
        }
        Err(e) => {
            error!(event_id = %event.id, event_type = %event.event_type, error = %e, "Webhook handler failed");
            metrics::record_webhook_event(&event.event_type, "error");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

/// Confirm a checkout session with the gateway.
pub async fn verify_purchase(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<VerifyPurchaseRequest>,
) -> ApiResult<Json<PurchaseResponse>> {
    if request.session_id.trim().is_empty() {
        return Err(ApiError::validation("MISSING_SESSION_ID", "sessionId is required"));
    }
    require_id(&request.session_id, "session id")?;
    let fulfillment = state.purchases.verify(&user.uid, &request.session_id).await?;
    Ok(Json(fulfillment.into()))
}

/// Grant bundle access without payment proof, when enabled.
pub async fn grant_immediate_access(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GrantAccessRequest>,
) -> ApiResult<Json<PurchaseResponse>> {
    require_id(&request.bundle_id, "bundle id")?;
    let fulfillment = state
        .purchases
        .grant_immediate_access(&user.uid, &request.bundle_id)
        .await?;
    Ok(Json(fulfillment.into()))
}

pub async fn list_purchases(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<PurchaseListResponse>> {
    let purchases = state.purchases.list_purchases(&user.uid).await?;
    Ok(Json(PurchaseListResponse { purchases }))
}

pub async fn check_access(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<String>,
) -> ApiResult<Json<AccessCheck>> {
    require_id(&content_id, "content id")?;
    let check = state.purchases.check_access(&user.uid, &content_id).await?;
    Ok(Json(check))
}
