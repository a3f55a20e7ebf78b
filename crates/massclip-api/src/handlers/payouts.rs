//! Creator payout account handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use massclip_stripe::IdentitySubmission;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::services::payouts::{Earnings, OnboardingLink, PayoutStatus};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn get_status(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<PayoutStatus>> {
    Ok(Json(state.payouts.status(&user.uid).await?))
}

pub async fn onboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<OnboardingLink>> {
    Ok(Json(state.payouts.onboard(&user).await?))
}

pub async fn account_link(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<OnboardingLink>> {
    Ok(Json(state.payouts.account_link(&user.uid).await?))
}

pub async fn submit_identity(
    State(state): State<AppState>,
    user: AuthUser,
    Json(identity): Json<IdentitySubmission>,
) -> ApiResult<Json<SuccessResponse>> {
    state.payouts.submit_identity(&user.uid, identity).await?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn get_earnings(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Earnings>> {
    Ok(Json(state.payouts.earnings(&user.uid).await?))
}
