//! Profile handlers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::require_id;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureResponse {
    pub success: bool,
    pub profile_pic: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Replace the caller's profile picture with the raw image body.
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ProfilePictureResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let url = state
        .profile
        .upload_picture(&user.uid, user.email.as_deref(), content_type, body.to_vec())
        .await?;
    Ok(Json(ProfilePictureResponse {
        success: true,
        profile_pic: url,
    }))
}

/// Count a view of a public profile. No authentication.
pub async fn record_profile_view(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    require_id(&uid, "user id")?;
    state.profile.record_view(&uid).await?;
    Ok(Json(SuccessResponse { success: true }))
}
