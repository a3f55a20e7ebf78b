//! Free content handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use massclip_models::FreeContent;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::require_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFreeContentRequest {
    pub upload_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFreeContentResponse {
    pub success: bool,
    pub already_exists: bool,
    pub item: FreeContent,
}

#[derive(Debug, Deserialize)]
pub struct ListFreeContentQuery {
    pub uid: Option<String>,
}

#[derive(Serialize)]
pub struct FreeContentListResponse {
    pub items: Vec<FreeContent>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

pub async fn add_free_content(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AddFreeContentRequest>,
) -> ApiResult<Json<AddFreeContentResponse>> {
    require_id(&request.upload_id, "upload id")?;
    let added = state.free_content.add(&user.uid, &request.upload_id).await?;
    Ok(Json(AddFreeContentResponse {
        success: true,
        already_exists: added.already_exists,
        item: added.item,
    }))
}

/// A creator's free content; defaults to the caller.
pub async fn list_free_content(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListFreeContentQuery>,
) -> ApiResult<Json<FreeContentListResponse>> {
    let uid = query.uid.unwrap_or(user.uid);
    require_id(&uid, "user id")?;
    let items = state.free_content.list(&uid).await?;
    Ok(Json(FreeContentListResponse { items }))
}

pub async fn delete_free_content(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    require_id(&id, "free content id")?;
    state.free_content.delete(&user.uid, &id).await?;
    Ok(Json(DeleteResponse { success: true }))
}
