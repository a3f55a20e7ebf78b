//! Bundle handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use massclip_models::{Bundle, ContentMetadata};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::require_id;
use crate::services::bundles::{BundleChanges, BundleContent, CheckoutLink, NewBundle};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBundleResponse {
    pub success: bool,
    pub bundle_id: String,
    pub bundle: Bundle,
}

#[derive(Serialize)]
pub struct BundleResponse {
    pub success: bool,
    pub bundle: Bundle,
}

#[derive(Serialize)]
pub struct BundleListResponse {
    pub bundles: Vec<Bundle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContentRequest {
    #[serde(default)]
    pub content_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleContentResponse {
    pub success: bool,
    pub content_count: u32,
    pub content_items: Vec<String>,
    pub content_metadata: ContentMetadata,
}

impl From<BundleContent> for BundleContentResponse {
    fn from(content: BundleContent) -> Self {
        Self {
            success: true,
            content_count: content.content_count,
            content_items: content.content_items,
            content_metadata: content.content_metadata,
        }
    }
}

pub async fn create_bundle(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<NewBundle>,
) -> ApiResult<Json<CreateBundleResponse>> {
    let bundle = state.bundles.create(&user.uid, request).await?;
    Ok(Json(CreateBundleResponse {
        success: true,
        bundle_id: bundle.id.clone(),
        bundle,
    }))
}

pub async fn list_creator_bundles(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<BundleListResponse>> {
    let bundles = state.bundles.list(&user.uid).await?;
    Ok(Json(BundleListResponse { bundles }))
}

/// Public bundle read.
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(bundle_id): Path<String>,
) -> ApiResult<Json<BundleResponse>> {
    require_id(&bundle_id, "bundle id")?;
    let bundle = state.bundles.get(&bundle_id).await?;
    Ok(Json(BundleResponse {
        success: true,
        bundle,
    }))
}

pub async fn update_bundle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(bundle_id): Path<String>,
    Json(changes): Json<BundleChanges>,
) -> ApiResult<Json<BundleResponse>> {
    require_id(&bundle_id, "bundle id")?;
    let bundle = state.bundles.update(&user.uid, &bundle_id, changes).await?;
    Ok(Json(BundleResponse {
        success: true,
        bundle,
    }))
}

pub async fn add_bundle_content(
    State(state): State<AppState>,
    user: AuthUser,
    Path(bundle_id): Path<String>,
    Json(request): Json<AddContentRequest>,
) -> ApiResult<Json<BundleContentResponse>> {
    require_id(&bundle_id, "bundle id")?;
    for id in &request.content_ids {
        require_id(id, "content id")?;
    }
    let content = state
        .bundles
        .add_content(&user.uid, &bundle_id, request.content_ids)
        .await?;
    Ok(Json(content.into()))
}

pub async fn remove_bundle_content(
    State(state): State<AppState>,
    user: AuthUser,
    Path((bundle_id, content_id)): Path<(String, String)>,
) -> ApiResult<Json<BundleContentResponse>> {
    require_id(&bundle_id, "bundle id")?;
    require_id(&content_id, "content id")?;
    let content = state
        .bundles
        .remove_content(&user.uid, &bundle_id, &content_id)
        .await?;
    Ok(Json(content.into()))
}

pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(bundle_id): Path<String>,
) -> ApiResult<Json<CheckoutLink>> {
    require_id(&bundle_id, "bundle id")?;
    let link = state
        .bundles
        .checkout(&user.uid, user.email.as_deref(), &bundle_id)
        .await?;
    Ok(Json(link))
}
