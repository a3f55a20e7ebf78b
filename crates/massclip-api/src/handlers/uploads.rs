//! Upload handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use massclip_models::{Upload, UploadType};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::require_id;
use crate::services::uploads::{FinalizeUpload, NewUpload, StartChunkedUpload};
use crate::state::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub upload: Upload,
}

#[derive(Serialize)]
pub struct UploadListResponse {
    pub uploads: Vec<Upload>,
}

#[derive(Debug, Deserialize)]
pub struct ListUploadsQuery {
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub upload_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedStartResponse {
    pub success: bool,
    pub session_id: String,
    pub r2_key: String,
    pub total_chunks: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    pub success: bool,
    pub index: u32,
    pub key: String,
}

/// Register an already-stored file.
pub async fn create_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<NewUpload>,
) -> ApiResult<Json<UploadResponse>> {
    let upload = state.uploads.register(&user.uid, request).await?;
    Ok(Json(UploadResponse {
        success: true,
        upload,
    }))
}

/// The caller's uploads, newest first.
pub async fn list_uploads(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListUploadsQuery>,
) -> ApiResult<Json<UploadListResponse>> {
    let upload_type = query.upload_type.as_deref().map(UploadType::from_str);
    let uploads = state.uploads.list(&user.uid, upload_type, query.limit).await?;
    Ok(Json(UploadListResponse { uploads }))
}

pub async fn start_chunked_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<StartChunkedUpload>,
) -> ApiResult<Json<ChunkedStartResponse>> {
    let session = state.uploads.start_chunked(&user.uid, request).await?;
    Ok(Json(ChunkedStartResponse {
        success: true,
        session_id: session.id,
        r2_key: session.r2_key,
        total_chunks: session.total_chunks,
    }))
}

/// Store one chunk. The body is the raw chunk bytes.
pub async fn upload_chunk(
    State(state): State<AppState>,
    user: AuthUser,
    Path((session_id, index)): Path<(String, u32)>,
    body: Bytes,
) -> ApiResult<Json<ChunkResponse>> {
    require_id(&session_id, "session id")?;
    let key = state
        .uploads
        .put_chunk(&user.uid, &session_id, index, body.to_vec())
        .await?;
    Ok(Json(ChunkResponse {
        success: true,
        index,
        key,
    }))
}

pub async fn finalize_chunked_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<String>,
    Json(request): Json<FinalizeUpload>,
) -> ApiResult<Json<UploadResponse>> {
    require_id(&session_id, "session id")?;
    let upload = state
        .uploads
        .finalize(&user.uid, &session_id, request)
        .await?;
    Ok(Json(UploadResponse {
        success: true,
        upload,
    }))
}
