//! Upload ingestion: direct registration and chunked uploads.

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use massclip_firestore::{UploadRepository, UploadSessionRepository};
use massclip_models::{new_id, Upload, UploadSession, UploadSessionStatus, UploadType};
use massclip_storage::keys::{chunk_key, upload_key};
use massclip_storage::{combine_chunks, SharedObjectStore};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{sanitize_title, validate_file_url};

/// Upper bound on chunks per session.
pub const MAX_CHUNKS: u32 = 10_000;

/// Default and maximum page size for upload listings.
pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

/// Registration of an object that is already in storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUpload {
    pub file_url: String,
    pub filename: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub r2_key: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChunkedUpload {
    pub filename: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
    pub total_chunks: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeUpload {
    #[serde(default)]
    pub completed_chunks: Vec<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

fn title_or_default(title: Option<&str>, filename: &str) -> String {
    let title = title.map(sanitize_title).unwrap_or_default();
    if title.is_empty() {
        Upload::default_title(filename)
    } else {
        title
    }
}

#[derive(Clone)]
pub struct UploadService {
    uploads: UploadRepository,
    sessions: UploadSessionRepository,
    objects: SharedObjectStore,
}

impl UploadService {
    pub fn new(
        uploads: UploadRepository,
        sessions: UploadSessionRepository,
        objects: SharedObjectStore,
    ) -> Self {
        Self {
            uploads,
            sessions,
            objects,
        }
    }

    /// Record an upload whose bytes the client already stored.
    pub async fn register(&self, uid: &str, request: NewUpload) -> ApiResult<Upload> {
        let file_url = validate_file_url(&request.file_url)
            .map_err(|e| ApiError::validation("INVALID_FILE_URL", e))?;
        if request.filename.trim().is_empty() {
            return Err(ApiError::validation("MISSING_FILENAME", "filename is required"));
        }

        let mime_type = request
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let upload = Upload {
            id: new_id(),
            uid: uid.to_string(),
            file_url,
            r2_key: request.r2_key,
            title: title_or_default(request.title.as_deref(), &request.filename),
            filename: request.filename,
            upload_type: UploadType::from_mime(&mime_type),
            size: request.size,
            mime_type,
            duration: request.duration.filter(|d| d.is_finite() && *d >= 0.0),
            thumbnail_url: request.thumbnail_url,
            created_at: Utc::now(),
        };
        self.uploads.create(&upload).await?;
        Ok(upload)
    }

    pub async fn list(
        &self,
        uid: &str,
        upload_type: Option<UploadType>,
        limit: Option<u32>,
    ) -> ApiResult<Vec<Upload>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self.uploads.list_by_user(uid, upload_type, limit).await?)
    }

    /// Open a chunked upload session.
    pub async fn start_chunked(
        &self,
        uid: &str,
        request: StartChunkedUpload,
    ) -> ApiResult<UploadSession> {
        if request.filename.trim().is_empty() {
            return Err(ApiError::validation("MISSING_FILENAME", "filename is required"));
        }
        if request.total_chunks == 0 || request.total_chunks > MAX_CHUNKS {
            return Err(ApiError::validation(
                "INVALID_TOTAL_CHUNKS",
                format!("totalChunks must be between 1 and {}", MAX_CHUNKS),
            ));
        }

        let now = Utc::now();
        let session = UploadSession {
            id: new_id(),
            uid: uid.to_string(),
            r2_key: upload_key(uid, now.timestamp_millis(), &request.filename),
            filename: request.filename,
            total_chunks: request.total_chunks,
            file_size: request.file_size,
            file_type: request.file_type,
            status: UploadSessionStatus::Pending,
            final_upload_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.sessions.create(&session).await?;
        Ok(session)
    }

    /// Load a session the caller owns and can still write to.
    async fn pending_session(&self, uid: &str, session_id: &str) -> ApiResult<UploadSession> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Upload session not found"))?;
        if !session.is_owned_by(uid) {
            return Err(ApiError::forbidden("Upload session belongs to another user"));
        }
        if !session.is_pending() {
            return Err(ApiError::validation(
                "SESSION_NOT_PENDING",
                format!("Upload session is {}", session.status.as_str()),
            ));
        }
        Ok(session)
    }

    /// Store one chunk at `{r2Key}.chunk.{index}`.
    pub async fn put_chunk(
        &self,
        uid: &str,
        session_id: &str,
        index: u32,
        data: Vec<u8>,
    ) -> ApiResult<String> {
        let session = self.pending_session(uid, session_id).await?;
        if index >= session.total_chunks {
            return Err(ApiError::validation(
                "INVALID_CHUNK_INDEX",
                format!(
                    "Chunk index {} out of range for {} chunks",
                    index, session.total_chunks
                ),
            ));
        }
        if data.is_empty() {
            return Err(ApiError::validation("EMPTY_CHUNK", "Chunk body is empty"));
        }

        let key = chunk_key(&session.r2_key, index);
        self.objects
            .put(&key, data, "application/octet-stream")
            .await?;
        Ok(key)
    }

    /// Combine every chunk of a session into the final object and register it.
    pub async fn finalize(
        &self,
        uid: &str,
        session_id: &str,
        request: FinalizeUpload,
    ) -> ApiResult<Upload> {
        let session = self.pending_session(uid, session_id).await?;

        if request.completed_chunks.len() != session.total_chunks as usize {
            metrics::record_finalize("incomplete");
            return Err(ApiError::validation(
                "INCOMPLETE_CHUNKS",
                format!(
                    "Expected {} chunks, got {}",
                    session.total_chunks,
                    request.completed_chunks.len()
                ),
            ));
        }

        let content_type = if session.file_type.is_empty() {
            "application/octet-stream"
        } else {
            session.file_type.as_str()
        };

        let combined = match combine_chunks(
            self.objects.as_ref(),
            &session.r2_key,
            session.total_chunks,
            content_type,
        )
        .await
        {
            Ok(combined) => combined,
            Err(e) => {
                error!(upload_session_id = %session.id, error = %e, "Failed to combine chunks");
                self.mark_error(&session.id, &e.to_string()).await;
                metrics::record_finalize("error");
                return Err(ApiError::internal(format!("Failed to combine chunks: {}", e)));
            }
        };

        let upload = Upload {
            id: new_id(),
            uid: uid.to_string(),
            file_url: combined.url,
            r2_key: Some(combined.key),
            title: title_or_default(request.title.as_deref(), &session.filename),
            filename: session.filename.clone(),
            upload_type: UploadType::from_mime(content_type),
            size: combined.size,
            mime_type: content_type.to_string(),
            duration: None,
            thumbnail_url: None,
            created_at: Utc::now(),
        };

        if let Err(e) = self.uploads.create(&upload).await {
            self.mark_error(&session.id, &e.to_string()).await;
            metrics::record_finalize("error");
            return Err(e.into());
        }
        self.sessions.mark_completed(&session.id, &upload.id).await?;

        metrics::record_finalize("completed");
        info!(
            upload_session_id = %session.id,
            upload_id = %upload.id,
            bytes = upload.size,
            "Finalized chunked upload"
        );
        Ok(upload)
    }

    async fn mark_error(&self, session_id: &str, message: &str) {
        if let Err(e) = self.sessions.mark_error(session_id, message).await {
            warn!(upload_session_id = %session_id, error = %e, "Failed to mark upload session as errored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_fallback() {
        assert_eq!(title_or_default(None, "clip.mp4"), "clip");
        assert_eq!(title_or_default(Some("   "), "clip.mp4"), "clip");
        assert_eq!(title_or_default(Some("My clip"), "clip.mp4"), "My clip");
    }
}
