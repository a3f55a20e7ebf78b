//! Free content projection of an upload.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::upload::{Upload, UploadType};

/// Copy of an upload published in the creator's free area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreeContent {
    pub id: String,
    pub uid: String,
    pub title: String,
    pub file_url: String,
    /// ID of the source document
    pub original_id: String,
    /// Collection the source document came from
    pub source_collection: String,
    #[serde(rename = "type")]
    pub content_type: UploadType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl FreeContent {
    /// Project an upload into a free content entry.
    pub fn from_upload(id: impl Into<String>, upload: &Upload) -> Self {
        Self {
            id: id.into(),
            uid: upload.uid.clone(),
            title: upload.title.clone(),
            file_url: upload.file_url.clone(),
            original_id: upload.id.clone(),
            source_collection: "uploads".to_string(),
            content_type: upload.upload_type,
            thumbnail_url: upload.thumbnail_url.clone(),
            added_at: Utc::now(),
        }
    }
}
