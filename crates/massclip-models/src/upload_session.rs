//! Chunked upload session models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadSessionStatus {
    /// Chunks are being uploaded
    #[default]
    Pending,
    /// Chunks were combined and an upload record exists
    Completed,
    /// Combination failed
    Error,
}

impl UploadSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSessionStatus::Pending => "pending",
            UploadSessionStatus::Completed => "completed",
            UploadSessionStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => UploadSessionStatus::Completed,
            "error" => UploadSessionStatus::Error,
            _ => UploadSessionStatus::Pending,
        }
    }
}

/// Tracks a multi-chunk upload until it is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub id: String,
    pub uid: String,
    /// Canonical key of the final object; chunks live at `{r2_key}.chunk.{n}`
    pub r2_key: String,
    pub filename: String,
    pub total_chunks: u32,
    pub file_size: u64,
    pub file_type: String,
    pub status: UploadSessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.uid == uid
    }

    pub fn is_pending(&self) -> bool {
        self.status == UploadSessionStatus::Pending
    }
}
