//! Upload models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad media class of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    Video,
    Audio,
    Image,
    Document,
    #[default]
    Other,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Video => "video",
            UploadType::Audio => "audio",
            UploadType::Image => "image",
            UploadType::Document => "document",
            UploadType::Other => "other",
        }
    }

    /// Parse from the stored string, defaulting to `Other`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "video" => UploadType::Video,
            "audio" => UploadType::Audio,
            "image" => UploadType::Image,
            "document" => UploadType::Document,
            _ => UploadType::Other,
        }
    }

    /// Classify a MIME type.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("video/") {
            UploadType::Video
        } else if mime.starts_with("audio/") {
            UploadType::Audio
        } else if mime.starts_with("image/") {
            UploadType::Image
        } else if mime.starts_with("text/")
            || mime == "application/pdf"
            || mime.starts_with("application/msword")
            || mime.starts_with("application/vnd.openxmlformats-officedocument")
        {
            UploadType::Document
        } else {
            UploadType::Other
        }
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file the creator has uploaded to object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub id: String,
    /// Owner
    pub uid: String,
    /// Public URL of the stored object
    pub file_url: String,
    /// Object key, when the object lives in our bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2_key: Option<String>,
    pub filename: String,
    pub title: String,
    #[serde(rename = "type")]
    pub upload_type: UploadType,
    /// Size in bytes
    pub size: u64,
    pub mime_type: String,
    /// Duration in seconds for audio/video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Upload {
    /// Title to show when none was given.
    pub fn default_title(filename: &str) -> String {
        match filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => filename.to_string(),
        }
    }
}
