//! Per-content access grants.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::purchase::PurchaseSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// A single content item inside a bundle
    #[default]
    Video,
    /// The bundle as a whole
    ProductBox,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Video => "video",
            AccessType::ProductBox => "product_box",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "product_box" => AccessType::ProductBox,
            _ => AccessType::Video,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    #[default]
    Active,
    Cancelled,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Active => "active",
            AccessStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "cancelled" => AccessStatus::Cancelled,
            _ => AccessStatus::Active,
        }
    }
}

/// "User X may view content Y."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserAccess {
    /// Always `{user_id}_{content_id}`
    pub id: String,
    pub user_id: String,
    pub content_id: String,
    #[serde(rename = "type")]
    pub access_type: AccessType,
    pub bundle_id: String,
    pub purchase_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    pub granted_at: DateTime<Utc>,
    pub granted_by: PurchaseSource,
    pub status: AccessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment_at: Option<DateTime<Utc>>,
}

impl UserAccess {
    /// Deterministic document ID for a grant.
    pub fn doc_id(user_id: &str, content_id: &str) -> String {
        format!("{}_{}", user_id, content_id)
    }

    /// Grant access to one content item of a bundle.
    pub fn for_video(
        user_id: &str,
        content_id: &str,
        bundle_id: &str,
        purchase_id: &str,
        granted_by: PurchaseSource,
    ) -> Self {
        Self {
            id: Self::doc_id(user_id, content_id),
            user_id: user_id.to_string(),
            content_id: content_id.to_string(),
            access_type: AccessType::Video,
            bundle_id: bundle_id.to_string(),
            purchase_id: purchase_id.to_string(),
            subscription_id: None,
            granted_at: Utc::now(),
            granted_by,
            status: AccessStatus::Active,
            last_payment_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccessStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_format() {
        assert_eq!(UserAccess::doc_id("buyer", "vid1"), "buyer_vid1");
        let grant = UserAccess::for_video("buyer", "vid1", "b1", "cs_1", PurchaseSource::Webhook);
        assert_eq!(grant.id, "buyer_vid1");
        assert!(grant.is_active());
        assert_eq!(grant.access_type, AccessType::Video);
    }
}
