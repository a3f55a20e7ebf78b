//! User profile model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::connect_status::ConnectStatusSnapshot;

/// User document. Created on signup, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_pic: Option<String>,
    /// Connected payout account
    pub stripe_account_id: Option<String>,
    /// Last fetched payout account status
    pub stripe_status: Option<ConnectStatusSnapshot>,
    #[serde(default)]
    pub profile_views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            email,
            username: None,
            display_name: None,
            profile_pic: None,
            stripe_account_id: None,
            stripe_status: None,
            profile_views: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
