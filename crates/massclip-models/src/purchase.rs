//! Purchase aggregate.
//!
//! Every purchase lives in one collection. One-time checkouts use the
//! checkout session ID as the document ID so that the webhook and the
//! verify endpoint converge on the same record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What was bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseKind {
    /// Single payment for a bundle
    #[default]
    OneTime,
    /// Recurring payment for a bundle
    Subscription,
}

impl PurchaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseKind::OneTime => "one_time",
            PurchaseKind::Subscription => "subscription",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "subscription" => PurchaseKind::Subscription,
            _ => PurchaseKind::OneTime,
        }
    }
}

/// Which path wrote the purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    /// Gateway webhook delivery
    Webhook,
    /// Client-invoked session verification
    Verify,
    /// Authenticated grant without payment proof
    ManualGrant,
}

impl PurchaseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseSource::Webhook => "webhook",
            PurchaseSource::Verify => "verify",
            PurchaseSource::ManualGrant => "manual_grant",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "verify" => PurchaseSource::Verify,
            "manual_grant" => PurchaseSource::ManualGrant,
            _ => PurchaseSource::Webhook,
        }
    }
}

impl fmt::Display for PurchaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    #[default]
    Completed,
    Pending,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => PurchaseStatus::Pending,
            "cancelled" => PurchaseStatus::Cancelled,
            _ => PurchaseStatus::Completed,
        }
    }
}

/// A bundle purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub kind: PurchaseKind,
    pub source: PurchaseSource,
    pub buyer_uid: String,
    pub bundle_id: String,
    pub creator_id: String,
    /// Amount in major units
    pub amount: f64,
    pub currency: String,
    pub status: PurchaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment_at: Option<DateTime<Utc>>,
}

impl Purchase {
    pub fn is_active(&self) -> bool {
        self.status == PurchaseStatus::Completed
    }
}
