//! Connected payout account status snapshot.
//!
//! The snapshot is cached on the user document and served verbatim while it
//! is fresh.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::requirements::DescribedRequirement;

/// Outstanding requirements reported by the payment gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequirements {
    #[serde(default)]
    pub currently_due: Vec<DescribedRequirement>,
    #[serde(default)]
    pub past_due: Vec<DescribedRequirement>,
    #[serde(default)]
    pub eventually_due: Vec<DescribedRequirement>,
    #[serde(default)]
    pub pending_verification: Vec<DescribedRequirement>,
}

impl AccountRequirements {
    pub fn has_outstanding(&self) -> bool {
        !self.currently_due.is_empty() || !self.past_due.is_empty()
    }
}

/// Overall account state derived from capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectAccountState {
    /// Charges and payouts enabled
    Active,
    /// Gateway is reviewing submitted information
    PendingVerification,
    /// Onboarding not finished
    Incomplete,
    /// Gateway disabled charges or payouts
    Restricted,
}

impl ConnectAccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectAccountState::Active => "active",
            ConnectAccountState::PendingVerification => "pending_verification",
            ConnectAccountState::Incomplete => "incomplete",
            ConnectAccountState::Restricted => "restricted",
        }
    }

    /// Derive a state from gateway flags.
    pub fn derive(
        charges_enabled: bool,
        payouts_enabled: bool,
        details_submitted: bool,
        disabled_reason: Option<&str>,
        requirements: &AccountRequirements,
    ) -> Self {
        if charges_enabled && payouts_enabled {
            ConnectAccountState::Active
        } else if disabled_reason.is_some_and(|r| !r.starts_with("requirements.pending")) {
            ConnectAccountState::Restricted
        } else if !requirements.pending_verification.is_empty()
            || disabled_reason.is_some()
        {
            ConnectAccountState::PendingVerification
        } else if !details_submitted {
            ConnectAccountState::Incomplete
        } else {
            ConnectAccountState::Restricted
        }
    }
}

/// Cached view of a connected account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectStatusSnapshot {
    pub account_id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub status: ConnectAccountState,
    #[serde(default)]
    pub requirements: AccountRequirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    pub last_checked: DateTime<Utc>,
}

impl ConnectStatusSnapshot {
    /// Whether the snapshot is younger than `ttl` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_checked) < ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(last_checked: DateTime<Utc>) -> ConnectStatusSnapshot {
        ConnectStatusSnapshot {
            account_id: "acct_1".into(),
            charges_enabled: true,
            payouts_enabled: true,
            details_submitted: true,
            status: ConnectAccountState::Active,
            requirements: AccountRequirements::default(),
            disabled_reason: None,
            last_checked,
        }
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc::now();
        let ttl = Duration::minutes(5);
        assert!(snapshot(now - Duration::minutes(4)).is_fresh(now, ttl));
        assert!(!snapshot(now - Duration::minutes(5)).is_fresh(now, ttl));
        assert!(!snapshot(now - Duration::hours(1)).is_fresh(now, ttl));
    }

    #[test]
    fn test_state_derivation() {
        let none = AccountRequirements::default();
        assert_eq!(
            ConnectAccountState::derive(true, true, true, None, &none),
            ConnectAccountState::Active
        );
        assert_eq!(
            ConnectAccountState::derive(false, false, false, None, &none),
            ConnectAccountState::Incomplete
        );
        assert_eq!(
            ConnectAccountState::derive(false, false, true, Some("rejected.fraud"), &none),
            ConnectAccountState::Restricted
        );
        assert_eq!(
            ConnectAccountState::derive(
                false,
                false,
                true,
                Some("requirements.pending_verification"),
                &none
            ),
            ConnectAccountState::PendingVerification
        );
    }
}
