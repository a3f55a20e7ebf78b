//! Creator payout account service: onboarding, cached status, identity
//! relay and earnings.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use massclip_firestore::UserRepository;
use massclip_models::{
    describe_all, AccountRequirements, ConnectAccountState, ConnectStatusSnapshot,
};
use massclip_stripe::{
    Account, BalanceAmount, BalanceTransaction, Charge, IdentitySubmission, Payout, SharedGateway,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{is_valid_date_of_birth, is_valid_ssn_last_4};
use crate::services::status_cache::StatusCacheWriter;

const EARNINGS_PAGE_SIZE: u32 = 10;

/// Payout status as served to the creator dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutStatus {
    pub connected: bool,
    /// Served from the snapshot on the user document
    pub cached: bool,
    /// Gateway was unreachable and the snapshot is past its freshness window
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<ConnectStatusSnapshot>,
}

impl PayoutStatus {
    fn disconnected() -> Self {
        Self {
            connected: false,
            cached: false,
            stale: false,
            account: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingLink {
    pub account_id: String,
    pub url: String,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Earnings {
    pub account_id: String,
    pub available: Vec<BalanceAmount>,
    pub pending: Vec<BalanceAmount>,
    pub recent_payouts: Vec<Payout>,
    pub recent_transactions: Vec<BalanceTransaction>,
    pub recent_charges: Vec<Charge>,
}

/// Map a gateway account onto a snapshot with readable requirements.
pub fn snapshot_from_account(account: &Account, now: DateTime<Utc>) -> ConnectStatusSnapshot {
    let raw = account.requirements.clone().unwrap_or_default();
    let requirements = AccountRequirements {
        currently_due: describe_all(&raw.currently_due),
        past_due: describe_all(&raw.past_due),
        eventually_due: describe_all(&raw.eventually_due),
        pending_verification: describe_all(&raw.pending_verification),
    };
    let status = ConnectAccountState::derive(
        account.charges_enabled,
        account.payouts_enabled,
        account.details_submitted,
        raw.disabled_reason.as_deref(),
        &requirements,
    );

    ConnectStatusSnapshot {
        account_id: account.id.clone(),
        charges_enabled: account.charges_enabled,
        payouts_enabled: account.payouts_enabled,
        details_submitted: account.details_submitted,
        status,
        requirements,
        disabled_reason: raw.disabled_reason,
        last_checked: now,
    }
}

#[derive(Clone)]
pub struct PayoutService {
    users: UserRepository,
    gateway: SharedGateway,
    cache_writer: StatusCacheWriter,
    cache_ttl: Duration,
    app_base_url: String,
}

impl PayoutService {
    pub fn new(
        users: UserRepository,
        gateway: SharedGateway,
        cache_writer: StatusCacheWriter,
        cache_ttl: std::time::Duration,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            gateway,
            cache_writer,
            cache_ttl: Duration::from_std(cache_ttl).unwrap_or_else(|_| Duration::minutes(5)),
            app_base_url: app_base_url.into(),
        }
    }

    async fn account_id(&self, uid: &str) -> ApiResult<String> {
        self.users
            .get(uid)
            .await?
            .and_then(|u| u.stripe_account_id)
            .ok_or_else(|| {
                ApiError::validation("NO_CONNECTED_ACCOUNT", "No payout account is connected")
            })
    }

    /// Status with a freshness cache on the user document.
    pub async fn status(&self, uid: &str) -> ApiResult<PayoutStatus> {
        let Some(user) = self.users.get(uid).await? else {
            return Ok(PayoutStatus::disconnected());
        };
        let Some(account_id) = user.stripe_account_id else {
            return Ok(PayoutStatus::disconnected());
        };

        let now = Utc::now();
        let cached = user
            .stripe_status
            .filter(|snapshot| snapshot.account_id == account_id);

        if let Some(snapshot) = cached.as_ref().filter(|s| s.is_fresh(now, self.cache_ttl)) {
            metrics::record_status_cache(true);
            return Ok(PayoutStatus {
                connected: true,
                cached: true,
                stale: false,
                account: Some(snapshot.clone()),
            });
        }
        metrics::record_status_cache(false);

        match self.gateway.retrieve_account(&account_id).await {
            Ok(account) => {
                let snapshot = snapshot_from_account(&account, now);
                self.cache_writer.submit(uid, snapshot.clone());
                Ok(PayoutStatus {
                    connected: true,
                    cached: false,
                    stale: false,
                    account: Some(snapshot),
                })
            }
            Err(e) => match cached {
                Some(snapshot) => {
                    warn!(uid = %uid, error = %e, "Gateway unavailable, serving stale payout status");
                    Ok(PayoutStatus {
                        connected: true,
                        cached: true,
                        stale: true,
                        account: Some(snapshot),
                    })
                }
                None => Err(e.into()),
            },
        }
    }

    fn refresh_url(&self) -> String {
        format!("{}/dashboard/earnings?refresh=true", self.app_base_url)
    }

    fn return_url(&self) -> String {
        format!("{}/dashboard/earnings?onboarding=complete", self.app_base_url)
    }

    /// Create the connected account when missing and return an onboarding link.
    pub async fn onboard(&self, user: &AuthUser) -> ApiResult<OnboardingLink> {
        let profile = self
            .users
            .get_or_create(&user.uid, user.email.as_deref())
            .await?;

        let (account_id, created) = match profile.stripe_account_id {
            Some(id) => (id, false),
            None => {
                let account = self
                    .gateway
                    .create_express_account(user.email.as_deref(), &user.uid)
                    .await?;
                self.users.set_stripe_account(&user.uid, &account.id).await?;
                info!(uid = %user.uid, account_id = %account.id, "Created connected account");
                (account.id, true)
            }
        };

        let link = self
            .gateway
            .create_account_link(&account_id, &self.refresh_url(), &self.return_url())
            .await?;

        Ok(OnboardingLink {
            account_id,
            url: link.url,
            created,
        })
    }

    /// Fresh continuation link for an existing account.
    pub async fn account_link(&self, uid: &str) -> ApiResult<OnboardingLink> {
        let account_id = self.account_id(uid).await?;
        let link = self
            .gateway
            .create_account_link(&account_id, &self.refresh_url(), &self.return_url())
            .await?;
        Ok(OnboardingLink {
            account_id,
            url: link.url,
            created: false,
        })
    }

    /// Relay identity details to the gateway and drop the cached status.
    pub async fn submit_identity(&self, uid: &str, identity: IdentitySubmission) -> ApiResult<()> {
        if identity.is_empty() {
            return Err(ApiError::validation(
                "MISSING_IDENTITY",
                "Provide ssnLast4, idNumber or dob",
            ));
        }
        if let Some(ssn) = &identity.ssn_last_4 {
            if !is_valid_ssn_last_4(ssn) {
                return Err(ApiError::validation("INVALID_SSN", "ssnLast4 must be 4 digits"));
            }
        }
        if let Some(id_number) = &identity.id_number {
            if id_number.trim().len() < 4 {
                return Err(ApiError::validation("INVALID_ID_NUMBER", "idNumber is too short"));
            }
        }
        if let Some(dob) = &identity.dob {
            if !is_valid_date_of_birth(dob) {
                return Err(ApiError::validation("INVALID_DOB", "dob is not a valid date of birth"));
            }
        }

        let account_id = self.account_id(uid).await?;
        self.gateway
            .update_account_identity(&account_id, &identity)
            .await?;
        self.cache_writer.clear(uid).await?;
        info!(uid = %uid, account_id = %account_id, "Submitted identity details");
        Ok(())
    }

    pub async fn earnings(&self, uid: &str) -> ApiResult<Earnings> {
        let account_id = self.account_id(uid).await?;

        let (balance, payouts, transactions, charges) = tokio::try_join!(
            self.gateway.retrieve_balance(&account_id),
            self.gateway.list_payouts(&account_id, EARNINGS_PAGE_SIZE),
            self.gateway
                .list_balance_transactions(&account_id, EARNINGS_PAGE_SIZE),
            self.gateway.list_charges(&account_id, EARNINGS_PAGE_SIZE),
        )?;

        Ok(Earnings {
            account_id,
            available: balance.available,
            pending: balance.pending,
            recent_payouts: payouts.data,
            recent_transactions: transactions.data,
            recent_charges: charges.data,
        })
    }
}
