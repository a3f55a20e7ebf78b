//! Purchase fulfillment.
//!
//! Three writers converge on the same documents: webhook deliveries, the
//! client-invoked verify endpoint and (when enabled) the unverified grant
//! endpoint. All of them go through [`PurchaseService::fulfill`], which records
//! the purchase, the access fan-out and the bundle counters in one guarded
//! commit. Purchase ids are deterministic, so whichever writer commits second
//! finds the guard taken and writes nothing.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use massclip_firestore::{
    AccessRepository, BundleRepository, CommitOutcome, FulfillmentWrites, PurchaseRepository,
    SharedStore, UploadRepository,
};
use massclip_models::{
    from_minor_units, AccessStatus, Bundle, ProcessedEvent, Purchase, PurchaseKind,
    PurchaseSource, PurchaseStatus, UserAccess,
};
use massclip_stripe::{CheckoutSession, EventKind, Invoice, SharedGateway, Subscription, WebhookEvent};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::bundles::PRODUCT_BOX_TYPE;

/// What a webhook delivery amounted to, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Fulfilled,
    Duplicate,
    Renewed,
    Cancelled,
    /// Valid event we do not act on, or one that referenced nothing we know
    Ignored,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Fulfilled => "fulfilled",
            EventOutcome::Duplicate => "duplicate",
            EventOutcome::Renewed => "renewed",
            EventOutcome::Cancelled => "cancelled",
            EventOutcome::Ignored => "ignored",
        }
    }
}

/// Result of a fulfillment attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fulfillment {
    pub already_processed: bool,
    pub purchase: Purchase,
}

/// Why the caller may (or may not) view a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    Owner,
    Purchased,
    BundlePurchase,
    NoAccess,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheck {
    pub has_access: bool,
    pub reason: AccessReason,
}

impl AccessCheck {
    fn granted(reason: AccessReason) -> Self {
        Self {
            has_access: reason != AccessReason::NoAccess,
            reason,
        }
    }
}

/// Purchase id for an unverified grant. One per buyer and bundle.
pub fn manual_grant_id(buyer_uid: &str, bundle_id: &str) -> String {
    format!("grant_{}_{}", buyer_uid, bundle_id)
}

/// A purchase about to be recorded.
struct PendingPurchase<'a> {
    purchase: Purchase,
    bundle: &'a Bundle,
    event: Option<&'a ProcessedEvent>,
    count_sale: bool,
}

#[derive(Clone)]
pub struct PurchaseService {
    store: SharedStore,
    purchases: PurchaseRepository,
    access: AccessRepository,
    bundles: BundleRepository,
    uploads: UploadRepository,
    gateway: SharedGateway,
    allow_unverified_grants: bool,
}

impl PurchaseService {
    pub fn new(
        store: SharedStore,
        gateway: SharedGateway,
        allow_unverified_grants: bool,
    ) -> Self {
        Self {
            purchases: PurchaseRepository::new(store.clone()),
            access: AccessRepository::new(store.clone()),
            bundles: BundleRepository::new(store.clone()),
            uploads: UploadRepository::new(store.clone()),
            store,
            gateway,
            allow_unverified_grants,
        }
    }

    /// Dispatch a verified webhook event.
    pub async fn handle_event(&self, event: &WebhookEvent) -> ApiResult<EventOutcome> {
        match &event.kind {
            EventKind::CheckoutSessionCompleted(session) => {
                let marker = ProcessedEvent::new(&event.id, &event.event_type);
                self.checkout_completed(session, &marker).await
            }
            EventKind::InvoicePaymentSucceeded(invoice) => self.invoice_paid(invoice).await,
            EventKind::SubscriptionDeleted(subscription) => {
                self.subscription_deleted(subscription).await
            }
            EventKind::Unhandled => Ok(EventOutcome::Ignored),
        }
    }

    async fn checkout_completed(
        &self,
        session: &CheckoutSession,
        marker: &ProcessedEvent,
    ) -> ApiResult<EventOutcome> {
        let Some(bundle_id) = session.metadata_value("productBoxId") else {
            info!(session_id = %session.id, "Checkout has no bundle reference, ignoring");
            return Ok(EventOutcome::Ignored);
        };
        let kind = session.metadata_value("type").unwrap_or(PRODUCT_BOX_TYPE);
        if kind != PRODUCT_BOX_TYPE {
            info!(session_id = %session.id, checkout_type = %kind, "Ignoring checkout of unsupported type");
            return Ok(EventOutcome::Ignored);
        }
        let Some(buyer_uid) = session.metadata_value("buyerUid") else {
            warn!(session_id = %session.id, "Checkout has no buyer, ignoring");
            return Ok(EventOutcome::Ignored);
        };

        let Some(bundle) = self.bundles.get(bundle_id).await? else {
            error!(session_id = %session.id, bundle_id = %bundle_id, "Checkout references a missing bundle");
            return Ok(EventOutcome::Ignored);
        };

        let fulfillment = self
            .fulfill_checkout(session, buyer_uid, &bundle, Some(marker), PurchaseSource::Webhook)
            .await?;
        Ok(if fulfillment.already_processed {
            EventOutcome::Duplicate
        } else {
            EventOutcome::Fulfilled
        })
    }

    /// Record a paid checkout session for `buyer_uid`.
    pub async fn fulfill_checkout(
        &self,
        session: &CheckoutSession,
        buyer_uid: &str,
        bundle: &Bundle,
        event: Option<&ProcessedEvent>,
        source: PurchaseSource,
    ) -> ApiResult<Fulfillment> {
        let now = Utc::now();
        let amount = session
            .amount_total
            .map(from_minor_units)
            .unwrap_or(bundle.price);
        let kind = if session.subscription.is_some() {
            PurchaseKind::Subscription
        } else {
            PurchaseKind::OneTime
        };

        let purchase = Purchase {
            id: session.id.clone(),
            kind,
            source,
            buyer_uid: buyer_uid.to_string(),
            bundle_id: bundle.id.clone(),
            creator_id: bundle.creator_id.clone(),
            amount,
            currency: session
                .currency
                .clone()
                .unwrap_or_else(|| bundle.currency.clone()),
            status: PurchaseStatus::Completed,
            session_id: Some(session.id.clone()),
            payment_intent_id: session.payment_intent.clone(),
            subscription_id: session.subscription.clone(),
            created_at: now,
            updated_at: now,
            last_payment_at: Some(now),
        };

        self.fulfill(PendingPurchase {
            purchase,
            bundle,
            event,
            count_sale: true,
        })
        .await
    }

    async fn fulfill(&self, pending: PendingPurchase<'_>) -> ApiResult<Fulfillment> {
        let PendingPurchase {
            purchase,
            bundle,
            event,
            count_sale,
        } = pending;

        let grants: Vec<UserAccess> = bundle
            .content_items
            .iter()
            .map(|content_id| {
                let mut grant = UserAccess::for_video(
                    &purchase.buyer_uid,
                    content_id,
                    &bundle.id,
                    &purchase.id,
                    purchase.source,
                );
                grant.subscription_id = purchase.subscription_id.clone();
                grant.last_payment_at = purchase.last_payment_at;
                grant
            })
            .collect();

        let mut writes = FulfillmentWrites::new(self.store.as_ref());
        if let Some(event) = event {
            writes = writes.mark_event(event)?;
        }
        writes = writes.create_purchase(&purchase)?;
        if count_sale {
            writes = writes.count_sale(&bundle.id, purchase.amount);
        }
        writes = writes.grant_access(&grants)?;

        match writes.commit().await? {
            CommitOutcome::Applied => {
                metrics::record_purchase_fulfilled(purchase.source.as_str(), grants.len());
                info!(
                    purchase_id = %purchase.id,
                    buyer_uid = %purchase.buyer_uid,
                    bundle_id = %bundle.id,
                    source = %purchase.source,
                    grants = grants.len(),
                    "Recorded purchase"
                );
                Ok(Fulfillment {
                    already_processed: false,
                    purchase,
                })
            }
            CommitOutcome::AlreadyApplied => {
                info!(purchase_id = %purchase.id, source = %purchase.source, "Purchase already recorded");
                let stored = self.purchases.get(&purchase.id).await?.unwrap_or(purchase);
                Ok(Fulfillment {
                    already_processed: true,
                    purchase: stored,
                })
            }
        }
    }

    async fn invoice_paid(&self, invoice: &Invoice) -> ApiResult<EventOutcome> {
        let Some(subscription_id) = invoice.subscription.as_deref() else {
            return Ok(EventOutcome::Ignored);
        };
        self.set_subscription_state(
            subscription_id,
            PurchaseStatus::Completed,
            AccessStatus::Active,
            true,
        )
        .await
        .map(|touched| {
            if touched {
                EventOutcome::Renewed
            } else {
                EventOutcome::Ignored
            }
        })
    }

    async fn subscription_deleted(&self, subscription: &Subscription) -> ApiResult<EventOutcome> {
        self.set_subscription_state(
            &subscription.id,
            PurchaseStatus::Cancelled,
            AccessStatus::Cancelled,
            false,
        )
        .await
        .map(|touched| {
            if touched {
                EventOutcome::Cancelled
            } else {
                EventOutcome::Ignored
            }
        })
    }

    /// Move every purchase and grant of a subscription to the given state in
    /// one batch. Returns whether anything matched.
    async fn set_subscription_state(
        &self,
        subscription_id: &str,
        purchase_status: PurchaseStatus,
        access_status: AccessStatus,
        paid: bool,
    ) -> ApiResult<bool> {
        let (purchases, grants) = tokio::try_join!(
            self.purchases.find_by_subscription(subscription_id),
            self.access.find_by_subscription(subscription_id),
        )?;
        if purchases.is_empty() && grants.is_empty() {
            warn!(subscription_id = %subscription_id, "No purchases found for subscription");
            return Ok(false);
        }

        let last_payment_at = paid.then(Utc::now);
        let purchase_ids: Vec<String> = purchases.into_iter().map(|p| p.id).collect();
        let grant_ids: Vec<String> = grants.into_iter().map(|g| g.id).collect();

        FulfillmentWrites::new(self.store.as_ref())
            .update_purchases(&purchase_ids, purchase_status, last_payment_at)
            .update_access(&grant_ids, access_status, last_payment_at)
            .commit()
            .await?;

        info!(
            subscription_id = %subscription_id,
            purchases = purchase_ids.len(),
            grants = grant_ids.len(),
            status = %access_status.as_str(),
            "Updated subscription access"
        );
        Ok(true)
    }

    /// Confirm a checkout session with the gateway and record it.
    pub async fn verify(&self, caller_uid: &str, session_id: &str) -> ApiResult<Fulfillment> {
        let session = self
            .gateway
            .retrieve_checkout_session(session_id, None)
            .await
            .map_err(|e| match e.status() {
                Some(404) => ApiError::not_found(format!("Checkout session {} not found", session_id)),
                _ => e.into(),
            })?;

        if !session.is_paid() {
            return Err(ApiError::validation(
                "PAYMENT_NOT_COMPLETED",
                format!(
                    "Payment status is '{}'",
                    session.payment_status.as_deref().unwrap_or("unknown")
                ),
            ));
        }
        let bundle_id = session.metadata_value("productBoxId").ok_or_else(|| {
            ApiError::validation(
                "MISSING_PRODUCT_BOX_ID",
                "Checkout session metadata has no productBoxId; it was not created for a bundle",
            )
        })?;
        if let Some(buyer) = session.metadata_value("buyerUid") {
            if buyer != caller_uid {
                return Err(ApiError::forbidden("Checkout session belongs to another user"));
            }
        }

        if let Some(existing) = self.purchases.get(&session.id).await? {
            return Ok(Fulfillment {
                already_processed: true,
                purchase: existing,
            });
        }

        let bundle = self
            .bundles
            .get(bundle_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Bundle {} not found", bundle_id)))?;

        self.fulfill_checkout(&session, caller_uid, &bundle, None, PurchaseSource::Verify)
            .await
    }

    /// Grant access to a bundle without payment proof.
    pub async fn grant_immediate_access(
        &self,
        caller_uid: &str,
        bundle_id: &str,
    ) -> ApiResult<Fulfillment> {
        if !self.allow_unverified_grants {
            return Err(ApiError::forbidden("Unverified access grants are disabled"));
        }

        let bundle = self
            .bundles
            .get(bundle_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Bundle {} not found", bundle_id)))?;

        warn!(
            uid = %caller_uid,
            bundle_id = %bundle_id,
            "Granting bundle access without payment verification"
        );

        let now = Utc::now();
        let purchase = Purchase {
            id: manual_grant_id(caller_uid, bundle_id),
            kind: PurchaseKind::OneTime,
            source: PurchaseSource::ManualGrant,
            buyer_uid: caller_uid.to_string(),
            bundle_id: bundle.id.clone(),
            creator_id: bundle.creator_id.clone(),
            amount: 0.0,
            currency: bundle.currency.clone(),
            status: PurchaseStatus::Completed,
            session_id: None,
            payment_intent_id: None,
            subscription_id: None,
            created_at: now,
            updated_at: now,
            last_payment_at: None,
        };

        self.fulfill(PendingPurchase {
            purchase,
            bundle: &bundle,
            event: None,
            count_sale: false,
        })
        .await
    }

    pub async fn list_purchases(&self, buyer_uid: &str) -> ApiResult<Vec<Purchase>> {
        Ok(self.purchases.list_by_buyer(buyer_uid).await?)
    }

    pub async fn check_access(&self, uid: &str, content_id: &str) -> ApiResult<AccessCheck> {
        if let Some(upload) = self.uploads.get(content_id).await? {
            if upload.uid == uid {
                return Ok(AccessCheck::granted(AccessReason::Owner));
            }
        }

        if let Some(grant) = self.access.get(uid, content_id).await? {
            if grant.is_active() {
                return Ok(AccessCheck::granted(AccessReason::Purchased));
            }
        }

        for purchase in self.purchases.list_by_buyer(uid).await? {
            if !purchase.is_active() {
                continue;
            }
            if let Some(bundle) = self.bundles.get(&purchase.bundle_id).await? {
                if bundle.contains(content_id) {
                    return Ok(AccessCheck::granted(AccessReason::BundlePurchase));
                }
            }
        }

        Ok(AccessCheck::granted(AccessReason::NoAccess))
    }
}
