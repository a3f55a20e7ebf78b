//! Atomic writes behind purchase fulfillment.
//!
//! A purchase is recorded as one commit: the processed-event marker, the
//! purchase document and the bundle counters are all guarded by
//! preconditions, so a second delivery of the same payment (webhook retry, or
//! the verify endpoint racing the webhook) fails the commit as a whole and
//! writes nothing. Access grants ride along in the same commit, which is why
//! a bundle holds at most [`MAX_FULFILLMENT_GRANTS`] items.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use massclip_models::{AccessStatus, ProcessedEvent, Purchase, PurchaseStatus, UserAccess};

use crate::client::MAX_COMMIT_WRITES;
use crate::codec::encode;
use crate::collections::{BUNDLES, PURCHASES, USER_ACCESS, WEBHOOK_EVENTS};
use crate::error::{FirestoreError, FirestoreResult};
use crate::store::DocumentStore;
use crate::types::{ToFirestoreValue, Write};

/// Guarded writes of a purchase: event marker, purchase and bundle counters.
const GUARDED_WRITES: usize = 3;

/// Most access grants one purchase can fan out to within a single commit.
pub const MAX_FULFILLMENT_GRANTS: usize = MAX_COMMIT_WRITES - GUARDED_WRITES;

/// Result of committing fulfillment writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every write landed.
    Applied,
    /// A guarded document already existed; nothing was written.
    AlreadyApplied,
}

/// Builder for the writes of one fulfillment or subscription transition.
pub struct FulfillmentWrites<'a> {
    store: &'a dyn DocumentStore,
    /// Guarded writes that must land together.
    core: Vec<Write>,
    /// Grant upserts, committed with `core`.
    grants: Vec<Write>,
    /// Unguarded status updates; safe to apply in several commits.
    updates: Vec<Write>,
}

impl<'a> FulfillmentWrites<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            core: Vec::new(),
            grants: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Record the gateway event so redelivery is detected.
    pub fn mark_event(mut self, event: &ProcessedEvent) -> FirestoreResult<Self> {
        let fields = encode(event, &["id"])?;
        self.core.push(Write::create(
            self.store.document_name(WEBHOOK_EVENTS, &event.id),
            fields,
        ));
        Ok(self)
    }

    /// Create the purchase; fails the commit if it already exists.
    pub fn create_purchase(mut self, purchase: &Purchase) -> FirestoreResult<Self> {
        let fields = encode(purchase, &["id"])?;
        self.core.push(Write::create(
            self.store.document_name(PURCHASES, &purchase.id),
            fields,
        ));
        Ok(self)
    }

    /// Add one sale of `amount` to the bundle's counters.
    pub fn count_sale(mut self, bundle_id: &str, amount: f64) -> Self {
        self.core.push(
            Write::update(self.store.document_name(BUNDLES, bundle_id), HashMap::new())
                .increment("totalSales", 1i64.to_firestore_value())
                .increment("totalRevenue", amount.to_firestore_value()),
        );
        self
    }

    /// Write (or overwrite) access grants.
    pub fn grant_access(mut self, grants: &[UserAccess]) -> FirestoreResult<Self> {
        for grant in grants {
            let fields = encode(grant, &["id"])?;
            self.grants.push(Write::upsert(
                self.store.document_name(USER_ACCESS, &grant.id),
                fields,
            ));
        }
        Ok(self)
    }

    /// Set status and `lastPaymentAt` on existing purchases.
    pub fn update_purchases(
        mut self,
        ids: &[String],
        status: PurchaseStatus,
        last_payment_at: Option<DateTime<Utc>>,
    ) -> Self {
        for id in ids {
            let mut fields = HashMap::new();
            fields.insert("status".to_string(), status.as_str().to_firestore_value());
            fields.insert("updatedAt".to_string(), Utc::now().to_firestore_value());
            if let Some(at) = last_payment_at {
                fields.insert("lastPaymentAt".to_string(), at.to_firestore_value());
            }
            self.updates
                .push(Write::update(self.store.document_name(PURCHASES, id), fields));
        }
        self
    }

    /// Set status and `lastPaymentAt` on existing access grants.
    pub fn update_access(
        mut self,
        ids: &[String],
        status: AccessStatus,
        last_payment_at: Option<DateTime<Utc>>,
    ) -> Self {
        for id in ids {
            let mut fields = HashMap::new();
            fields.insert("status".to_string(), status.as_str().to_firestore_value());
            if let Some(at) = last_payment_at {
                fields.insert("lastPaymentAt".to_string(), at.to_firestore_value());
            }
            self.updates
                .push(Write::update(self.store.document_name(USER_ACCESS, id), fields));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.core.len() + self.grants.len() + self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commit the writes.
    ///
    /// Guarded writes and grants land in one commit or not at all; a fan-out
    /// that cannot fit is rejected before anything is written. Status updates
    /// are plain field sets and go out afterwards in chunks.
    pub async fn commit(self) -> FirestoreResult<CommitOutcome> {
        let Self {
            store,
            mut core,
            grants,
            updates,
        } = self;

        if core.len() + grants.len() > MAX_COMMIT_WRITES {
            warn!(
                guarded = core.len(),
                grants = grants.len(),
                "Fulfillment does not fit in one commit"
            );
            return Err(FirestoreError::request_failed(format!(
                "Fulfillment needs {} writes, commit limit is {}",
                core.len() + grants.len(),
                MAX_COMMIT_WRITES
            )));
        }

        core.extend(grants);
        if !core.is_empty() {
            match store.commit(core).await {
                Ok(()) => {}
                Err(e) if e.is_precondition_failed() => {
                    debug!(error = %e, "Fulfillment commit lost a precondition");
                    return Ok(CommitOutcome::AlreadyApplied);
                }
                Err(e) => return Err(e),
            }
        }

        if updates.len() > MAX_COMMIT_WRITES {
            info!(updates = updates.len(), "Splitting status updates across commits");
        }
        for chunk in updates.chunks(MAX_COMMIT_WRITES) {
            store.commit(chunk.to_vec()).await?;
        }

        Ok(CommitOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use massclip_models::{Bundle, PurchaseKind, PurchaseSource};

    fn purchase(id: &str) -> Purchase {
        let now = Utc::now();
        Purchase {
            id: id.into(),
            kind: PurchaseKind::OneTime,
            source: PurchaseSource::Webhook,
            buyer_uid: "buyer".into(),
            bundle_id: "b1".into(),
            creator_id: "creator".into(),
            amount: 9.99,
            currency: "usd".into(),
            status: PurchaseStatus::Completed,
            session_id: Some(id.into()),
            payment_intent_id: None,
            subscription_id: None,
            created_at: now,
            updated_at: now,
            last_payment_at: None,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let bundle = Bundle::new("b1", "creator", "Pack", "", 9.99, "usd");
        store
            .create(BUNDLES, "b1", encode(&bundle, &["id"]).unwrap())
            .await
            .unwrap();
        store
    }

    fn grants(n: usize) -> Vec<UserAccess> {
        (0..n)
            .map(|i| {
                UserAccess::for_video("buyer", &format!("v{}", i), "b1", "cs_1", PurchaseSource::Webhook)
            })
            .collect()
    }

    async fn try_fulfill(
        store: &MemoryStore,
        event_id: &str,
        grant_count: usize,
    ) -> FirestoreResult<CommitOutcome> {
        FulfillmentWrites::new(store)
            .mark_event(&ProcessedEvent::new(event_id, "checkout.session.completed"))?
            .create_purchase(&purchase("cs_1"))?
            .count_sale("b1", 9.99)
            .grant_access(&grants(grant_count))?
            .commit()
            .await
    }

    async fn fulfill(store: &MemoryStore, event_id: &str) -> CommitOutcome {
        try_fulfill(store, event_id, 2).await.unwrap()
    }

    #[tokio::test]
    async fn test_first_commit_applies_everything() {
        let store = seeded().await;
        assert_eq!(fulfill(&store, "evt_1").await, CommitOutcome::Applied);
        assert_eq!(store.count(PURCHASES), 1);
        assert_eq!(store.count(USER_ACCESS), 2);
        assert_eq!(store.count(WEBHOOK_EVENTS), 1);

        let bundle = store.get(BUNDLES, "b1").await.unwrap().unwrap();
        assert_eq!(bundle.get::<i64>("totalSales"), Some(1));
    }

    #[tokio::test]
    async fn test_redelivery_is_a_no_op() {
        let store = seeded().await;
        fulfill(&store, "evt_1").await;
        assert_eq!(fulfill(&store, "evt_1").await, CommitOutcome::AlreadyApplied);
        // A different event for the same session is caught by the purchase id.
        assert_eq!(fulfill(&store, "evt_2").await, CommitOutcome::AlreadyApplied);

        assert_eq!(store.count(PURCHASES), 1);
        assert_eq!(store.count(WEBHOOK_EVENTS), 1);
        let bundle = store.get(BUNDLES, "b1").await.unwrap().unwrap();
        assert_eq!(bundle.get::<i64>("totalSales"), Some(1));
    }

    #[tokio::test]
    async fn test_largest_fan_out_fits_one_commit() {
        let store = seeded().await;
        let outcome = try_fulfill(&store, "evt_1", MAX_FULFILLMENT_GRANTS).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);
        assert_eq!(store.count(USER_ACCESS), MAX_FULFILLMENT_GRANTS);
    }

    #[tokio::test]
    async fn test_oversized_fan_out_writes_nothing() {
        let store = seeded().await;
        assert!(try_fulfill(&store, "evt_1", MAX_FULFILLMENT_GRANTS + 1).await.is_err());
        assert_eq!(store.count(PURCHASES), 0);
        assert_eq!(store.count(WEBHOOK_EVENTS), 0);
        assert_eq!(store.count(USER_ACCESS), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_is_retried_in_full() {
        let store = seeded().await;
        store.fail_commits(1);
        assert!(try_fulfill(&store, "evt_1", 400).await.is_err());
        assert_eq!(store.count(PURCHASES), 0);
        assert_eq!(store.count(USER_ACCESS), 0);

        // Redelivery finds nothing recorded and applies every grant
        let outcome = try_fulfill(&store, "evt_1", 400).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);
        assert_eq!(store.count(PURCHASES), 1);
        assert_eq!(store.count(USER_ACCESS), 400);
    }

    #[tokio::test]
    async fn test_status_updates_are_chunked() {
        let store = seeded().await;
        let ids: Vec<String> = (0..600).map(|i| format!("a{}", i)).collect();
        for id in &ids {
            store.create(USER_ACCESS, id, HashMap::new()).await.unwrap();
        }
        store.create(PURCHASES, "cs_1", HashMap::new()).await.unwrap();

        let outcome = FulfillmentWrites::new(&store)
            .update_purchases(&["cs_1".to_string()], PurchaseStatus::Cancelled, None)
            .update_access(&ids, AccessStatus::Cancelled, None)
            .commit()
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);

        for id in ["a0", "a499", "a599"] {
            let doc = store.get(USER_ACCESS, id).await.unwrap().unwrap();
            assert_eq!(doc.get::<String>("status").as_deref(), Some("cancelled"));
        }
    }
}
