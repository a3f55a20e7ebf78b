//! Purchase repository. `purchases` is the only place purchases live.

use massclip_models::Purchase;

use crate::codec::{decode, decode_all};
use crate::collections::PURCHASES;
use crate::error::FirestoreResult;
use crate::store::SharedStore;
use crate::types::{Direction, StructuredQuery, ToFirestoreValue};

#[derive(Clone)]
pub struct PurchaseRepository {
    store: SharedStore,
}

impl PurchaseRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<Purchase>> {
        match self.store.get(PURCHASES, id).await? {
            Some(doc) => Ok(Some(decode(&doc, "id")?)),
            None => Ok(None),
        }
    }

    /// A buyer's purchases, newest first.
    pub async fn list_by_buyer(&self, buyer_uid: &str) -> FirestoreResult<Vec<Purchase>> {
        let query = StructuredQuery::collection(PURCHASES)
            .where_eq("buyerUid", buyer_uid.to_firestore_value())
            .order_by("createdAt", Direction::Descending);
        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }

    pub async fn find_by_subscription(&self, subscription_id: &str) -> FirestoreResult<Vec<Purchase>> {
        let query = StructuredQuery::collection(PURCHASES)
            .where_eq("subscriptionId", subscription_id.to_firestore_value());
        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }

    /// Purchases of one bundle by one buyer.
    pub async fn find_for_bundle(&self, buyer_uid: &str, bundle_id: &str) -> FirestoreResult<Vec<Purchase>> {
        let query = StructuredQuery::collection(PURCHASES)
            .where_eq("buyerUid", buyer_uid.to_firestore_value())
            .where_eq("bundleId", bundle_id.to_firestore_value());
        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }
}
