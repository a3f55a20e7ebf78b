//! Per-content access grants.

use massclip_models::UserAccess;

use crate::codec::{decode, decode_all};
use crate::collections::USER_ACCESS;
use crate::error::FirestoreResult;
use crate::store::SharedStore;
use crate::types::{StructuredQuery, ToFirestoreValue};

#[derive(Clone)]
pub struct AccessRepository {
    store: SharedStore,
}

impl AccessRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The grant for `user_id` on `content_id`, if any.
    pub async fn get(&self, user_id: &str, content_id: &str) -> FirestoreResult<Option<UserAccess>> {
        let id = UserAccess::doc_id(user_id, content_id);
        match self.store.get(USER_ACCESS, &id).await? {
            Some(doc) => Ok(Some(decode(&doc, "id")?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_subscription(&self, subscription_id: &str) -> FirestoreResult<Vec<UserAccess>> {
        let query = StructuredQuery::collection(USER_ACCESS)
            .where_eq("subscriptionId", subscription_id.to_firestore_value());
        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }

    pub async fn find_by_purchase(&self, purchase_id: &str) -> FirestoreResult<Vec<UserAccess>> {
        let query = StructuredQuery::collection(USER_ACCESS)
            .where_eq("purchaseId", purchase_id.to_firestore_value());
        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }
}
