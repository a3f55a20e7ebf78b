//! Free content repository.

use massclip_models::FreeContent;

use crate::codec::{decode, decode_all, encode};
use crate::collections::FREE_CONTENT;
use crate::error::FirestoreResult;
use crate::store::SharedStore;
use crate::types::{Direction, StructuredQuery, ToFirestoreValue};

#[derive(Clone)]
pub struct FreeContentRepository {
    store: SharedStore,
}

impl FreeContentRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<FreeContent>> {
        match self.store.get(FREE_CONTENT, id).await? {
            Some(doc) => Ok(Some(decode(&doc, "id")?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, item: &FreeContent) -> FirestoreResult<()> {
        let fields = encode(item, &["id"])?;
        self.store.create(FREE_CONTENT, &item.id, fields).await
    }

    pub async fn delete(&self, id: &str) -> FirestoreResult<()> {
        self.store.delete(FREE_CONTENT, id).await
    }

    /// A creator's free content, newest first.
    pub async fn list_by_user(&self, uid: &str) -> FirestoreResult<Vec<FreeContent>> {
        let query = StructuredQuery::collection(FREE_CONTENT)
            .where_eq("uid", uid.to_firestore_value())
            .order_by("addedAt", Direction::Descending);
        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }

    /// Existing entry for the same source, matched by `originalId` first and
    /// then by `fileUrl`.
    pub async fn find_existing(
        &self,
        uid: &str,
        original_id: &str,
        file_url: &str,
    ) -> FirestoreResult<Option<FreeContent>> {
        for (field, value) in [("originalId", original_id), ("fileUrl", file_url)] {
            if value.is_empty() {
                continue;
            }
            let query = StructuredQuery::collection(FREE_CONTENT)
                .where_eq("uid", uid.to_firestore_value())
                .where_eq(field, value.to_firestore_value())
                .limit(1);
            let docs = self.store.query("", query).await?;
            if let Some(doc) = docs.first() {
                return Ok(Some(decode(doc, "id")?));
            }
        }
        Ok(None)
    }
}
