//! Upload repository.

use tracing::info;

use massclip_models::{Upload, UploadType};

use crate::codec::{decode, decode_all, encode};
use crate::collections::UPLOADS;
use crate::error::FirestoreResult;
use crate::store::SharedStore;
use crate::types::{Direction, StructuredQuery, ToFirestoreValue};

/// Repository for `uploads/{id}`.
#[derive(Clone)]
pub struct UploadRepository {
    store: SharedStore,
}

impl UploadRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<Upload>> {
        match self.store.get(UPLOADS, id).await? {
            Some(doc) => Ok(Some(decode(&doc, "id")?)),
            None => Ok(None),
        }
    }

    /// Fetch uploads by id, in the order given. Missing ids are skipped.
    pub async fn get_many(&self, ids: &[String]) -> FirestoreResult<Vec<Upload>> {
        let docs = self.store.get_many(UPLOADS, ids).await?;
        Ok(decode_all(&docs, "id"))
    }

    pub async fn create(&self, upload: &Upload) -> FirestoreResult<()> {
        let fields = encode(upload, &["id"])?;
        self.store.create(UPLOADS, &upload.id, fields).await?;
        info!(upload_id = %upload.id, uid = %upload.uid, "Created upload record");
        Ok(())
    }

    /// A user's uploads, newest first.
    pub async fn list_by_user(
        &self,
        uid: &str,
        upload_type: Option<UploadType>,
        limit: u32,
    ) -> FirestoreResult<Vec<Upload>> {
        let mut query = StructuredQuery::collection(UPLOADS).where_eq("uid", uid.to_firestore_value());
        if let Some(kind) = upload_type {
            query = query.where_eq("type", kind.as_str().to_firestore_value());
        }
        let query = query.order_by("createdAt", Direction::Descending).limit(limit);

        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }
}
