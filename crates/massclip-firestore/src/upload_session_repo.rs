//! Chunked upload session repository.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use massclip_models::{UploadSession, UploadSessionStatus};

use crate::codec::{decode, encode};
use crate::collections::UPLOAD_SESSIONS;
use crate::error::FirestoreResult;
use crate::store::SharedStore;
use crate::types::{ToFirestoreValue, Value};

#[derive(Clone)]
pub struct UploadSessionRepository {
    store: SharedStore,
}

impl UploadSessionRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<UploadSession>> {
        match self.store.get(UPLOAD_SESSIONS, id).await? {
            Some(doc) => Ok(Some(decode(&doc, "id")?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, session: &UploadSession) -> FirestoreResult<()> {
        let fields = encode(session, &["id"])?;
        self.store.create(UPLOAD_SESSIONS, &session.id, fields).await?;
        info!(
            upload_session_id = %session.id,
            uid = %session.uid,
            total_chunks = session.total_chunks,
            "Started chunked upload"
        );
        Ok(())
    }

    async fn set_status(
        &self,
        id: &str,
        status: UploadSessionStatus,
        extra: Option<(&str, Value)>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("updatedAt".to_string(), Utc::now().to_firestore_value());
        if let Some((name, value)) = extra {
            fields.insert(name.to_string(), value);
        }
        let mask = fields.keys().cloned().collect();
        self.store.update(UPLOAD_SESSIONS, id, fields, Some(mask)).await
    }

    pub async fn mark_completed(&self, id: &str, upload_id: &str) -> FirestoreResult<()> {
        self.set_status(
            id,
            UploadSessionStatus::Completed,
            Some(("finalUploadId", upload_id.to_firestore_value())),
        )
        .await
    }

    pub async fn mark_error(&self, id: &str, message: &str) -> FirestoreResult<()> {
        warn!(upload_session_id = %id, error = %message, "Chunked upload failed");
        self.set_status(
            id,
            UploadSessionStatus::Error,
            Some(("errorMessage", message.to_firestore_value())),
        )
        .await
    }
}
