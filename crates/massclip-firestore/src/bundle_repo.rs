//! Bundle repository.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use massclip_models::{Bundle, ContentMetadata};

use crate::codec::{decode, decode_all, encode};
use crate::collections::BUNDLES;
use crate::error::FirestoreResult;
use crate::store::SharedStore;
use crate::types::{to_value, Direction, StructuredQuery, ToFirestoreValue, Value};

/// Partial bundle update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct BundleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub active: Option<bool>,
    pub custom_preview_thumbnail: Option<String>,
    pub price_id: Option<String>,
}

impl BundleUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.active.is_none()
            && self.custom_preview_thumbnail.is_none()
            && self.price_id.is_none()
    }

    fn into_fields(self) -> HashMap<String, Value> {
        let mut fields = HashMap::new();
        if let Some(v) = self.title {
            fields.insert("title".to_string(), v.to_firestore_value());
        }
        if let Some(v) = self.description {
            fields.insert("description".to_string(), v.to_firestore_value());
        }
        if let Some(v) = self.price {
            fields.insert("price".to_string(), v.to_firestore_value());
        }
        if let Some(v) = self.active {
            fields.insert("active".to_string(), v.to_firestore_value());
        }
        if let Some(v) = self.custom_preview_thumbnail {
            fields.insert("customPreviewThumbnail".to_string(), v.to_firestore_value());
        }
        if let Some(v) = self.price_id {
            fields.insert("priceId".to_string(), v.to_firestore_value());
        }
        fields
    }
}

/// Repository for `bundles/{id}`.
#[derive(Clone)]
pub struct BundleRepository {
    store: SharedStore,
}

impl BundleRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<Bundle>> {
        match self.store.get(BUNDLES, id).await? {
            Some(doc) => Ok(Some(decode(&doc, "id")?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, bundle: &Bundle) -> FirestoreResult<()> {
        let fields = encode(bundle, &["id"])?;
        self.store.create(BUNDLES, &bundle.id, fields).await?;
        info!(bundle_id = %bundle.id, creator_id = %bundle.creator_id, "Created bundle");
        Ok(())
    }

    /// A creator's bundles, newest first.
    pub async fn list_by_creator(&self, creator_id: &str) -> FirestoreResult<Vec<Bundle>> {
        let query = StructuredQuery::collection(BUNDLES)
            .where_eq("creatorId", creator_id.to_firestore_value())
            .order_by("createdAt", Direction::Descending);
        let docs = self.store.query("", query).await?;
        Ok(decode_all(&docs, "id"))
    }

    pub async fn update(&self, id: &str, update: BundleUpdate) -> FirestoreResult<()> {
        let mut fields = update.into_fields();
        fields.insert("updatedAt".to_string(), Utc::now().to_firestore_value());
        let mask = fields.keys().cloned().collect();
        self.store.update(BUNDLES, id, fields, Some(mask)).await
    }

    /// Replace the content list together with its recomputed aggregates.
    pub async fn set_content(
        &self,
        id: &str,
        content_items: &[String],
        metadata: &ContentMetadata,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("contentItems".to_string(), content_items.to_vec().to_firestore_value());
        fields.insert(
            "contentCount".to_string(),
            (content_items.len() as u64).to_firestore_value(),
        );
        fields.insert("contentMetadata".to_string(), to_value(metadata)?);
        fields.insert("updatedAt".to_string(), Utc::now().to_firestore_value());

        let mask = fields.keys().cloned().collect();
        self.store.update(BUNDLES, id, fields, Some(mask)).await
    }
}
