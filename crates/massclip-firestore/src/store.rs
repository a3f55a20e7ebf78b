//! Storage-agnostic document access.
//!
//! Repositories talk to a [`DocumentStore`] rather than to the REST client so
//! that services can run against [`crate::memory::MemoryStore`] in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{Document, StructuredQuery, Value, Write};

/// Documents fetched in one batchGet call.
const BATCH_GET_LIMIT: usize = 100;

/// Shared handle used by repositories.
pub type SharedStore = Arc<dyn DocumentStore>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Full resource name for `collection/doc_id`, used to address writes.
    fn document_name(&self, collection: &str, doc_id: &str) -> String;

    async fn get(&self, collection: &str, doc_id: &str) -> FirestoreResult<Option<Document>>;

    /// Fetch several documents of one collection. Missing ids are skipped;
    /// the result follows the order of `doc_ids`.
    async fn get_many(&self, collection: &str, doc_ids: &[String]) -> FirestoreResult<Vec<Document>>;

    /// Create a document, failing with `AlreadyExists` if the id is taken.
    async fn create(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<()>;

    /// Merge fields into a document, creating it if absent.
    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        mask: Option<Vec<String>>,
    ) -> FirestoreResult<()>;

    async fn delete(&self, collection: &str, doc_id: &str) -> FirestoreResult<()>;

    /// Run a structured query under `parent` (empty for root collections).
    async fn query(&self, parent: &str, query: StructuredQuery) -> FirestoreResult<Vec<Document>>;

    /// Apply all writes atomically.
    async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<()>;
}

/// Order `docs` to follow `ids`, dropping anything not requested.
pub(crate) fn order_by_ids(ids: &[String], docs: Vec<Document>) -> Vec<Document> {
    let mut by_id: HashMap<String, Document> = docs
        .into_iter()
        .filter_map(|d| d.id().map(str::to_string).map(|id| (id, d)))
        .collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    fn document_name(&self, collection: &str, doc_id: &str) -> String {
        self.full_document_name(collection, doc_id)
    }

    async fn get(&self, collection: &str, doc_id: &str) -> FirestoreResult<Option<Document>> {
        self.with_retry("get_document", || self.get_document(collection, doc_id))
            .await
    }

    async fn get_many(&self, collection: &str, doc_ids: &[String]) -> FirestoreResult<Vec<Document>> {
        let mut found = Vec::with_capacity(doc_ids.len());
        for chunk in doc_ids.chunks(BATCH_GET_LIMIT) {
            let names: Vec<String> = chunk
                .iter()
                .map(|id| self.full_document_name(collection, id))
                .collect();
            let docs = self
                .with_retry("batch_get_documents", || {
                    self.batch_get_documents(names.clone())
                })
                .await?;
            found.extend(docs);
        }
        Ok(order_by_ids(doc_ids, found))
    }

    async fn create(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<()> {
        self.create_document(collection, doc_id, fields).await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        mask: Option<Vec<String>>,
    ) -> FirestoreResult<()> {
        self.update_document(collection, doc_id, fields, mask).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        self.delete_document(collection, doc_id).await
    }

    async fn query(&self, parent: &str, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        self.with_retry("run_query", || self.run_query(parent, query.clone()))
            .await
    }

    async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<()> {
        FirestoreClient::commit(self, writes).await?;
        Ok(())
    }
}
