//! Object store abstraction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Shared handle to an object store.
pub type SharedObjectStore = Arc<dyn ObjectStore>;

/// Flat key/bytes storage with public links.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Fetch an object; `NotFound` when the key is absent.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// URL the object is publicly served from.
    fn public_url(&self, key: &str) -> String;
}
