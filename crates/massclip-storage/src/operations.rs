//! Multi-step storage operations.

use std::time::Instant;

use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};
use crate::keys::chunk_key;
use crate::object_store::ObjectStore;

/// The combined object written by [`combine_chunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedObject {
    pub key: String,
    pub size: u64,
    pub url: String,
}

/// Stitch `total_chunks` chunk objects into one object at `r2_key`.
///
/// Chunks are fetched one at a time in index order and concatenated in
/// memory, then written with a single put. Chunk objects are deleted only
/// after that put succeeds; a failed delete is logged and otherwise ignored.
/// If any fetch or the put fails, nothing is cleaned up.
pub async fn combine_chunks(
    store: &dyn ObjectStore,
    r2_key: &str,
    total_chunks: u32,
    content_type: &str,
) -> StorageResult<CombinedObject> {
    if total_chunks == 0 {
        return Err(StorageError::InvalidKey(format!(
            "{}: no chunks to combine",
            r2_key
        )));
    }

    let start = Instant::now();
    let mut combined = Vec::new();
    for index in 0..total_chunks {
        let key = chunk_key(r2_key, index);
        let bytes = store.get(&key).await.map_err(|e| match e {
            StorageError::NotFound(_) => StorageError::NotFound(format!("chunk {} ({})", index, key)),
            other => other,
        })?;
        combined.extend_from_slice(&bytes);
    }

    let size = combined.len() as u64;
    store.put(r2_key, combined, content_type).await?;

    for index in 0..total_chunks {
        let key = chunk_key(r2_key, index);
        if let Err(e) = store.delete(&key).await {
            warn!(key = %key, error = %e, "Failed to delete chunk after combining");
        }
    }

    metrics::histogram!("storage_chunk_combine_seconds").record(start.elapsed().as_secs_f64());
    info!(key = %r2_key, chunks = total_chunks, bytes = size, "Combined upload chunks");

    Ok(CombinedObject {
        key: r2_key.to_string(),
        size,
        url: store.public_url(r2_key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryObjectStore;

    #[tokio::test]
    async fn test_combines_in_index_order_and_cleans_up() {
        let store = MemoryObjectStore::new("https://cdn.test");
        store.put(&chunk_key("k", 1), b"world".to_vec(), "").await.unwrap();
        store.put(&chunk_key("k", 0), b"hello ".to_vec(), "").await.unwrap();

        let combined = combine_chunks(&store, "k", 2, "text/plain").await.unwrap();
        assert_eq!(combined.size, 11);
        assert_eq!(combined.url, "https://cdn.test/k");
        assert_eq!(store.get("k").await.unwrap(), b"hello world");
        assert!(!store.contains(&chunk_key("k", 0)));
        assert!(!store.contains(&chunk_key("k", 1)));
    }

    #[tokio::test]
    async fn test_missing_chunk_fails_without_cleanup() {
        let store = MemoryObjectStore::new("https://cdn.test");
        store.put(&chunk_key("k", 0), b"a".to_vec(), "").await.unwrap();

        let err = combine_chunks(&store, "k", 2, "text/plain").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(store.contains(&chunk_key("k", 0)));
        assert!(!store.contains("k"));
    }

    #[tokio::test]
    async fn test_delete_failures_are_ignored() {
        let store = MemoryObjectStore::new("https://cdn.test");
        store.put(&chunk_key("k", 0), b"a".to_vec(), "").await.unwrap();
        store.fail_deletes(true);

        let combined = combine_chunks(&store, "k", 1, "text/plain").await.unwrap();
        assert_eq!(combined.size, 1);
        assert!(store.contains(&chunk_key("k", 0)));
    }
}
