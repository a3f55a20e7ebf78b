//! In-process [`DocumentStore`].
//!
//! Follows Firestore semantics closely enough for service tests: masked
//! merges, `exists` preconditions, `increment` transforms, all-or-nothing
//! commits, and structured queries with field filters, one ordering and a
//! limit.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::client::MAX_COMMIT_WRITES;
use crate::error::{FirestoreError, FirestoreResult};
use crate::store::DocumentStore;
use crate::types::{
    CompositeOperator, Direction, Document, DocumentMask, FieldOperator, Filter,
    FromFirestoreValue, StructuredQuery, Value, Write,
};

const ROOT: &str = "projects/memory/databases/(default)/documents";

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    failing_commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with a retryable error.
    pub fn fail_commits(&self, n: usize) {
        self.failing_commits.store(n, AtomicOrdering::SeqCst);
    }

    /// Number of documents currently in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.lock().get(collection).map(|c| c.len()).unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn split_name(name: &str) -> FirestoreResult<(String, String)> {
        let path = name
            .strip_prefix(ROOT)
            .and_then(|p| p.strip_prefix('/'))
            .ok_or_else(|| FirestoreError::request_failed(format!("bad document name: {}", name)))?;
        path.rsplit_once('/')
            .map(|(c, id)| (c.to_string(), id.to_string()))
            .ok_or_else(|| FirestoreError::request_failed(format!("bad document name: {}", name)))
    }

    fn apply(collections: &mut Collections, write: &Write) -> FirestoreResult<()> {
        let target = write
            .target()
            .ok_or_else(|| FirestoreError::request_failed("write has no target"))?;
        let (collection, id) = Self::split_name(target)?;
        let docs = collections.entry(collection.clone()).or_default();

        if let Some(pre) = &write.current_document {
            match (pre.exists, docs.contains_key(&id)) {
                (Some(false), true) => {
                    return Err(FirestoreError::AlreadyExists(format!("{}/{}", collection, id)))
                }
                (Some(true), false) => {
                    return Err(FirestoreError::not_found(format!("{}/{}", collection, id)))
                }
                _ => {}
            }
        }

        if write.delete.is_some() {
            docs.remove(&id);
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let incoming = write
            .update
            .as_ref()
            .and_then(|d| d.fields.clone())
            .unwrap_or_default();
        let doc = docs.entry(id.clone()).or_insert_with(|| Document {
            name: Some(target.to_string()),
            fields: Some(HashMap::new()),
            create_time: Some(now.clone()),
            update_time: None,
        });
        let fields = doc.fields.get_or_insert_with(HashMap::new);

        match &write.update_mask {
            Some(mask) => {
                for path in &mask.field_paths {
                    match incoming.get(path) {
                        Some(v) => {
                            fields.insert(path.clone(), v.clone());
                        }
                        None => {
                            fields.remove(path);
                        }
                    }
                }
            }
            None => *fields = incoming,
        }

        for transform in write.update_transforms.iter().flatten() {
            if let Some(by) = &transform.increment {
                let current = fields.get(&transform.field_path);
                let next = increment(current, by);
                fields.insert(transform.field_path.clone(), next);
            }
        }

        doc.update_time = Some(now);
        Ok(())
    }
}

fn increment(current: Option<&Value>, by: &Value) -> Value {
    let current_is_integer = matches!(current, None | Some(Value::IntegerValue(_)));
    match by {
        Value::IntegerValue(_) if current_is_integer => {
            let base = current.and_then(i64::from_firestore_value).unwrap_or(0);
            let step = i64::from_firestore_value(by).unwrap_or(0);
            Value::IntegerValue((base + step).to_string())
        }
        _ => {
            let base = current.and_then(|v| v.as_f64()).unwrap_or(0.0);
            Value::DoubleValue(base + by.as_f64().unwrap_or(0.0))
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::StringValue(x), Value::StringValue(y))
        | (Value::TimestampValue(x), Value::TimestampValue(y)) => Some(x.cmp(y)),
        (Value::BooleanValue(x), Value::BooleanValue(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn filter_matches(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::CompositeFilter(c) => match c.op {
            CompositeOperator::And => c.filters.iter().all(|f| filter_matches(doc, f)),
        },
        Filter::FieldFilter(f) => {
            let Some(actual) = doc.field(&f.field.field_path) else {
                return false;
            };
            match f.op {
                FieldOperator::Equal => values_equal(actual, &f.value),
                FieldOperator::NotEqual => !values_equal(actual, &f.value),
                FieldOperator::In => match &f.value {
                    Value::ArrayValue(arr) => arr
                        .values
                        .iter()
                        .flatten()
                        .any(|candidate| values_equal(actual, candidate)),
                    _ => false,
                },
                FieldOperator::ArrayContains => match actual {
                    Value::ArrayValue(arr) => {
                        arr.values.iter().flatten().any(|v| values_equal(v, &f.value))
                    }
                    _ => false,
                },
                FieldOperator::LessThan => compare(actual, &f.value) == Some(Ordering::Less),
                FieldOperator::LessThanOrEqual => matches!(
                    compare(actual, &f.value),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                FieldOperator::GreaterThan => compare(actual, &f.value) == Some(Ordering::Greater),
                FieldOperator::GreaterThanOrEqual => matches!(
                    compare(actual, &f.value),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
            }
        }
    }
}

fn collection_path(parent: &str, collection_id: &str) -> String {
    if parent.is_empty() {
        collection_id.to_string()
    } else {
        format!("{}/{}", parent, collection_id)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn document_name(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", ROOT, collection, doc_id)
    }

    async fn get(&self, collection: &str, doc_id: &str) -> FirestoreResult<Option<Document>> {
        Ok(self
            .lock()
            .get(collection)
            .and_then(|c| c.get(doc_id))
            .cloned())
    }

    async fn get_many(&self, collection: &str, doc_ids: &[String]) -> FirestoreResult<Vec<Document>> {
        let guard = self.lock();
        let Some(docs) = guard.get(collection) else {
            return Ok(vec![]);
        };
        Ok(doc_ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
    }

    async fn create(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<()> {
        let write = Write::create(self.document_name(collection, doc_id), fields);
        Self::apply(&mut self.lock(), &write)
    }

    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        mask: Option<Vec<String>>,
    ) -> FirestoreResult<()> {
        let mut write = Write::upsert(self.document_name(collection, doc_id), fields);
        write.update_mask = mask.map(|field_paths| DocumentMask { field_paths });
        Self::apply(&mut self.lock(), &write)
    }

    async fn delete(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        if let Some(c) = self.lock().get_mut(collection) {
            c.remove(doc_id);
        }
        Ok(())
    }

    async fn query(&self, parent: &str, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let path = collection_path(parent, query.collection_id());
        let guard = self.lock();
        let mut docs: Vec<Document> = guard
            .get(&path)
            .map(|c| {
                c.values()
                    .filter(|d| query.filter.as_ref().map(|f| filter_matches(d, f)).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(guard);

        if let Some(order) = query.order_by.first() {
            let field = order.field.field_path.as_str();
            docs.sort_by(|a, b| {
                let ord = match (a.field(field), b.field(field)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit.max(0) as usize);
        }
        Ok(docs)
    }

    async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<()> {
        if writes.len() > MAX_COMMIT_WRITES {
            return Err(FirestoreError::request_failed(format!(
                "Commit exceeds {} write limit",
                MAX_COMMIT_WRITES
            )));
        }
        let injected = self
            .failing_commits
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(FirestoreError::ServerError(503, "commit unavailable".into()));
        }

        let mut guard = self.lock();
        let mut staged = guard.clone();
        for write in &writes {
            Self::apply(&mut staged, write)?;
        }
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToFirestoreValue;

    fn fields(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate() {
        let store = MemoryStore::new();
        store.create("bundles", "b1", HashMap::new()).await.unwrap();
        let err = store.create("bundles", "b1", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, FirestoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.create("purchases", "cs_1", HashMap::new()).await.unwrap();

        let writes = vec![
            Write::create(store.document_name("userAccess", "u_v"), HashMap::new()),
            Write::create(store.document_name("purchases", "cs_1"), HashMap::new()),
        ];
        let err = store.commit(writes).await.unwrap_err();
        assert!(err.is_precondition_failed());
        assert_eq!(store.count("userAccess"), 0);
    }

    #[tokio::test]
    async fn test_commit_enforces_write_limit() {
        let store = MemoryStore::new();
        let writes: Vec<Write> = (0..=MAX_COMMIT_WRITES)
            .map(|i| Write::upsert(store.document_name("userAccess", &i.to_string()), HashMap::new()))
            .collect();
        assert!(store.commit(writes).await.is_err());
        assert_eq!(store.count("userAccess"), 0);
    }

    #[tokio::test]
    async fn test_injected_commit_failure() {
        let store = MemoryStore::new();
        store.fail_commits(1);
        let write = || vec![Write::upsert(store.document_name("userAccess", "a"), HashMap::new())];
        assert!(store.commit(write()).await.unwrap_err().is_retryable());
        store.commit(write()).await.unwrap();
        assert_eq!(store.count("userAccess"), 1);
    }

    #[tokio::test]
    async fn test_increment_transforms() {
        let store = MemoryStore::new();
        let name = store.document_name("bundles", "b1");
        store
            .create("bundles", "b1", fields(&[("totalSales", 2i64.to_firestore_value())]))
            .await
            .unwrap();

        store
            .commit(vec![Write::update(name.clone(), HashMap::new())
                .increment("totalSales", 1i64.to_firestore_value())
                .increment("totalRevenue", 9.99f64.to_firestore_value())])
            .await
            .unwrap();

        let doc = store.get("bundles", "b1").await.unwrap().unwrap();
        assert_eq!(doc.get::<i64>("totalSales"), Some(3));
        assert_eq!(doc.get::<f64>("totalRevenue"), Some(9.99));
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_limits() {
        let store = MemoryStore::new();
        for (id, owner, n) in [("a", "u1", 1i64), ("b", "u2", 2), ("c", "u1", 3), ("d", "u1", 4)] {
            store
                .create(
                    "uploads",
                    id,
                    fields(&[("uid", owner.to_firestore_value()), ("n", n.to_firestore_value())]),
                )
                .await
                .unwrap();
        }

        let docs = store
            .query(
                "",
                StructuredQuery::collection("uploads")
                    .where_eq("uid", "u1".to_firestore_value())
                    .order_by("n", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().filter_map(|d| d.id()).collect();
        assert_eq!(ids, vec!["d", "c"]);
    }

    #[tokio::test]
    async fn test_masked_update_merges() {
        let store = MemoryStore::new();
        store
            .create(
                "users",
                "u1",
                fields(&[("a", 1i64.to_firestore_value()), ("b", 2i64.to_firestore_value())]),
            )
            .await
            .unwrap();
        store
            .update(
                "users",
                "u1",
                fields(&[("b", 5i64.to_firestore_value())]),
                Some(vec!["b".into()]),
            )
            .await
            .unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.get::<i64>("a"), Some(1));
        assert_eq!(doc.get::<i64>("b"), Some(5));
    }
}
