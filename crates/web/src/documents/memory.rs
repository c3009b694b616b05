//! In-process document collections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};

use super::{Caller, Document, DocumentStore, StoreError};

/// Document store holding collections in memory.
///
/// Ids are assigned sequentially as `d1`, `d2`, ... across all collections.
/// Documents are returned in insertion order. The id token of the most
/// recent caller is kept for inspection.
#[derive(Clone, Default)]
pub struct MemoryDocuments {
    inner: Arc<MemoryDocumentsInner>,
}

#[derive(Default)]
struct MemoryDocumentsInner {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    next_id: AtomicU64,
    offline: AtomicBool,
    last_id_token: Mutex<Option<String>>,
}

impl MemoryDocuments {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail as if the store were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Store a document under a caller-chosen id, replacing any existing one.
    pub fn put(&self, collection: &str, id: impl Into<String>, fields: Map<String, Value>) {
        let id = id.into();
        let mut collections = self.lock();
        let documents = collections.entry(collection.to_string()).or_default();
        documents.retain(|document| document.id != id);
        documents.push(Document { id, fields });
    }

    /// Id token sent with the most recent operation, `None` if it was anonymous.
    #[must_use]
    pub fn last_id_token(&self) -> Option<String> {
        self.inner
            .last_id_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Document>>> {
        self.inner
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the caller and fail if the store is offline.
    fn begin(&self, caller: &Caller) -> Result<(), StoreError> {
        *self
            .inner
            .last_id_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) =
            caller.id_token().map(|token| token.expose_secret().to_string());

        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                message: "document store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn list(
        &self,
        caller: &Caller,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        self.begin(caller)?;
        Ok(self
            .lock()
            .get(collection)
            .map(|documents| documents.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get(
        &self,
        caller: &Caller,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.begin(caller)?;
        Ok(self
            .lock()
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| document.id == id))
            .cloned())
    }

    async fn query_eq(
        &self,
        caller: &Caller,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.begin(caller)?;
        Ok(self
            .lock()
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| document.fields.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        caller: &Caller,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError> {
        self.begin(caller)?;
        let id = format!("d{}", self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;

    const ANON: Caller = Caller::anonymous();

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_sequential_ids() {
        let store = MemoryDocuments::new();
        let first = store.insert(&ANON, "dogs", fields(json!({ "name": "Bella" }))).await.unwrap();
        let second = store.insert(&ANON, "cats", fields(json!({ "name": "Tom" }))).await.unwrap();
        assert_eq!(first, "d1");
        assert_eq!(second, "d2");
    }

    #[tokio::test]
    async fn test_query_eq_matches_exact_value() {
        let store = MemoryDocuments::new();
        store.insert(&ANON, "dogs", fields(json!({ "name": "Bella", "ownerId": "u1" }))).await.unwrap();
        store.insert(&ANON, "dogs", fields(json!({ "name": "Rex", "ownerId": "u2" }))).await.unwrap();
        store.insert(&ANON, "dogs", fields(json!({ "name": "Stray" }))).await.unwrap();

        let owned = store.query_eq(&ANON, "dogs", "ownerId", &json!("u1")).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].fields["name"], json!("Bella"));
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = MemoryDocuments::new();
        assert!(store.list(&ANON, "dogs", 10).await.unwrap().is_empty());
        assert!(store.get(&ANON, "dogs", "d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_by_id() {
        let store = MemoryDocuments::new();
        store.put("dogs", "bella", fields(json!({ "name": "Bella" })));
        store.put("dogs", "bella", fields(json!({ "name": "Bella II" })));

        let all = store.list(&ANON, "dogs", 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields["name"], json!("Bella II"));
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryDocuments::new();
        store.set_offline(true);
        assert!(matches!(
            store.list(&ANON, "dogs", 3).await,
            Err(StoreError::Api { status: 503, .. })
        ));
        store.set_offline(false);
        assert!(store.list(&ANON, "dogs", 3).await.is_ok());
    }

    #[tokio::test]
    async fn test_records_last_caller() {
        let store = MemoryDocuments::new();
        let user = Caller::user(SecretString::from("tok-1"));
        store.insert(&user, "dogs", fields(json!({ "name": "Bella" }))).await.unwrap();
        assert_eq!(store.last_id_token().as_deref(), Some("tok-1"));

        store.list(&ANON, "dogs", 1).await.unwrap();
        assert!(store.last_id_token().is_none());
    }
}
