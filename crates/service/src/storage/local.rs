use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::storage::json_map_store::JsonMapStore;
use crate::storage::{Document, DocumentStore, StoreError, StoreResult};

/// Document store kept in this process: a JSON file on disk, or memory only.
/// Keeps a map of `name -> document` through `JsonMapStore`.
#[derive(Clone)]
pub struct LocalDocumentStore {
    store: Arc<JsonMapStore<String, Document>>,
    backend: &'static str,
}

impl LocalDocumentStore {
    /// Open the store at the given file path. Creates the file if missing.
    pub async fn open<P: Into<PathBuf>>(path: P) -> StoreResult<Self> {
        let path = path.into();
        debug!(path = %path.display(), "opening file document store");
        let store = JsonMapStore::<String, Document>::new(path).await?;
        Ok(Self { store, backend: "file" })
    }

    pub fn in_memory() -> Self {
        Self { store: JsonMapStore::in_memory(), backend: "memory" }
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn backend(&self) -> &'static str {
        self.backend
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Document>> {
        Ok(self.store.get(&key.to_string()).await)
    }

    async fn set(&self, key: &str, doc: Document) -> StoreResult<()> {
        self.store.insert(key.to_string(), doc).await
    }

    async fn update(&self, key: &str, fields: Document) -> StoreResult<()> {
        self.store
            .update_map(|map| {
                let existing = map
                    .get_mut(key)
                    .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
                existing.extend(fields);
                Ok(())
            })
            .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.store.remove(&key.to_string()).await.map(|_| ())
    }

    async fn scan_all(&self) -> StoreResult<Vec<(String, Document)>> {
        Ok(self.store.list().await)
    }
}
