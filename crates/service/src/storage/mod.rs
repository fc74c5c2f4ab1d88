//! Storage abstractions for the service layer
//!
//! `DocumentStore` is the seam between the metric operations and whatever
//! keeps the documents: Firestore in production, a JSON file or plain memory
//! for local runs and tests.

use async_trait::async_trait;
use thiserror::Error;

pub mod firestore;
pub mod json_map_store;
pub mod local;

pub use firestore::{FirestoreOptions, FirestoreStore, ServiceAccount};
pub use local::LocalDocumentStore;

/// A schema-less document: top-level field name to JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-to-document store reached asynchronously.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> StoreResult<Option<Document>>;

    /// Write `doc` at `key`, replacing any existing document entirely.
    async fn set(&self, key: &str, doc: Document) -> StoreResult<()>;

    /// Merge `fields` into the existing document at `key`.
    /// Fails with `StoreError::NotFound` when nothing is stored there.
    async fn update(&self, key: &str, fields: Document) -> StoreResult<()>;

    /// Remove the document at `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Every `(key, document)` in the collection, in no particular order.
    async fn scan_all(&self) -> StoreResult<Vec<(String, Document)>>;
}
