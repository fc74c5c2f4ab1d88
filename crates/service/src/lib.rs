//! Service layer for the metric store.
//! - `metrics` holds the four record operations and the timestamping rule.
//! - `storage` abstracts the remote document store behind `DocumentStore`.
//! - Errors are split into store-level (`StoreError`) and caller-facing (`ServiceError`).

pub mod errors;
pub mod metrics;
pub mod observability;
pub mod storage;

pub use errors::ServiceError;
pub use metrics::MetricService;
pub use storage::{Document, DocumentStore, StoreError};
