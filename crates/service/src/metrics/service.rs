use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::metrics::domain::{stamped, Clock, MetricMap, MetricValues, SystemClock};
use crate::observability::{record_op, time_call};
use crate::storage::DocumentStore;

/// The four metric operations over a shared document store handle.
/// Holds no per-request state; concurrent callers only meet in the store.
pub struct MetricService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl MetricService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Write `values` plus a fresh `date` at `name`, replacing whatever was there.
    #[instrument(skip(self, values))]
    pub async fn create_or_replace(&self, name: &str, values: MetricValues) -> Result<(), ServiceError> {
        let res = self.create_inner(name, values).await;
        finish("create_or_replace", name, res)
    }

    async fn create_inner(&self, name: &str, values: MetricValues) -> Result<(), ServiceError> {
        if name.is_empty() || values.is_empty() {
            return Err(ServiceError::InvalidInput("Missing data".into()));
        }
        let doc = stamped(values, self.clock.now());
        time_call("set", self.store.set(name, doc)).await?;
        Ok(())
    }

    /// Every stored metric with its full field set, `date` included.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<MetricMap, ServiceError> {
        let res = self.list_inner().await;
        finish("list_all", "*", res)
    }

    async fn list_inner(&self) -> Result<MetricMap, ServiceError> {
        let docs = time_call("scan_all", self.store.scan_all()).await?;
        Ok(docs.into_iter().collect())
    }

    /// Merge `values` into the existing document at `name`. `date` is left alone.
    #[instrument(skip(self, values))]
    pub async fn partial_update(&self, name: &str, values: MetricValues) -> Result<(), ServiceError> {
        let res = self.update_inner(name, values).await;
        finish("partial_update", name, res)
    }

    async fn update_inner(&self, name: &str, values: MetricValues) -> Result<(), ServiceError> {
        if values.is_empty() {
            return Err(ServiceError::InvalidInput("Missing values for update".into()));
        }
        if time_call("get", self.store.get(name)).await?.is_none() {
            return Err(ServiceError::metric_not_found());
        }
        // not atomic with the check above: a concurrent delete surfaces as a store error
        time_call("update", self.store.update(name, values)).await?;
        Ok(())
    }

    /// Remove the metric at `name`.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<(), ServiceError> {
        let res = self.delete_inner(name).await;
        finish("delete", name, res)
    }

    async fn delete_inner(&self, name: &str) -> Result<(), ServiceError> {
        if time_call("get", self.store.get(name)).await?.is_none() {
            return Err(ServiceError::metric_not_found());
        }
        time_call("delete", self.store.delete(name)).await?;
        Ok(())
    }
}

/// Log and count the outcome of one operation.
fn finish<T>(op: &'static str, name: &str, res: Result<T, ServiceError>) -> Result<T, ServiceError> {
    match &res {
        Ok(_) => {
            record_op(op, "ok");
            info!(op, metric = %name, "metric operation succeeded");
        }
        Err(e @ ServiceError::StoreUnavailable(_)) => {
            record_op(op, e.kind());
            error!(op, metric = %name, error = %e, "metric store call failed");
        }
        Err(e) => {
            record_op(op, e.kind());
            warn!(op, metric = %name, error = %e, "metric operation rejected");
        }
    }
    res
}
