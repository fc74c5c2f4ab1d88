use thiserror::Error;

use crate::storage::StoreError;

/// Caller-facing failures of the metric operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ServiceError {
    pub fn metric_not_found() -> Self {
        Self::NotFound("Metric not found".into())
    }

    /// Short label used for logs and the ops counter.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

// Every backend failure, including a NotFound raised by the store itself
// after the existence check passed, is an outage from the caller's view.
impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::StoreUnavailable(e.to_string())
    }
}
