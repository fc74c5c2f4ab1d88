use std::sync::Arc;

use service::MetricService;

/// Shared by every handler; the store handle inside is created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricService>,
}

impl AppState {
    pub fn new(metrics: MetricService) -> Self {
        Self { metrics: Arc::new(metrics) }
    }
}
