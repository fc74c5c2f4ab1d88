pub mod domain;
pub mod service;

pub use domain::{format_timestamp, Clock, MetricMap, MetricValues, SystemClock, DATE_FIELD};
pub use service::MetricService;
