use std::future::Future;
use std::time::Instant;

use once_cell::sync::Lazy;
use reqwest::StatusCode;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static OPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "metric_store_ops_total",
        "Metric operations handled, by operation and outcome",
        &["op", "outcome"]
    )
    .expect("register metric_store_ops_total")
});

pub static BACKEND_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "metric_store_backend_seconds",
        "Document store call duration in seconds",
        &["call"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("register metric_store_backend_seconds")
});

pub fn record_op(op: &str, outcome: &str) {
    OPS_TOTAL.with_label_values(&[op, outcome]).inc();
}

/// Await a document store call and record how long it took.
pub async fn time_call<T, F>(call: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    BACKEND_SECONDS
        .with_label_values(&[call])
        .observe(start.elapsed().as_secs_f64());
    out
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
