use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::storage::Document;

/// Field the service stamps on every full write.
pub const DATE_FIELD: &str = "date";

/// Caller-supplied payload of a metric; no fixed schema.
pub type MetricValues = Document;

/// All stored metrics keyed by name.
pub type MetricMap = BTreeMap<String, Document>;

/// Source of "now" for the write timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Document written by Create-or-Replace: the values plus a fresh `date`.
/// A caller-supplied `date` is overwritten.
pub fn stamped(values: MetricValues, at: DateTime<Utc>) -> Document {
    let mut doc = values;
    doc.insert(DATE_FIELD.to_string(), serde_json::Value::String(format_timestamp(at)));
    doc
}
