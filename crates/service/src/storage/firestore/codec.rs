//! Conversion between plain JSON and Firestore's typed value encoding.
//!
//! Firestore wraps every value in a single-key object naming its type, e.g.
//! `{"integerValue": "42"}` or `{"mapValue": {"fields": {...}}}`.

use serde_json::{json, Map, Number, Value};

use crate::storage::{Document, StoreError, StoreResult};

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => encode_number(n),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn encode_number(n: &Number) -> Value {
    // integerValue is an int64 carried as a decimal string
    if let Some(i) = n.as_i64() {
        return json!({ "integerValue": i.to_string() });
    }
    json!({ "doubleValue": n.as_f64().unwrap_or_default() })
}

/// Encode a document's fields as the `fields` object of a Firestore document.
pub fn encode_fields(doc: &Document) -> Value {
    let fields: Map<String, Value> = doc
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(fields)
}

pub fn decode_value(value: &Value) -> StoreResult<Value> {
    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::Codec(format!("expected typed value object, got {value}")))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::Codec("empty typed value".into()))?;

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => decode_integer(inner)?,
        "doubleValue" => decode_double(inner),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => match inner {
            Value::String(_) => inner.clone(),
            other => Value::String(other.to_string()),
        },
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => {
            let items = match inner.get("values") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(decode_value)
                    .collect::<StoreResult<Vec<_>>>()?,
                _ => Vec::new(),
            };
            Value::Array(items)
        }
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))?),
        other => return Err(StoreError::Codec(format!("unsupported value type `{other}`"))),
    };
    Ok(decoded)
}

fn decode_integer(inner: &Value) -> StoreResult<Value> {
    let parsed = match inner {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed
        .map(|i| Value::Number(i.into()))
        .ok_or_else(|| StoreError::Codec(format!("bad integerValue {inner}")))
}

fn decode_double(inner: &Value) -> Value {
    let f = match inner {
        Value::Number(n) => n.as_f64(),
        // NaN and the infinities arrive as strings and have no JSON form
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    f.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null)
}

/// Decode a Firestore `fields` object; an absent object is an empty document.
pub fn decode_fields(fields: Option<&Value>) -> StoreResult<Document> {
    match fields {
        None | Some(Value::Null) => Ok(Document::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| Ok::<_, StoreError>((k.clone(), decode_value(v)?)))
            .collect(),
        Some(other) => Err(StoreError::Codec(format!("expected fields object, got {other}"))),
    }
}

/// Quote a top-level field name for use in an update mask.
/// Simple identifiers pass through; anything else is back-quoted so dots are
/// not read as nested paths.
pub fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    };
    if simple {
        return name.to_string();
    }
    let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{escaped}`")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars_with_firestore_type_tags() {
        assert_eq!(encode_value(&json!(42)), json!({"integerValue": "42"}));
        assert_eq!(encode_value(&json!(-7)), json!({"integerValue": "-7"}));
        assert_eq!(encode_value(&json!(1.5)), json!({"doubleValue": 1.5}));
        assert_eq!(encode_value(&json!("up")), json!({"stringValue": "up"}));
        assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
        assert_eq!(encode_value(&Value::Null), json!({"nullValue": null}));
    }

    #[test]
    fn u64_beyond_i64_becomes_double() {
        let big = json!(u64::MAX);
        assert!(encode_value(&big).get("doubleValue").is_some());
    }

    #[test]
    fn nested_structures_survive_a_round_trip() -> StoreResult<()> {
        let original = json!({
            "pct": 42,
            "load": [0.5, 1.25, {"core": "c0"}],
            "host": {"name": "web-1", "up": true, "extra": null},
            "empty": [],
        });
        let doc = original.as_object().cloned().unwrap_or_default();
        let encoded = encode_fields(&doc);
        let decoded = decode_fields(Some(&encoded))?;
        assert_eq!(Value::Object(decoded), original);
        Ok(())
    }

    #[test]
    fn decodes_server_only_types() -> StoreResult<()> {
        assert_eq!(
            decode_value(&json!({"timestampValue": "2024-05-01T12:00:00Z"}))?,
            json!("2024-05-01T12:00:00Z")
        );
        assert_eq!(
            decode_value(&json!({"geoPointValue": {"latitude": 1.0, "longitude": 2.0}}))?,
            json!({"latitude": 1.0, "longitude": 2.0})
        );
        assert_eq!(decode_value(&json!({"doubleValue": "NaN"}))?, Value::Null);
        assert_eq!(decode_value(&json!({"arrayValue": {}}))?, json!([]));
        assert_eq!(decode_value(&json!({"mapValue": {}}))?, json!({}));
        Ok(())
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(decode_value(&json!("plain")).is_err());
        assert!(decode_value(&json!({})).is_err());
        assert!(decode_value(&json!({"integerValue": "x1"})).is_err());
        assert!(decode_value(&json!({"mysteryValue": 1})).is_err());
    }

    #[test]
    fn field_paths_quote_non_identifiers() {
        assert_eq!(field_path("pct"), "pct");
        assert_eq!(field_path("_p95"), "_p95");
        assert_eq!(field_path("p.95"), "`p.95`");
        assert_eq!(field_path("9lives"), "`9lives`");
        assert_eq!(field_path("a`b"), "`a\\`b`");
        assert_eq!(field_path(""), "``");
    }
}
