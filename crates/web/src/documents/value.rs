//! Conversion between JSON maps and Firestore typed values.
//!
//! Firestore wraps every field in a single-key object naming its type:
//! `{"stringValue": "Bella"}`, `{"integerValue": "3"}`,
//! `{"mapValue": {"fields": {...}}}` and so on.

use serde_json::{Map, Number, Value, json};

use super::StoreError;

/// Encode a JSON field map as Firestore `fields`.
pub fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

/// Encode one JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => n.as_i64().map_or_else(
            || json!({ "doubleValue": n.as_f64() }),
            // 64-bit integers travel as strings
            |i| json!({ "integerValue": i.to_string() }),
        ),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode Firestore `fields` into a JSON map.
///
/// # Errors
///
/// Returns `StoreError::Codec` if a field has an unknown or malformed type.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    fields
        .iter()
        .map(|(key, value)| decode_value(value).map(|decoded| (key.clone(), decoded)))
        .collect()
}

/// Decode one Firestore typed value.
///
/// Timestamps, references and bytes come back as their string form.
///
/// # Errors
///
/// Returns `StoreError::Codec` if the value has an unknown or malformed type.
pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(StoreError::Codec(format!("expected typed value, got {value}")));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed(kind, inner)),
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(|i| Value::Number(i.into()))
                .map_err(|_| malformed(kind, inner)),
            Value::Number(n) if n.is_i64() => Ok(Value::Number(n.clone())),
            _ => Err(malformed(kind, inner)),
        },
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| malformed(kind, inner)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed(kind, inner)),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map_or_else(|| Ok(Vec::new()), |values| values.iter().map(decode_value).collect())
            .map(Value::Array),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map_or_else(|| Ok(Map::new()), decode_fields)
            .map(Value::Object),
        other => Err(StoreError::Codec(format!("unsupported value type {other}"))),
    }
}

fn malformed(kind: &str, inner: &Value) -> StoreError {
    StoreError::Codec(format!("malformed {kind}: {inner}"))
}
