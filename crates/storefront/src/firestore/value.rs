//! Conversion between plain JSON and Firestore's typed value encoding.
//!
//! The REST API wraps every value in a single-key object naming its type
//! (`{"stringValue": "x"}`, `{"mapValue": {"fields": {...}}}`). Documents are
//! decoded into plain JSON so the rest of the crate can use serde directly.

use serde_json::{Map, Value, json};

use super::FirestoreError;

/// Encode a plain JSON value as a Firestore value.
#[must_use]
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode the top-level fields of a document.
#[must_use]
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Decode a Firestore value into plain JSON.
///
/// # Errors
///
/// Returns [`FirestoreError::Decode`] for values that are not single-key
/// typed objects or whose payload does not match the type.
pub fn decode(value: &Value) -> Result<Value, FirestoreError> {
    let Some((kind, payload)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(FirestoreError::Decode(format!("untyped value: {value}")));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => payload
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch(kind, payload)),
        "integerValue" => {
            let parsed = match payload {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed.map(Value::from).ok_or_else(|| mismatch(kind, payload))
        }
        "doubleValue" => {
            let parsed = match payload {
                Value::String(s) => s.parse::<f64>().ok(),
                other => other.as_f64(),
            };
            parsed
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch(kind, payload))
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => payload
            .as_str()
            .map(|s| Value::String(s.to_owned()))
            .ok_or_else(|| mismatch(kind, payload)),
        "geoPointValue" => Ok(payload.clone()),
        "arrayValue" => match payload.get("values") {
            None => Ok(Value::Array(Vec::new())),
            Some(Value::Array(values)) => values
                .iter()
                .map(decode)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Some(other) => Err(mismatch(kind, other)),
        },
        "mapValue" => match payload.get("fields") {
            None => Ok(Value::Object(Map::new())),
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            Some(other) => Err(mismatch(kind, other)),
        },
        other => Err(FirestoreError::Decode(format!("unknown value type {other}"))),
    }
}

/// Decode the top-level fields of a document.
///
/// # Errors
///
/// Returns the first field that fails to decode.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, FirestoreError> {
    fields
        .iter()
        .map(|(k, v)| decode(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

fn mismatch(kind: &str, payload: &Value) -> FirestoreError {
    FirestoreError::Decode(format!("{kind} has unexpected payload {payload}"))
}
