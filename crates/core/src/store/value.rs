//! Conversion between Firestore's typed REST values and plain JSON.
//!
//! Firestore wraps every value in a single-key object naming its type:
//!
//! ```json
//! { "mapValue": { "fields": { "dashboard": { "booleanValue": true } } } }
//! ```

use serde_json::{json, Map, Value};

/// Decode a typed Firestore value into plain JSON.
pub fn decode_value(value: &Value) -> Result<Value, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| format!("expected a typed value object, got {value}"))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| "empty typed value object".to_string())?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| format!("booleanValue is not a bool: {inner}")),
        "integerValue" => {
            // int64 travels as a JSON string.
            let n = match inner {
                Value::String(s) => s
                    .parse::<i64>()
                    .map_err(|e| format!("bad integerValue '{s}': {e}"))?,
                Value::Number(n) => n
                    .as_i64()
                    .ok_or_else(|| format!("bad integerValue {n}"))?,
                other => return Err(format!("bad integerValue {other}")),
            };
            Ok(Value::from(n))
        }
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN and the infinities arrive as strings and have no JSON form.
            Value::String(_) => Ok(Value::Null),
            other => Err(format!("bad doubleValue {other}")),
        },
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vs| vs.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = match inner.get("fields").and_then(Value::as_object) {
                Some(fields) => decode_fields(fields)?,
                None => Map::new(),
            };
            Ok(Value::Object(fields))
        }
        other => Err(format!("unknown Firestore value type '{other}'")),
    }
}

/// Decode a document's `fields` map.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, String> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

/// Encode plain JSON as a typed Firestore value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode a plain JSON object as a document `fields` map.
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}
