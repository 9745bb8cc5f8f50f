//! Firestore typed-value codec
//!
//! TigerStyle: Plain JSON in, Firestore `Value` objects out, and back.
//!
//! Integers travel as decimal strings (`integerValue`), as the REST API
//! requires. Types with no JSON counterpart (timestamps, references, bytes)
//! decode to strings.

use serde_json::{json, Map, Value};

use crate::document::{Document, Fields};
use crate::error::{BackendError, StoreResult};

// =============================================================================
// Encoding
// =============================================================================

/// Encode one JSON value as a Firestore `Value`.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            if items.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                let values: Vec<Value> = items.iter().map(encode_value).collect();
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode a field map as a Firestore `fields` object.
#[must_use]
pub fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one Firestore `Value` into plain JSON. Unknown shapes become null.
#[must_use]
pub fn decode_value(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return Value::Null;
    };
    let Some((tag, inner)) = object.iter().next() else {
        return Value::Null;
    };

    match tag.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => decode_integer(inner),
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            // "NaN", "Infinity" and friends have no JSON form
            _ => Value::Null,
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect())
                .unwrap_or_default();
            Value::Array(values)
        }
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))),
        _ => Value::Null,
    }
}

fn decode_integer(inner: &Value) -> Value {
    match inner {
        Value::String(s) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(s.clone())),
        Value::Number(_) => inner.clone(),
        _ => Value::Null,
    }
}

/// Decode a Firestore `fields` object. A missing object decodes as empty.
#[must_use]
pub fn decode_fields(fields: Option<&Value>) -> Fields {
    fields
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(name, value)| (name.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode a Firestore `Document` resource. The id is the last segment of
/// its `name`.
///
/// # Errors
/// Returns error if the resource has no usable name.
pub fn decode_document(resource: &Value) -> StoreResult<Document> {
    let name = resource
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::internal("document resource has no name"))?;
    let id = name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BackendError::internal(format!("malformed document name: {name}")))?;

    Ok(Document::new(id, decode_fields(resource.get("fields"))))
}

// =============================================================================
// Field Paths
// =============================================================================

/// Quote a field name for use in a field path when it is not a plain
/// identifier.
#[must_use]
pub fn quote_segment(segment: &str) -> String {
    let plain = segment
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if plain {
        segment.to_string()
    } else {
        format!("`{}`", segment.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Field paths of every leaf in a patch, for a deep-merge update mask.
///
/// Nested objects recurse; an empty nested object is itself a leaf so that
/// it is written as `{}`.
#[must_use]
pub fn leaf_paths(fields: &Fields) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaf_paths(fields, "", &mut paths);
    paths
}

fn collect_leaf_paths(fields: &Fields, prefix: &str, paths: &mut Vec<String>) {
    for (name, value) in fields {
        let path = if prefix.is_empty() {
            quote_segment(name)
        } else {
            format!("{prefix}.{}", quote_segment(name))
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => {
                collect_leaf_paths(nested, &path, paths);
            }
            _ => paths.push(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode_value(&json!(null)), json!({"nullValue": null}));
        assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
        assert_eq!(encode_value(&json!(75)), json!({"integerValue": "75"}));
        assert_eq!(encode_value(&json!(0.5)), json!({"doubleValue": 0.5}));
        assert_eq!(encode_value(&json!("High")), json!({"stringValue": "High"}));
        assert_eq!(encode_value(&json!([])), json!({"arrayValue": {}}));
    }

    #[test]
    fn test_encode_nested() {
        let encoded = encode_fields(&fields(json!({
            "thresholds": {"riskScore": 75},
            "channels": ["email", "sms"]
        })));
        assert_eq!(
            encoded,
            json!({
                "thresholds": {"mapValue": {"fields": {"riskScore": {"integerValue": "75"}}}},
                "channels": {"arrayValue": {"values": [
                    {"stringValue": "email"},
                    {"stringValue": "sms"}
                ]}}
            })
        );
    }

    #[test]
    fn test_decode_document() {
        let resource = json!({
            "name": "projects/p/databases/(default)/documents/flagged_customers/abc123",
            "fields": {
                "name": {"stringValue": "Asha Rao"},
                "riskScore": {"integerValue": "91"},
                "flaggedAt": {"timestampValue": "2025-03-01T10:00:00Z"},
                "tags": {"arrayValue": {}},
                "meta": {"mapValue": {}}
            },
            "createTime": "2025-03-01T10:00:00Z"
        });

        let doc = decode_document(&resource).unwrap();
        assert_eq!(doc.id, "abc123");
        assert_eq!(doc.fields["name"], "Asha Rao");
        assert_eq!(doc.fields["riskScore"], 91);
        assert_eq!(doc.fields["flaggedAt"], "2025-03-01T10:00:00Z");
        assert_eq!(doc.fields["tags"], json!([]));
        assert_eq!(doc.fields["meta"], json!({}));
    }

    #[test]
    fn test_decode_unrepresentable_double() {
        assert_eq!(decode_value(&json!({"doubleValue": "NaN"})), Value::Null);
    }

    #[test]
    fn test_decode_document_without_name() {
        assert!(decode_document(&json!({"fields": {}})).is_err());
    }

    #[test]
    fn test_leaf_paths() {
        let patch = fields(json!({
            "autoEscalate": false,
            "thresholds": {"riskScore": 80, "limits": {"daily": 5}},
            "notes": {},
            "risk-band": "red"
        }));
        let mut paths = leaf_paths(&patch);
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "`risk-band`",
                "autoEscalate",
                "notes",
                "thresholds.limits.daily",
                "thresholds.riskScore",
            ]
        );
    }
}
