//! Document - Schema-less records, paths and queries
//!
//! TigerStyle: Explicit types, validation, builder pattern.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    COLLECTION_NAME_BYTES_MAX, DOCUMENT_ID_BYTES_MAX, QUERY_LIMIT_MAX, SETTINGS_COLLECTION,
    SETTINGS_DOCUMENT_ID,
};
use crate::error::PathError;

/// Field name to value mapping of a document.
pub type Fields = serde_json::Map<String, Value>;

// =============================================================================
// Document
// =============================================================================

/// A schema-less record identified uniquely within its collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within the collection
    pub id: String,
    /// Document contents
    pub fields: Fields,
}

impl Document {
    /// Create a document.
    ///
    /// # Panics
    /// Panics if id is empty or exceeds limits.
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        let id = id.into();
        // Preconditions
        assert!(!id.is_empty(), "document id cannot be empty");
        assert!(
            id.len() <= DOCUMENT_ID_BYTES_MAX,
            "document id {} bytes exceeds max {}",
            id.len(),
            DOCUMENT_ID_BYTES_MAX
        );

        Self { id, fields }
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a string field.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Flatten into `{ "id": ..., ...fields }`. The document id wins over
    /// any `id` field.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }
}

// =============================================================================
// Document Path
// =============================================================================

/// Address of a single document: `collection/id`, or a nested
/// `collection/id/sub/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

impl DocumentPath {
    /// Parse a slash-separated path.
    ///
    /// # Errors
    /// Returns error if the path is empty, has empty segments, an odd number
    /// of segments, or an oversized segment.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment {
                path: path.to_string(),
            });
        }
        if segments.len() % 2 != 0 {
            return Err(PathError::OddSegments {
                path: path.to_string(),
                count: segments.len(),
            });
        }
        if let Some(long) = segments.iter().find(|s| s.len() > DOCUMENT_ID_BYTES_MAX) {
            return Err(PathError::SegmentTooLong {
                len: long.len(),
                max: DOCUMENT_ID_BYTES_MAX,
            });
        }

        let (id, collection) = segments.split_last().ok_or(PathError::Empty)?;
        Ok(Self {
            collection: collection.join("/"),
            id: (*id).to_string(),
        })
    }

    /// Build a path from a collection and an id.
    ///
    /// # Errors
    /// Same as [`DocumentPath::parse`].
    pub fn new(collection: &str, id: &str) -> Result<Self, PathError> {
        Self::parse(&format!("{collection}/{id}"))
    }

    /// Path of the settings singleton.
    #[must_use]
    pub fn settings() -> Self {
        Self {
            collection: SETTINGS_COLLECTION.to_string(),
            id: SETTINGS_DOCUMENT_ID.to_string(),
        }
    }

    /// Collection part of the path (may itself contain slashes).
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Document id part of the path.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when this is the settings singleton.
    #[must_use]
    pub fn is_settings(&self) -> bool {
        self.collection == SETTINGS_COLLECTION && self.id == SETTINGS_DOCUMENT_ID
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

// =============================================================================
// Query
// =============================================================================

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    #[serde(alias = "asc")]
    Ascending,
    /// Largest first
    #[default]
    #[serde(alias = "desc")]
    Descending,
}

impl SortDirection {
    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// An ordered, optionally limited read of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    order_by: Option<(String, SortDirection)>,
    limit: Option<usize>,
}

impl Query {
    /// Query every document of a collection.
    ///
    /// # Panics
    /// Panics if the collection name is empty or too long.
    #[must_use]
    pub fn collection(name: impl Into<String>) -> Self {
        let collection = name.into();
        assert_collection_name(&collection);
        Self {
            collection,
            order_by: None,
            limit: None,
        }
    }

    /// Order results by a field.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Cap the number of results.
    ///
    /// # Panics
    /// Panics if limit is zero or exceeds [`QUERY_LIMIT_MAX`].
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        assert!(limit > 0, "limit must be positive");
        assert!(
            limit <= QUERY_LIMIT_MAX,
            "limit {limit} exceeds max {QUERY_LIMIT_MAX}"
        );
        self.limit = Some(limit);
        self
    }

    /// Collection being queried.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Sort field and direction, if any.
    #[must_use]
    pub fn ordering(&self) -> Option<(&str, SortDirection)> {
        self.order_by
            .as_ref()
            .map(|(field, direction)| (field.as_str(), *direction))
    }

    /// Result cap, if any.
    #[must_use]
    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Sort and truncate documents in place according to this query.
    ///
    /// The sort is stable, so ties keep insertion order. A document missing
    /// the sort field orders as `null`.
    pub fn apply(&self, documents: &mut Vec<Document>) {
        if let Some((field, direction)) = self.ordering() {
            documents.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            documents.truncate(limit);
        }

        // Postcondition
        assert!(
            self.limit.map_or(true, |limit| documents.len() <= limit),
            "result count exceeds limit"
        );
    }
}

/// Assert a collection name is usable.
///
/// # Panics
/// Panics if the name is empty or too long.
pub(crate) fn assert_collection_name(name: &str) {
    assert!(!name.is_empty(), "collection name cannot be empty");
    assert!(
        name.len() <= COLLECTION_NAME_BYTES_MAX,
        "collection name {} bytes exceeds max {}",
        name.len(),
        COLLECTION_NAME_BYTES_MAX
    );
}

// =============================================================================
// Value Ordering and Merging
// =============================================================================

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array <
/// object, then by value within a type.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.total_cmp(&y)
                }
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((kx, vx), (ky, vy))| kx.cmp(ky).then_with(|| compare_values(vx, vy)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Merge `patch` into `target`. Nested maps merge recursively; every other
/// value replaces what was there.
pub fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_fields(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_path_parse() {
        let path = DocumentPath::parse("flagged_customers/abc").unwrap();
        assert_eq!(path.collection(), "flagged_customers");
        assert_eq!(path.id(), "abc");
        assert_eq!(path.to_string(), "flagged_customers/abc");
    }

    #[test]
    fn test_path_parse_nested() {
        let path = DocumentPath::parse("/customers/c1/notes/n1/").unwrap();
        assert_eq!(path.collection(), "customers/c1/notes");
        assert_eq!(path.id(), "n1");
    }

    #[test]
    fn test_path_parse_rejects_bad_paths() {
        assert_eq!(DocumentPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            DocumentPath::parse("settings"),
            Err(PathError::OddSegments { count: 1, .. })
        ));
        assert!(matches!(
            DocumentPath::parse("settings//x"),
            Err(PathError::EmptySegment { .. })
        ));
    }

    #[test]
    fn test_settings_path() {
        let path = DocumentPath::settings();
        assert!(path.is_settings());
        assert_eq!(DocumentPath::parse("settings/global_config").unwrap(), path);
    }

    #[test]
    fn test_sort_direction_from_str() {
        assert_eq!(SortDirection::from_str("DESC"), Some(SortDirection::Descending));
        assert_eq!(SortDirection::from_str("asc"), Some(SortDirection::Ascending));
        assert_eq!(SortDirection::from_str("sideways"), None);
    }

    #[test]
    fn test_document_to_json_id_wins() {
        let doc = Document::new("doc-1", fields(json!({"id": "CUST-9", "name": "Asha"})));
        assert_eq!(doc.to_json(), json!({"id": "doc-1", "name": "Asha"}));
    }

    #[test]
    fn test_compare_values_cross_type() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(99), &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!(1.5), &json!(2)), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 2, 0])), Ordering::Less);
    }

    #[test]
    fn test_query_apply_sorts_and_limits() {
        let mut docs = vec![
            Document::new("a", fields(json!({"flaggedAt": "2025-01-02T00:00:00.000Z"}))),
            Document::new("b", fields(json!({"flaggedAt": "2025-01-03T00:00:00.000Z"}))),
            Document::new("c", fields(json!({"note": "no timestamp"}))),
            Document::new("d", fields(json!({"flaggedAt": "2025-01-01T00:00:00.000Z"}))),
        ];

        Query::collection("flagged_customers")
            .order_by("flaggedAt", SortDirection::Descending)
            .limit(3)
            .apply(&mut docs);

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "d"]);
    }

    #[test]
    fn test_query_apply_is_stable() {
        let mut docs = vec![
            Document::new("first", fields(json!({"rank": 1}))),
            Document::new("second", fields(json!({"rank": 1}))),
        ];
        Query::collection("c")
            .order_by("rank", SortDirection::Ascending)
            .apply(&mut docs);
        assert_eq!(docs[0].id, "first");
        assert_eq!(docs[1].id, "second");
    }

    #[test]
    #[should_panic(expected = "limit")]
    fn test_query_limit_too_large() {
        let _ = Query::collection("c").limit(QUERY_LIMIT_MAX + 1);
    }

    #[test]
    fn test_merge_fields_deep() {
        let mut target = fields(json!({
            "thresholds": {"riskScore": 75, "utilization": 80},
            "autoEscalate": true
        }));
        merge_fields(
            &mut target,
            fields(json!({"thresholds": {"riskScore": 90}, "updatedAt": "now"})),
        );
        assert_eq!(
            Value::Object(target),
            json!({
                "thresholds": {"riskScore": 90, "utilization": 80},
                "autoEscalate": true,
                "updatedAt": "now"
            })
        );
    }
}
