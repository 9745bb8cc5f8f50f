//! FirestoreBackend - Cloud Firestore over REST
//!
//! TigerStyle: Every call is one HTTP request; every failure is a classified
//! [`BackendError`].
//!
//! # Endpoints
//!
//! | Operation | Request                                   |
//! |-----------|-------------------------------------------|
//! | add       | `POST  …/documents/{collection}`          |
//! | query     | `POST  …/documents:runQuery`              |
//! | get       | `POST  …/documents:batchGet`              |
//! | set       | `POST  …/documents:commit`                |
//! | probe     | `POST  …/documents:listCollectionIds`     |
//!
//! `batchGet` reports a missing document as `missing` instead of an HTTP 404,
//! so a 404 always means the database itself is absent.

mod auth;
mod value;

pub use auth::TokenSource;
pub use value::{decode_document, decode_fields, decode_value, encode_fields, encode_value, leaf_paths};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::DocumentBackend;
use crate::config::{ServiceAccount, StoreConfig};
use crate::document::{assert_collection_name, Document, DocumentPath, Fields, Query, SortDirection};
use crate::error::{BackendError, BackendErrorKind, StoreResult};

const DEFAULT_DATABASE: &str = "(default)";
const SERVICE_DISABLED_REASON: &str = "SERVICE_DISABLED";

/// Firestore REST client for one project's default database.
#[derive(Debug)]
pub struct FirestoreBackend {
    client: reqwest::Client,
    tokens: TokenSource,
    endpoint: String,
    /// `projects/{project}/databases/(default)/documents`
    documents_name: String,
}

impl FirestoreBackend {
    /// Build the HTTP client and parse the signing key. Makes no requests.
    ///
    /// # Errors
    /// Returns error if the private key is invalid or the HTTP client cannot
    /// be built.
    pub fn new(account: &ServiceAccount, config: &StoreConfig) -> StoreResult<Self> {
        assert!(!account.project_id.is_empty(), "project id cannot be empty");

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::internal(format!("failed to build HTTP client: {e}")))?;
        let tokens = TokenSource::new(account, &config.token_uri, client.clone())?;

        Ok(Self {
            client,
            tokens,
            endpoint: config.firestore_endpoint.trim_end_matches('/').to_string(),
            documents_name: format!(
                "projects/{}/databases/{}/documents",
                account.project_id, DEFAULT_DATABASE
            ),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.endpoint, self.documents_name, suffix)
    }

    fn document_name(&self, path: &DocumentPath) -> String {
        format!("{}/{}", self.documents_name, path)
    }

    /// POST a JSON body with a bearer token and return the JSON response.
    async fn post(&self, url: &str, body: &Value) -> StoreResult<Value> {
        let token = self.tokens.token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(error_from_response(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| BackendError::internal(format!("malformed Firestore response: {e}")))
    }
}

#[async_trait]
impl DocumentBackend for FirestoreBackend {
    fn name(&self) -> &'static str {
        "firestore"
    }

    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        assert_collection_name(collection);

        let url = self.url(&format!("/{collection}"));
        let resource = self.post(&url, &json!({ "fields": encode_fields(&fields) })).await?;
        decode_document(&resource)
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let (parent, body) = self.run_query_request(query);
        let rows = self.post(&self.url(&format!("{parent}:runQuery")), &body).await?;
        let rows = rows
            .as_array()
            .ok_or_else(|| BackendError::internal("runQuery response is not an array"))?;

        if let Some(error) = rows.iter().find_map(|row| row.get("error")) {
            return Err(error_from_status(error, None));
        }

        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let body = json!({ "documents": [self.document_name(path)] });
        let rows = self.post(&self.url(":batchGet"), &body).await?;
        let rows = rows
            .as_array()
            .ok_or_else(|| BackendError::internal("batchGet response is not an array"))?;

        for row in rows {
            if let Some(found) = row.get("found") {
                return decode_document(found).map(Some);
            }
            if let Some(error) = row.get("error") {
                return Err(error_from_status(error, None));
            }
        }
        Ok(None)
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> StoreResult<()> {
        let mut write = json!({
            "update": {
                "name": self.document_name(path),
                "fields": encode_fields(&fields),
            }
        });
        if merge {
            write["updateMask"] = json!({ "fieldPaths": leaf_paths(&fields) });
        }

        self.post(&self.url(":commit"), &json!({ "writes": [write] }))
            .await
            .map(|_| ())
    }

    async fn probe(&self) -> StoreResult<()> {
        self.post(&self.url(":listCollectionIds"), &json!({ "pageSize": 1 }))
            .await
            .map(|_| ())
    }
}

impl FirestoreBackend {
    /// Split a possibly nested collection into its parent document path and
    /// collection id, and build the structured query.
    fn run_query_request(&self, query: &Query) -> (String, Value) {
        let collection = query.collection_name();
        let (parent, collection_id) = match collection.rsplit_once('/') {
            Some((parent, id)) => (format!("/{parent}"), id),
            None => (String::new(), collection),
        };

        let mut structured = json!({ "from": [{ "collectionId": collection_id }] });
        if let Some((field, direction)) = query.ordering() {
            let direction = match direction {
                SortDirection::Ascending => "ASCENDING",
                SortDirection::Descending => "DESCENDING",
            };
            let field_path = field
                .split('.')
                .map(value::quote_segment)
                .collect::<Vec<_>>()
                .join(".");
            structured["orderBy"] = json!([{ "field": { "fieldPath": field_path }, "direction": direction }]);
        }
        if let Some(limit) = query.max_results() {
            structured["limit"] = json!(limit);
        }

        (parent, json!({ "structuredQuery": structured }))
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::unavailable(format!("Firestore request timed out: {err}"))
    } else if err.is_decode() {
        BackendError::internal(format!("Firestore response unreadable: {err}"))
    } else {
        BackendError::unavailable(format!("Firestore unreachable: {err}"))
    }
}

/// Classify a non-2xx response from its Google error envelope, falling back
/// to the HTTP status when the body is not one.
fn error_from_response(status: reqwest::StatusCode, body: &str) -> BackendError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    // Streaming endpoints wrap the envelope in an array.
    let envelope = parsed.as_ref().and_then(|v| match v {
        Value::Array(items) => items.iter().find_map(|item| item.get("error")),
        other => other.get("error"),
    });

    match envelope {
        Some(error) => error_from_status(error, Some(status)),
        None => BackendError::new(
            kind_from_http(status),
            format!("Firestore returned HTTP {status}"),
        ),
    }
}

/// Classify a `google.rpc.Status` object.
fn error_from_status(error: &Value, http: Option<reqwest::StatusCode>) -> BackendError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string();

    let disabled = error
        .get("details")
        .and_then(Value::as_array)
        .is_some_and(|details| {
            details.iter().any(|detail| {
                detail.get("reason").and_then(Value::as_str) == Some(SERVICE_DISABLED_REASON)
            })
        });
    if disabled {
        return BackendError::service_disabled(message);
    }

    let kind = match error.get("status").and_then(Value::as_str) {
        Some("NOT_FOUND") => BackendErrorKind::NotFound,
        Some("PERMISSION_DENIED") => BackendErrorKind::PermissionDenied,
        Some("UNAUTHENTICATED") => BackendErrorKind::Unauthenticated,
        Some("UNAVAILABLE" | "DEADLINE_EXCEEDED" | "RESOURCE_EXHAUSTED" | "ABORTED") => {
            BackendErrorKind::Unavailable
        }
        Some("INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "OUT_OF_RANGE") => {
            BackendErrorKind::InvalidArgument
        }
        Some(_) => BackendErrorKind::Internal,
        None => http.map_or(BackendErrorKind::Internal, kind_from_http),
    };
    BackendError::new(kind, message)
}

fn kind_from_http(status: reqwest::StatusCode) -> BackendErrorKind {
    match status.as_u16() {
        404 => BackendErrorKind::NotFound,
        401 => BackendErrorKind::Unauthenticated,
        403 => BackendErrorKind::PermissionDenied,
        400 => BackendErrorKind::InvalidArgument,
        408 | 429 | 500..=599 => BackendErrorKind::Unavailable,
        _ => BackendErrorKind::Internal,
    }
}
