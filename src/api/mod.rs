//! HTTP API
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/alert-settings` | GET | Alert settings over defaults |
//! | `/alert-settings` | POST | Merge-write alert settings |
//! | `/flagged-customers` | GET | Flagged customers, newest first |
//! | `/flagged-customers` | POST | Flag a customer |
//! | `/interventions` | GET | Interventions, newest first |
//! | `/interventions` | POST | Log an intervention |
//! | `/export` | GET | CSV report |
//! | `/health` | GET | Store mode |
//!
//! Every route is also served under `/api`, where the dashboard calls it.

pub mod export;
pub mod flagged;
pub mod health;
pub mod interventions;
pub mod settings;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use finguard_store::constants::QUERY_LIMIT_MAX;
use finguard_store::{Document, Query, ResilientStore, Served, SortDirection};

use crate::models::ValidationError;
use crate::REQUEST_BODY_BYTES_MAX;

// =============================================================================
// State
// =============================================================================

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Document store behind every endpoint
    pub store: Arc<ResilientStore>,
}

impl AppState {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Arc<ResilientStore>) -> Self {
        Self { store }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build the router with the default body limit.
pub fn router(state: AppState) -> Router {
    router_with_body_limit(state, REQUEST_BODY_BYTES_MAX)
}

/// Build the router with a custom body limit in bytes.
pub fn router_with_body_limit(state: AppState, body_limit: usize) -> Router {
    assert!(body_limit > 0, "body limit must be positive");

    let routes = api_routes();
    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/alert-settings",
            get(settings::get_settings).post(settings::save_settings),
        )
        .route(
            "/flagged-customers",
            get(flagged::list_flagged).post(flagged::flag_customer),
        )
        .route(
            "/interventions",
            get(interventions::list_interventions).post(interventions::log_intervention),
        )
        .route("/export", get(export::export_csv))
        .route("/health", get(health::health_check))
}

// =============================================================================
// Errors
// =============================================================================

/// Failures an endpoint reports to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body failed its schema check
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Intervention body could not be read
    #[error("Failed to log intervention")]
    InterventionNotLogged,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InterventionNotLogged => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// `?limit=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListParams {
    /// Maximum rows; zero or absent means all, capped at the store maximum
    pub limit: Option<usize>,
}

/// Newest-first query over a collection.
pub(crate) fn newest_first(collection: &str, field: &str, limit: Option<usize>) -> Query {
    let query = Query::collection(collection).order_by(field, SortDirection::Descending);
    match limit.filter(|limit| *limit > 0) {
        Some(limit) => query.limit(limit.min(QUERY_LIMIT_MAX)),
        None => query,
    }
}

/// Current time as RFC 3339 with milliseconds, `Z` suffix.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Note attached to a write the real backend did not take.
pub(crate) fn persistence_note<T>(served: &Served<T>, on_fault: &'static str) -> Option<&'static str> {
    if served.is_persisted() {
        None
    } else if served.fault.is_some() {
        Some(on_fault)
    } else {
        Some("Backend not connected, data not persisted")
    }
}

/// 201 with the created document, plus `_note` when it was not persisted.
pub(crate) fn created(served: &Served<Document>, on_fault: &'static str) -> (StatusCode, Json<Value>) {
    let mut object = served.value.fields.clone();
    object.insert("id".to_string(), Value::String(served.value.id.clone()));
    if let Some(note) = persistence_note(served, on_fault) {
        object.insert("_note".to_string(), Value::String(note.to_string()));
    }
    (StatusCode::CREATED, Json(Value::Object(object)))
}
