//! Intervention endpoints

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::{error, info};

use super::{created, newest_first, timestamp_now, ApiError, AppState, ListParams};
use crate::models::InterventionRequest;
use crate::INTERVENTIONS_COLLECTION;

const SAVE_MAY_HAVE_FAILED: &str = "Intervention logged (save may have failed)";

/// `GET /interventions`: newest first by `approvedAt`.
pub async fn list_interventions(
    State(state): State<AppState>,
    params: Option<Query<ListParams>>,
) -> Json<Vec<Value>> {
    let limit = params.and_then(|Query(p)| p.limit);
    let query = newest_first(INTERVENTIONS_COLLECTION, "approvedAt", limit);

    let served = state.store.collection_query(&query).await;
    Json(served.value.iter().map(|doc| doc.to_json()).collect())
}

/// `POST /interventions`: validate and store an intervention.
///
/// An unreadable body is the one failure this API reports as a 500.
pub async fn log_intervention(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body: Value = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "unparseable intervention body");
        ApiError::InterventionNotLogged
    })?;

    let request = InterventionRequest::parse(body)?;
    let customer_id = request.customer_id.clone();
    let status = request.status;

    let mut fields = request.into_fields();
    let now = Value::String(timestamp_now());
    fields.insert("approvedAt".to_string(), now.clone());
    fields.insert("createdAt".to_string(), now.clone());
    fields.insert("updatedAt".to_string(), now);

    let served = state
        .store
        .collection_add(INTERVENTIONS_COLLECTION, fields)
        .await;
    info!(
        customer_id = %customer_id,
        status = status.as_str(),
        id = %served.value.id,
        persisted = served.is_persisted(),
        "intervention logged"
    );

    Ok(created(&served, SAVE_MAY_HAVE_FAILED))
}
