//! Flagged customer endpoints

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{created, newest_first, timestamp_now, ApiError, AppState, ListParams};
use crate::models::FlagCustomerRequest;
use crate::FLAGGED_CUSTOMERS_COLLECTION;

const SAVE_MAY_HAVE_FAILED: &str = "Customer flagged (save may have failed)";

/// `GET /flagged-customers`: newest first by `flaggedAt`.
pub async fn list_flagged(
    State(state): State<AppState>,
    params: Option<Query<ListParams>>,
) -> Json<Vec<Value>> {
    let limit = params.and_then(|Query(p)| p.limit);
    let query = newest_first(FLAGGED_CUSTOMERS_COLLECTION, "flaggedAt", limit);

    let served = state.store.collection_query(&query).await;
    Json(served.value.iter().map(|doc| doc.to_json()).collect())
}

/// `POST /flagged-customers`: validate and store a flag.
pub async fn flag_customer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "unparseable flag body, acknowledging anyway");
            let id = format!("fallback-{}", Utc::now().timestamp_millis());
            return Ok((
                StatusCode::CREATED,
                Json(json!({ "id": id, "_note": SAVE_MAY_HAVE_FAILED })),
            ));
        }
    };

    let request = FlagCustomerRequest::parse(body)?;
    let customer_id = request.customer_id.clone();

    let mut fields = request.into_fields();
    let now = Value::String(timestamp_now());
    fields.insert("flaggedAt".to_string(), now.clone());
    fields.insert("createdAt".to_string(), now.clone());
    fields.insert("updatedAt".to_string(), now);

    let served = state
        .store
        .collection_add(FLAGGED_CUSTOMERS_COLLECTION, fields)
        .await;
    info!(
        customer_id = %customer_id,
        id = %served.value.id,
        persisted = served.is_persisted(),
        "customer flagged"
    );

    Ok(created(&served, SAVE_MAY_HAVE_FAILED))
}
