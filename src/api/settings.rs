//! Alert settings endpoints

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use finguard_store::DocumentPath;

use super::{timestamp_now, ApiError, AppState};
use crate::models::parse_settings_patch;

const SETTINGS_SAVED: &str = "Settings updated";
const SETTINGS_ACCEPTED: &str = "Settings accepted (save may have failed)";

/// `GET /alert-settings`: stored settings over the defaults.
pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    let served = state.store.read_settings().await;
    Json(Value::Object(served.into_value()))
}

/// `POST /alert-settings`: merge the body into the settings document.
pub async fn save_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "unparseable settings body, acknowledging anyway");
            return Ok(Json(json!({ "message": SETTINGS_ACCEPTED, "persisted": false })));
        }
    };

    let mut patch = parse_settings_patch(body)?;
    patch.insert("updatedAt".to_string(), Value::String(timestamp_now()));

    let served = state
        .store
        .document_set(&DocumentPath::settings(), patch, true)
        .await;

    let message = if served.fault.is_some() {
        SETTINGS_ACCEPTED
    } else {
        SETTINGS_SAVED
    };
    info!(persisted = served.is_persisted(), "alert settings saved");

    Ok(Json(json!({
        "message": message,
        "persisted": served.is_persisted(),
    })))
}
