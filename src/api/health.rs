//! Health endpoint

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use finguard_store::StoreMode;

use super::AppState;
use crate::APP_VERSION;

/// `GET /health`: always 200; `degraded` once the store is in fallback.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.store.health().snapshot();
    let status = if snapshot.mode == StoreMode::Fallback {
        "degraded"
    } else {
        "ok"
    };

    Json(json!({
        "status": status,
        "version": APP_VERSION,
        "backend": {
            "mode": snapshot.mode,
            "connected": snapshot.mode.is_real(),
            "cause": snapshot.cause,
            "changedAt": snapshot.changed_at,
        },
    }))
}
