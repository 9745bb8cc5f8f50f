//! CSV export endpoint

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use finguard_store::Document;

use super::{newest_first, AppState};
use crate::export::{build_csv, export_filename, ExportKind};
use crate::{FLAGGED_CUSTOMERS_COLLECTION, INTERVENTIONS_COLLECTION};

/// `?type=` on the export endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportParams {
    /// `all`, `flagged` or `interventions`
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// `GET /export`: flagged customers and interventions as a CSV attachment.
pub async fn export_csv(
    State(state): State<AppState>,
    params: Option<Query<ExportParams>>,
) -> impl IntoResponse {
    let kind = ExportKind::from_param(params.as_ref().and_then(|Query(p)| p.kind.as_deref()));

    let (flagged, interventions) = tokio::join!(
        load(&state, kind.includes_flagged(), FLAGGED_CUSTOMERS_COLLECTION, "flaggedAt"),
        load(&state, kind.includes_interventions(), INTERVENTIONS_COLLECTION, "approvedAt"),
    );

    let csv = build_csv(&flagged, &interventions);
    info!(
        kind = kind.as_str(),
        flagged = flagged.len(),
        interventions = interventions.len(),
        "export generated"
    );

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Utc::now().date_naive())
    );
    (
        [(CONTENT_TYPE, "text/csv".to_string()), (CONTENT_DISPOSITION, disposition)],
        csv,
    )
}

async fn load(state: &AppState, wanted: bool, collection: &str, field: &str) -> Vec<Document> {
    if !wanted {
        return Vec::new();
    }
    let query = newest_first(collection, field, None);
    state.store.collection_query(&query).await.into_value()
}
