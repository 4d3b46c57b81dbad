use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use super::{AppState, Caller};
use crate::{ApiError, ErrorReport};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/pw/by/error", post(handler))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    latitude: f64,
    longitude: f64,
    estimated_pw: f64,
}

async fn handler(
    State(state): State<AppState>,
    _caller: Caller,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ErrorReport>, ApiError> {
    // ---
    let Json(req) = payload?;
    info!(
        "POST /api/pw/by/error - ({}, {}) estimate {} mm",
        req.latitude, req.longitude, req.estimated_pw
    );

    let report = state
        .analyzer
        .analyze(req.latitude, req.longitude, req.estimated_pw)
        .await?;

    info!(
        "Error analysis: {:.2}% ({:?}) against {:?} reference",
        report.relative_error_pct, report.interpretation, report.reference_method
    );
    Ok(Json(report))
}
