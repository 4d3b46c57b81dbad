use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppState, Caller};
use crate::{ApiError, Coordinates, PredictionResult};

// ---

/// Upper bound on points per batch request.
const MAX_BATCH_POINTS: usize = 100;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/pw/by/interpolation", post(handler))
        .route("/api/pw/by/interpolation/batch", post(batch_handler))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InterpolationResponse {
    success: bool,
    coordinates: Coordinates,
    prediction: PredictionResult,
    processed_at: DateTime<Utc>,
}

async fn handler(
    State(state): State<AppState>,
    _caller: Caller,
    payload: Result<Json<Coordinates>, JsonRejection>,
) -> Result<Json<InterpolationResponse>, ApiError> {
    // ---
    let Json(coordinates) = payload?;
    info!(
        "POST /api/pw/by/interpolation - ({}, {})",
        coordinates.latitude, coordinates.longitude
    );

    let prediction = state
        .interpolator
        .interpolate(coordinates.latitude, coordinates.longitude)
        .await?;

    Ok(Json(InterpolationResponse {
        success: true,
        coordinates,
        prediction,
        processed_at: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    points: Vec<Coordinates>,
}

#[derive(Debug, Serialize)]
struct BatchItem {
    coordinates: Coordinates,
    prediction: PredictionResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    success: bool,
    results: Vec<BatchItem>,
    processed_at: DateTime<Utc>,
}

async fn batch_handler(
    State(state): State<AppState>,
    _caller: Caller,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    // ---
    let Json(req) = payload?;
    info!("POST /api/pw/by/interpolation/batch - {} points", req.points.len());

    if req.points.is_empty() || req.points.len() > MAX_BATCH_POINTS {
        return Err(ApiError::BadRequest(format!(
            "points must contain between 1 and {MAX_BATCH_POINTS} coordinates"
        )));
    }

    let now = Utc::now();
    let predictions = state.interpolator.interpolate_many(&req.points, now).await?;

    let results = req
        .points
        .into_iter()
        .zip(predictions)
        .map(|(coordinates, prediction)| BatchItem {
            coordinates,
            prediction,
        })
        .collect();

    Ok(Json(BatchResponse {
        success: true,
        results,
        processed_at: now,
    }))
}
