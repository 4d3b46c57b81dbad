use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppState, Caller};
use crate::interpolate::validate_coordinates;
use crate::{ApiError, FeatureRecord, PredictionResult, WeatherSource};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/pw/by/features", post(handler))
}

/// Pre-extracted features submitted directly by a client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesRequest {
    station_id: String,
    zwd_millimeters: f64,
    epoch_utc: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation_meters: Option<f64>,
    temperature_c: Option<f64>,
    pressure_hpa: Option<f64>,
    humidity_pct: Option<f64>,
    #[serde(default)]
    include_meteo_data: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeaturesResponse {
    success: bool,
    features: FeatureRecord,
    prediction: PredictionResult,
}

async fn handler(
    State(state): State<AppState>,
    _caller: Caller,
    payload: Result<Json<FeaturesRequest>, JsonRejection>,
) -> Result<Json<FeaturesResponse>, ApiError> {
    // ---
    let Json(req) = payload?;
    info!("POST /api/pw/by/features - station {}", req.station_id);

    let station_id = req.station_id.trim();
    if station_id.is_empty() {
        return Err(ApiError::BadRequest("stationId must not be empty".to_string()));
    }
    if !(req.zwd_millimeters.is_finite() && req.zwd_millimeters >= 0.0) {
        return Err(ApiError::BadRequest(
            "zwdMillimeters must be a finite, non-negative number".to_string(),
        ));
    }

    let record = FeatureRecord::new(station_id, req.epoch_utc, req.zwd_millimeters)
        .ok_or_else(|| ApiError::BadRequest(format!("epochUtc {} is out of range", req.epoch_utc)))?;

    // Geometry supplied in full is trusted; anything less goes to the catalog.
    let record = match (req.latitude, req.longitude, req.elevation_meters) {
        (Some(lat), Some(lon), Some(elev)) => {
            validate_coordinates(lat, lon)?;
            record.with_geometry(lat, lon, elev)
        }
        _ => {
            let station = state.enricher.resolve_station(station_id).await?;
            record.with_geometry(station.latitude, station.longitude, station.elevation_meters)
        }
    };

    let supplied_weather =
        req.temperature_c.is_some() || req.pressure_hpa.is_some() || req.humidity_pct.is_some();

    let record = if supplied_weather {
        FeatureRecord {
            temperature_c: req.temperature_c,
            pressure_hpa: req.pressure_hpa,
            humidity_pct: req.humidity_pct,
            weather_source: WeatherSource::Supplied,
            ..record
        }
    } else {
        state.enricher.attach_weather(record, req.include_meteo_data).await
    };

    let prediction = state.estimator.predict(&record).await;
    info!(
        "Features pipeline complete for {} (method {:?})",
        record.station_id, prediction.method
    );

    Ok(Json(FeaturesResponse {
        success: true,
        features: record,
        prediction,
    }))
}
