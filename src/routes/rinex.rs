use std::sync::LazyLock;

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{AppState, Caller};
use crate::extract::{self, Extraction};
use crate::scratch::ScratchFile;
use crate::{ApiError, FeatureRecord, PredictionResult};

// ---

/// Hatanaka-compacted names (`.crx`, `.yyd`), rejected with a dedicated message.
static COMPACT_RINEX_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(crx|\d{2}d)(\.(z|gz))?$").expect("compact rinex name pattern is valid")
});

static RINEX_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(rnx|obs|\d{2}o)(\.(z|gz))?$").expect("rinex name pattern is valid")
});

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/pw/by/rinex", post(handler))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedData {
    #[serde(flatten)]
    record: FeatureRecord,
    total_observations: usize,
    satellites: Vec<String>,
    epoch_from_header: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    original_name: String,
    station_id: String,
    processed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RinexResponse {
    success: bool,
    message: String,
    extracted_data: ExtractedData,
    prediction: PredictionResult,
    file_info: FileInfo,
}

/// Parsed multipart form.
struct RinexUpload {
    file_name: String,
    bytes: Vec<u8>,
    include_meteo_data: bool,
    process_all_satellites: bool,
}

async fn handler(
    State(state): State<AppState>,
    _caller: Caller,
    multipart: Multipart,
) -> Result<Json<RinexResponse>, ApiError> {
    // ---
    info!("POST /api/pw/by/rinex - Starting pipeline");
    let received_at = Utc::now();

    // Step 1: Read and validate the upload
    debug!("POST /api/pw/by/rinex - Step 1");
    let upload = read_upload(multipart).await?;

    if upload.process_all_satellites {
        debug!("processAllSatellites requested; single-satellite mode is used");
    }

    // Step 2: Extract observations. The scratch file is removed when it
    // goes out of scope, whatever the outcome.
    debug!("POST /api/pw/by/rinex - Step 2");
    let extraction = {
        let scratch = ScratchFile::write(
            &state.config.upload_dir,
            "rinex",
            &format!("-{}", upload.file_name),
            &upload.bytes,
        )
        .await
        .map_err(|e| {
            warn!("Failed to store upload '{}': {}", upload.file_name, e);
            ApiError::Internal("Failed to store upload".to_string())
        })?;

        extract::extract_file(scratch.path(), &upload.file_name, received_at).await?
    };

    let Extraction {
        record,
        total_observations,
        satellites,
        epoch_from_header,
    } = extraction;

    // Step 3: Enrich with station geometry and weather
    debug!("POST /api/pw/by/rinex - Step 3");
    let record = state.enricher.enrich(record, upload.include_meteo_data).await?;

    // Step 4: Predict
    debug!("POST /api/pw/by/rinex - Step 4");
    let prediction = state.estimator.predict(&record).await;

    info!(
        "RINEX pipeline complete for {} ({} observations, method {:?})",
        record.station_id, total_observations, prediction.method
    );

    let mut message = "RINEX file processed".to_string();
    if prediction.method.is_fallback() {
        message.push_str("; prediction is a fallback estimate");
    }
    if record.weather_degraded() {
        message.push_str("; weather covariates are climatology estimates");
    }

    Ok(Json(RinexResponse {
        success: true,
        message,
        file_info: FileInfo {
            original_name: upload.file_name,
            station_id: record.station_id.clone(),
            processed_at: Utc::now(),
        },
        extracted_data: ExtractedData {
            record,
            total_observations,
            satellites,
            epoch_from_header,
        },
        prediction,
    }))
}

async fn read_upload(mut multipart: Multipart) -> Result<RinexUpload, ApiError> {
    // ---
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut include_meteo_data = false;
    let mut process_all_satellites = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("rinexFile") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read uploaded file: {e}")))?;
                file = Some((name, bytes.to_vec()));
            }
            Some("includeMeteoData") => include_meteo_data = parse_flag(&field_text(field).await?),
            Some("processAllSatellites") => {
                process_all_satellites = parse_flag(&field_text(field).await?)
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let Some((file_name, bytes)) = file else {
        return Err(ApiError::BadRequest("No RINEX file uploaded (field 'rinexFile')".to_string()));
    };

    if file_name.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file has no name".to_string()));
    }
    if COMPACT_RINEX_NAME.is_match(&file_name) {
        return Err(ApiError::BadRequest(format!(
            "'{file_name}' is Hatanaka-compacted RINEX (.crx / .yyd), which is not supported; \
             upload the expanded observation file"
        )));
    }
    if !is_rinex_name(&file_name) {
        return Err(ApiError::BadRequest(format!(
            "'{file_name}' is not a RINEX observation file (.rnx, .obs, .yyo, optionally .Z or .gz)"
        )));
    }
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    info!("Received '{}' ({} bytes)", file_name, bytes.len());

    Ok(RinexUpload {
        file_name,
        bytes,
        include_meteo_data,
        process_all_satellites,
    })
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed form field: {e}")))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn is_rinex_name(name: &str) -> bool {
    RINEX_NAME.is_match(name)
}
