//! Observation extraction from uploaded RINEX files.
//!
//! The decoder here is a simplified placeholder, not a RINEX observation
//! decoder: after the `END OF HEADER` marker, every line wider than
//! [`MIN_OBSERVATION_LINE_WIDTH`] is a candidate whose leading
//! [`ZWD_FIELD_WIDTH`]-character field holds a zenith wet delay sample in
//! millimeters. Epoch records, PRN lists and per-signal fields are not
//! interpreted.

use std::{collections::BTreeSet, path::Path, sync::LazyLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;

use crate::decompress::{self, Container};
use crate::FeatureRecord;

// ---

pub const HEADER_TERMINATOR: &str = "END OF HEADER";
pub const FIRST_OBS_LABEL: &str = "TIME OF FIRST OBS";
pub const MIN_OBSERVATION_LINE_WIDTH: usize = 60;
pub const ZWD_FIELD_WIDTH: usize = 14;
pub const UNKNOWN_STATION: &str = "UNKNOWN";

static STATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{4,}").expect("station id pattern is valid"));

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ExtractError {
    // ---
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("no observations found in file")]
    ExtractionFailed,
}

/// Extractor output: the record plus diagnostics about what was sampled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    // ---
    pub record: FeatureRecord,
    pub total_observations: usize,
    pub satellites: Vec<String>,
    /// `true` when the epoch came from the header, `false` when it is the
    /// upload receipt time.
    pub epoch_from_header: bool,
}

/// Derive a station id from the leading run of uppercase letters and digits
/// in the file name.
pub fn station_id_from_filename(original_filename: &str) -> String {
    // ---
    let base = Path::new(original_filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(original_filename);

    STATION_ID
        .find(base)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_STATION.to_string())
}

/// Decompress the upload at `path` and extract it.
///
/// Decompression failures are reported as [`ExtractError::UnsupportedFormat`]
/// with a fixed message; the cause (which names the scratch path) is only
/// logged.
pub async fn extract_file(
    path: &Path,
    original_filename: &str,
    received_at: DateTime<Utc>,
) -> Result<Extraction, ExtractError> {
    // ---
    let container = Container::from_name(original_filename);
    let content = decompress::decompress(path, container).await.map_err(|e| {
        tracing::warn!("Could not decompress '{}': {}", original_filename, e);
        ExtractError::UnsupportedFormat("file could not be decompressed".to_string())
    })?;

    extract(&content, original_filename, received_at)
}

/// Extract a feature record from decompressed file content.
pub fn extract(
    content: &[u8],
    original_filename: &str,
    received_at: DateTime<Utc>,
) -> Result<Extraction, ExtractError> {
    // ---
    let text = String::from_utf8_lossy(content);
    let station_id = station_id_from_filename(original_filename);

    let mut in_header = true;
    let mut first_obs: Option<DateTime<Utc>> = None;
    let mut samples: Vec<f64> = Vec::new();
    let mut satellites = BTreeSet::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');

        if in_header {
            if line.contains(HEADER_TERMINATOR) {
                in_header = false;
            } else if line.contains(FIRST_OBS_LABEL) {
                first_obs = parse_first_obs(line);
            }
            continue;
        }

        if line.len() <= MIN_OBSERVATION_LINE_WIDTH {
            continue;
        }

        let Some(zwd) = line
            .get(..ZWD_FIELD_WIDTH)
            .and_then(|field| field.trim().parse::<f64>().ok())
        else {
            continue;
        };

        if !(zwd.is_finite() && zwd > 0.0) {
            continue;
        }

        samples.push(zwd);
        if let Some(token) = line.get(..3).map(str::trim).filter(|t| !t.is_empty()) {
            satellites.insert(token.to_string());
        }
    }

    if in_header {
        return Err(ExtractError::UnsupportedFormat(format!(
            "no '{HEADER_TERMINATOR}' marker found"
        )));
    }

    if samples.is_empty() {
        return Err(ExtractError::ExtractionFailed);
    }

    let zwd_mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let epoch = first_obs.unwrap_or(received_at);

    let record = FeatureRecord::new(station_id, epoch.timestamp(), zwd_mean).ok_or_else(|| {
        ExtractError::UnsupportedFormat("observation epoch out of range".to_string())
    })?;

    tracing::debug!(
        "Extracted {} ZWD samples for station {} (mean {:.3} mm)",
        samples.len(),
        record.station_id,
        zwd_mean
    );

    Ok(Extraction {
        record,
        total_observations: samples.len(),
        satellites: satellites.into_iter().collect(),
        epoch_from_header: first_obs.is_some(),
    })
}

/// Parse a `TIME OF FIRST OBS` header line: year, month, day, hour, minute,
/// fractional second.
fn parse_first_obs(line: &str) -> Option<DateTime<Utc>> {
    // ---
    let mut fields = line.split_whitespace();
    let year: i32 = fields.next()?.parse().ok()?;
    let month: u32 = fields.next()?.parse().ok()?;
    let day: u32 = fields.next()?.parse().ok()?;
    let hour: u32 = fields.next()?.parse().ok()?;
    let minute: u32 = fields.next()?.parse().ok()?;
    let second: f64 = fields.next()?.parse().ok()?;

    if !(0.0..60.0).contains(&second) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, second.trunc() as u32)
        .map(|naive| naive.and_utc())
}
