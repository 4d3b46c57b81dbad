//! Meteorological covariates for a coordinate and time.
//!
//! [`OpenMeteoWeather`] asks the Open-Meteo archive API for hourly values.
//! [`climatology`] is the deterministic seasonal estimate used when the
//! service cannot answer.

use std::{f64::consts::PI, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{CalendarFields, WeatherSample};

// ---

const STANDARD_PRESSURE_HPA: f64 = 1013.25;
const PRESSURE_SCALE_HEIGHT_M: f64 = 8434.5;

#[derive(thiserror::Error, Debug)]
pub enum WeatherError {
    // ---
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("epoch {0} is out of range")]
    InvalidEpoch(i64),

    #[error("weather response has no value for {0}")]
    MissingValue(&'static str),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn lookup(
        &self,
        latitude: f64,
        longitude: f64,
        epoch_utc: i64,
    ) -> Result<WeatherSample, WeatherError>;
}

/// Hourly response body from the Open-Meteo archive endpoint.
#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: HourlySeries,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    surface_pressure: Vec<Option<f64>>,
}

/// Open-Meteo archive client.
#[derive(Debug, Clone)]
pub struct OpenMeteoWeather {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoWeather {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        // ---
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(OpenMeteoWeather {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl WeatherLookup for OpenMeteoWeather {
    async fn lookup(
        &self,
        latitude: f64,
        longitude: f64,
        epoch_utc: i64,
    ) -> Result<WeatherSample, WeatherError> {
        // ---
        let calendar =
            CalendarFields::from_epoch(epoch_utc).ok_or(WeatherError::InvalidEpoch(epoch_utc))?;
        let date = format!("{:04}-{:02}-{:02}", calendar.year, calendar.month, calendar.day);
        let hour = calendar.hour as usize;

        let url = format!("{}/v1/archive", self.base_url);
        tracing::debug!(
            "Fetching weather for ({}, {}) at {} {:02}h from {}",
            latitude, longitude, date, hour, url
        );

        let response: ArchiveResponse = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("start_date", date.clone()),
                ("end_date", date),
                (
                    "hourly",
                    "temperature_2m,relative_humidity_2m,surface_pressure".to_string(),
                ),
                ("timezone", "GMT".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let pick = |series: &[Option<f64>], name: &'static str| {
            series
                .get(hour)
                .copied()
                .flatten()
                .ok_or(WeatherError::MissingValue(name))
        };

        Ok(WeatherSample {
            temperature_c: pick(&response.hourly.temperature_2m, "temperature_2m")?,
            pressure_hpa: pick(&response.hourly.surface_pressure, "surface_pressure")?,
            humidity_pct: pick(&response.hourly.relative_humidity_2m, "relative_humidity_2m")?,
        })
    }
}

/// Deterministic seasonal climatology estimate.
///
/// Temperature is a latitude baseline plus a sinusoidal seasonal term that
/// peaks in mid-July in the northern hemisphere and mid-January in the
/// southern. Pressure follows the barometric scale height with a small
/// seasonal band. Humidity stays moderate, drier toward the poles.
pub fn climatology(latitude: f64, elevation_meters: f64, calendar: &CalendarFields) -> WeatherSample {
    // ---
    let abs_lat = latitude.abs().min(90.0);
    let hemisphere = if latitude >= 0.0 { 1.0 } else { -1.0 };

    // Phase zero at mid-January.
    let season = (2.0 * PI * (f64::from(calendar.day_of_year) - 15.0) / 365.25).cos();

    let baseline_c = 27.0 - 0.45 * abs_lat;
    let amplitude_c = 0.2 * abs_lat;
    let temperature_c = baseline_c - hemisphere * amplitude_c * season;

    let pressure_hpa = STANDARD_PRESSURE_HPA * (-elevation_meters.max(0.0) / PRESSURE_SCALE_HEIGHT_M).exp()
        + 2.0 * hemisphere * season;

    let humidity_pct = 55.0 + 15.0 * abs_lat.to_radians().cos();

    WeatherSample {
        temperature_c,
        pressure_hpa,
        humidity_pct,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn calendar(epoch: i64) -> CalendarFields {
        CalendarFields::from_epoch(epoch).unwrap()
    }

    // 2024-01-15T00:00:00Z and 2024-07-15T00:00:00Z
    const MID_JANUARY: i64 = 1_705_276_800;
    const MID_JULY: i64 = 1_721_001_600;

    #[test]
    fn test_climatology_is_deterministic() {
        // ---
        let a = climatology(45.0, 200.0, &calendar(MID_JANUARY));
        let b = climatology(45.0, 200.0, &calendar(MID_JANUARY));
        assert_eq!(a, b);
    }

    #[test]
    fn test_climatology_seasons_flip_by_hemisphere() {
        // ---
        let north_jan = climatology(45.0, 0.0, &calendar(MID_JANUARY));
        let north_jul = climatology(45.0, 0.0, &calendar(MID_JULY));
        let south_jan = climatology(-45.0, 0.0, &calendar(MID_JANUARY));
        let south_jul = climatology(-45.0, 0.0, &calendar(MID_JULY));

        assert!(north_jul.temperature_c > north_jan.temperature_c);
        assert!(south_jan.temperature_c > south_jul.temperature_c);
    }

    #[test]
    fn test_climatology_stays_in_physical_bands() {
        // ---
        for lat in [-90.0, -45.0, 0.0, 30.0, 60.0, 90.0] {
            for epoch in [MID_JANUARY, MID_JULY] {
                let w = climatology(lat, 0.0, &calendar(epoch));
                assert!((-50.0..=40.0).contains(&w.temperature_c), "{w:?}");
                assert!((1005.0..=1020.0).contains(&w.pressure_hpa), "{w:?}");
                assert!((50.0..=75.0).contains(&w.humidity_pct), "{w:?}");
            }
        }
    }

    #[test]
    fn test_climatology_pressure_drops_with_elevation() {
        // ---
        let sea = climatology(10.0, 0.0, &calendar(MID_JANUARY));
        let mountain = climatology(10.0, 3000.0, &calendar(MID_JANUARY));
        assert!(mountain.pressure_hpa < sea.pressure_hpa - 250.0);
    }

    #[test]
    fn test_archive_response_with_nulls() {
        // ---
        let body = r#"{
            "hourly": {
                "time": ["2024-01-15T00:00", "2024-01-15T01:00"],
                "temperature_2m": [null, -3.5],
                "relative_humidity_2m": [80.0, 82.0],
                "surface_pressure": [1001.2, 1001.0]
            }
        }"#;
        let parsed: ArchiveResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.hourly.temperature_2m, vec![None, Some(-3.5)]);
    }
}
