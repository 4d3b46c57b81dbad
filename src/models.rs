//! Data models for the precipitable-water pipeline.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Relative-error thresholds (percent) separating the interpretation buckets.
pub const EXCELLENT_BELOW_PCT: f64 = 2.0;
pub const GOOD_BELOW_PCT: f64 = 5.0;
pub const FAIR_BELOW_PCT: f64 = 10.0;

/// UTC calendar decomposition of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarFields {
    // ---
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub day_of_year: u32,
}

impl CalendarFields {
    // ---
    /// Decompose seconds since the Unix epoch in UTC. `None` when the value
    /// is outside the representable calendar range.
    pub fn from_epoch(epoch_utc: i64) -> Option<Self> {
        // ---
        DateTime::<Utc>::from_timestamp(epoch_utc, 0).map(|dt| Self::from_datetime(&dt))
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        // ---
        CalendarFields {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            day_of_year: dt.ordinal(),
        }
    }
}

/// Where a record's meteorological covariates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherSource {
    // ---
    /// Weather was not requested; covariates are unknown.
    NotRequested,
    /// Covariates came from the weather service.
    Observed,
    /// Covariates were sent by the client with the request.
    Supplied,
    /// The weather service failed; covariates are a seasonal climatology estimate.
    Climatology,
}

/// Meteorological covariates for one place and time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    // ---
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_pct: f64,
}

/// Station geometry resolved from the station catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StationInfo {
    // ---
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_meters: f64,
    pub name: Option<String>,
}

/// The canonical unit passed to the estimator.
///
/// Records are built fresh per request and never mutated: enrichment steps
/// consume a record and return a new one. Optional fields that are `None`
/// are unknown, not zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    // ---
    pub station_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation_meters: Option<f64>,
    pub epoch_utc: i64,
    #[serde(flatten)]
    pub calendar: CalendarFields,
    pub date_string: String,
    pub zwd_millimeters: f64,
    pub satellite_azimuth_deg: Option<f64>,
    pub satellite_elevation_deg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub weather_source: WeatherSource,
}

impl FeatureRecord {
    // ---
    /// Build a bare record from an observation. `None` when the epoch cannot
    /// be represented as a UTC calendar date.
    pub fn new(station_id: impl Into<String>, epoch_utc: i64, zwd_millimeters: f64) -> Option<Self> {
        // ---
        let dt = DateTime::<Utc>::from_timestamp(epoch_utc, 0)?;

        Some(FeatureRecord {
            station_id: station_id.into(),
            latitude: None,
            longitude: None,
            elevation_meters: None,
            epoch_utc,
            calendar: CalendarFields::from_datetime(&dt),
            date_string: dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            zwd_millimeters,
            satellite_azimuth_deg: None,
            satellite_elevation_deg: None,
            temperature_c: None,
            pressure_hpa: None,
            humidity_pct: None,
            weather_source: WeatherSource::NotRequested,
        })
    }

    pub fn with_geometry(self, latitude: f64, longitude: f64, elevation_meters: f64) -> Self {
        // ---
        FeatureRecord {
            latitude: Some(latitude),
            longitude: Some(longitude),
            elevation_meters: Some(elevation_meters),
            ..self
        }
    }

    pub fn with_weather(self, sample: WeatherSample, source: WeatherSource) -> Self {
        // ---
        FeatureRecord {
            temperature_c: Some(sample.temperature_c),
            pressure_hpa: Some(sample.pressure_hpa),
            humidity_pct: Some(sample.humidity_pct),
            weather_source: source,
            ..self
        }
    }

    pub fn weather_degraded(&self) -> bool {
        self.weather_source == WeatherSource::Climatology
    }
}

/// How a prediction was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    // ---
    /// The scoring function answered with valid output.
    Model,
    /// Closed-form ZWD conversion used in place of the model.
    Fallback,
    /// Bounded coordinate approximation used in place of the spatial model.
    FallbackInterpolation,
}

impl Method {
    pub fn is_fallback(self) -> bool {
        !matches!(self, Method::Model)
    }
}

/// A PW estimate and its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    // ---
    pub predicted_pw_mm: f64,
    pub uncertainty_mm: f64,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Qualitative bucket for a relative error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpretation {
    // ---
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Interpretation {
    pub fn from_relative_error(pct: f64) -> Self {
        // ---
        if pct < EXCELLENT_BELOW_PCT {
            Interpretation::Excellent
        } else if pct < GOOD_BELOW_PCT {
            Interpretation::Good
        } else if pct < FAIR_BELOW_PCT {
            Interpretation::Fair
        } else {
            Interpretation::Poor
        }
    }
}

/// Comparison of a user estimate against the interpolated reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    // ---
    pub latitude: f64,
    pub longitude: f64,
    pub estimated_pw_mm: f64,
    pub interpolated_pw_mm: f64,
    pub absolute_error_mm: f64,
    pub relative_error_pct: f64,
    pub interpretation: Interpretation,
    pub reference_method: Method,
}

/// A coordinate pair as received from clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    // ---
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_calendar_decomposition_is_utc() {
        // ---
        // 1700000000 is 2023-11-14T22:13:20Z
        let cal = CalendarFields::from_epoch(1_700_000_000).unwrap();

        assert_eq!(cal.year, 2023);
        assert_eq!(cal.month, 11);
        assert_eq!(cal.day, 14);
        assert_eq!(cal.hour, 22);
        assert_eq!(cal.minute, 13);
        assert_eq!(cal.second, 20);
        assert_eq!(cal.day_of_year, 318);
    }

    #[test]
    fn test_feature_record_date_string() {
        // ---
        let record = FeatureRecord::new("ALGO", 1_700_000_000, 12.5).unwrap();
        assert_eq!(record.date_string, "2023-11-14T22:13:20Z");
        assert_eq!(record.weather_source, WeatherSource::NotRequested);
        assert!(record.latitude.is_none());
    }

    #[test]
    fn test_feature_record_rejects_unrepresentable_epoch() {
        // ---
        assert!(FeatureRecord::new("ALGO", i64::MAX, 12.5).is_none());
    }

    #[test]
    fn test_unknown_fields_serialize_as_null() {
        // ---
        let record = FeatureRecord::new("ALGO", 1_700_000_000, 12.5).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert!(json["temperatureC"].is_null());
        assert!(json["latitude"].is_null());
        assert_eq!(json["stationId"], "ALGO");
        assert_eq!(json["month"], 11);
        assert_eq!(json["weatherSource"], "not_requested");
    }

    #[test]
    fn test_interpretation_buckets() {
        // ---
        assert_eq!(Interpretation::from_relative_error(0.0), Interpretation::Excellent);
        assert_eq!(Interpretation::from_relative_error(1.99), Interpretation::Excellent);
        assert_eq!(Interpretation::from_relative_error(2.0), Interpretation::Good);
        assert_eq!(Interpretation::from_relative_error(4.99), Interpretation::Good);
        assert_eq!(Interpretation::from_relative_error(5.0), Interpretation::Fair);
        assert_eq!(Interpretation::from_relative_error(9.99), Interpretation::Fair);
        assert_eq!(Interpretation::from_relative_error(10.0), Interpretation::Poor);
        assert_eq!(Interpretation::from_relative_error(250.0), Interpretation::Poor);
    }

    #[test]
    fn test_method_serialization() {
        // ---
        assert_eq!(serde_json::to_value(Method::Model).unwrap(), "model");
        assert_eq!(serde_json::to_value(Method::Fallback).unwrap(), "fallback");
        assert_eq!(
            serde_json::to_value(Method::FallbackInterpolation).unwrap(),
            "fallback_interpolation"
        );
        assert!(Method::Fallback.is_fallback());
        assert!(Method::FallbackInterpolation.is_fallback());
        assert!(!Method::Model.is_fallback());
    }
}
