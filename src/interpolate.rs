//! Spatial interpolation: PW at a coordinate from geometry and season alone.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::estimator::validate;
use crate::scorer::{ScoreError, ScoreQuery, Scorer};
use crate::{CalendarFields, Coordinates, Method, PredictionResult};

// ---

/// Bounds of the degraded coordinate approximation, in millimeters.
pub const FALLBACK_PW_MIN_MM: f64 = 1.0;
pub const FALLBACK_PW_MAX_MM: f64 = 60.0;
pub const FALLBACK_INTERPOLATION_UNCERTAINTY_MM: f64 = 0.2;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InterpolateError {
    // ---
    #[error("invalid coordinates ({latitude}, {longitude}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Reject non-finite or out-of-range coordinates.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), InterpolateError> {
    // ---
    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(InterpolateError::InvalidCoordinates { latitude, longitude })
    }
}

#[derive(Clone)]
pub struct Interpolator {
    scorer: Arc<dyn Scorer>,
}

impl Interpolator {
    // ---
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Interpolator { scorer }
    }

    /// Interpolate PW at a coordinate for the current UTC time.
    pub async fn interpolate(&self, latitude: f64, longitude: f64) -> Result<PredictionResult, InterpolateError> {
        self.interpolate_at(latitude, longitude, Utc::now()).await
    }

    /// Interpolate PW at a coordinate, taking season from `at`.
    ///
    /// Coordinates are validated before the scorer is touched. Scorer
    /// problems resolve to [`Method::FallbackInterpolation`].
    pub async fn interpolate_at(
        &self,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<PredictionResult, InterpolateError> {
        // ---
        validate_coordinates(latitude, longitude)?;

        let calendar = CalendarFields::from_datetime(&at);
        let query = ScoreQuery::Coordinates {
            latitude,
            longitude,
            epoch_utc: at.timestamp(),
            month: calendar.month,
            day_of_year: calendar.day_of_year,
            hour: calendar.hour,
        };

        let result = match self.scorer.score(&query).await.and_then(validate) {
            Ok(score) => PredictionResult {
                predicted_pw_mm: score.pw_mm,
                uncertainty_mm: score.uncertainty_mm,
                method: Method::Model,
                note: None,
            },
            Err(e) => {
                tracing::warn!(
                    "Spatial model unavailable at ({}, {}): {}; using fallback",
                    latitude,
                    longitude,
                    e
                );
                fallback(latitude, longitude, &e)
            }
        };

        Ok(result)
    }

    /// Interpolate a batch. Every point is validated before any scorer call.
    pub async fn interpolate_many(
        &self,
        points: &[Coordinates],
        at: DateTime<Utc>,
    ) -> Result<Vec<PredictionResult>, InterpolateError> {
        // ---
        for p in points {
            validate_coordinates(p.latitude, p.longitude)?;
        }

        let mut results = Vec::with_capacity(points.len());
        for p in points {
            results.push(self.interpolate_at(p.latitude, p.longitude, at).await?);
        }
        Ok(results)
    }
}

/// Bounded coordinate approximation, never zero and never unbounded.
fn fallback(latitude: f64, longitude: f64, cause: &ScoreError) -> PredictionResult {
    // ---
    let approx = latitude.abs() * 0.1 + longitude.abs() * 0.01;

    PredictionResult {
        predicted_pw_mm: approx.clamp(FALLBACK_PW_MIN_MM, FALLBACK_PW_MAX_MM),
        uncertainty_mm: FALLBACK_INTERPOLATION_UNCERTAINTY_MM,
        method: Method::FallbackInterpolation,
        note: Some(format!(
            "Spatial model unavailable ({cause}); coordinate approximation, not a model estimate"
        )),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::scorer::{MockScorer, Score, UnavailableScorer};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 6, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_coordinates_never_reach_scorer() {
        // ---
        let mut scorer = MockScorer::new();
        scorer.expect_score().never();
        let interpolator = Interpolator::new(Arc::new(scorer));

        for (lat, lon) in [(91.0, 0.0), (0.0, 181.0), (-90.5, 10.0), (0.0, -180.01), (f64::NAN, 0.0)] {
            let err = interpolator.interpolate(lat, lon).await.unwrap_err();
            assert!(matches!(err, InterpolateError::InvalidCoordinates { .. }), "({lat}, {lon})");
        }
    }

    #[tokio::test]
    async fn test_model_query_carries_season_without_zwd() {
        // ---
        let mut scorer = MockScorer::new();
        scorer
            .expect_score()
            .withf(|q| {
                matches!(q, ScoreQuery::Coordinates { latitude, longitude, month, day_of_year, hour, .. }
                    if *latitude == 34.05 && *longitude == -118.24 && *month == 7 && *day_of_year == 197 && *hour == 6)
            })
            .times(1)
            .returning(|_| Ok(Score { pw_mm: 18.4, uncertainty_mm: 1.2 }));

        let result = Interpolator::new(Arc::new(scorer))
            .interpolate_at(34.05, -118.24, at())
            .await
            .unwrap();

        assert_eq!(result.method, Method::Model);
        assert_eq!(result.predicted_pw_mm, 18.4);
    }

    #[tokio::test]
    async fn test_fallback_is_bounded_and_labeled() {
        // ---
        let interpolator = Interpolator::new(Arc::new(UnavailableScorer));

        for lat in (-90..=90).step_by(15) {
            for lon in (-180..=180).step_by(30) {
                let r = interpolator.interpolate_at(lat as f64, lon as f64, at()).await.unwrap();

                assert_eq!(r.method, Method::FallbackInterpolation);
                assert!(r.predicted_pw_mm.is_finite());
                assert!(r.uncertainty_mm >= 0.0);
                assert!((FALLBACK_PW_MIN_MM..=FALLBACK_PW_MAX_MM).contains(&r.predicted_pw_mm));
            }
        }
    }

    #[tokio::test]
    async fn test_fallback_at_origin_is_not_zero() {
        // ---
        let r = Interpolator::new(Arc::new(UnavailableScorer))
            .interpolate_at(0.0, 0.0, at())
            .await
            .unwrap();
        assert_eq!(r.predicted_pw_mm, FALLBACK_PW_MIN_MM);
    }

    #[tokio::test]
    async fn test_batch_validates_all_points_first() {
        // ---
        let mut scorer = MockScorer::new();
        scorer.expect_score().never();
        let interpolator = Interpolator::new(Arc::new(scorer));

        let points = [
            Coordinates { latitude: 10.0, longitude: 10.0 },
            Coordinates { latitude: 100.0, longitude: 10.0 },
        ];
        assert!(interpolator.interpolate_many(&points, at()).await.is_err());
    }
}
