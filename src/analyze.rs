//! Error analysis of a user PW estimate against the interpolated reference.

use crate::interpolate::{InterpolateError, Interpolator};
use crate::{ErrorReport, Interpretation, Method};

// ---

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnalyzeError {
    // ---
    #[error("interpolated reference unavailable: {0}")]
    InterpolationUnavailable(#[from] InterpolateError),

    #[error("interpolated reference is zero at ({latitude}, {longitude}); relative error is undefined")]
    DegenerateReference { latitude: f64, longitude: f64 },

    #[error("estimated PW {0} is not a finite number")]
    InvalidEstimate(f64),
}

#[derive(Clone)]
pub struct ErrorAnalyzer {
    interpolator: Interpolator,
}

impl ErrorAnalyzer {
    // ---
    pub fn new(interpolator: Interpolator) -> Self {
        ErrorAnalyzer { interpolator }
    }

    pub async fn analyze(
        &self,
        latitude: f64,
        longitude: f64,
        estimated_pw_mm: f64,
    ) -> Result<ErrorReport, AnalyzeError> {
        // ---
        if !estimated_pw_mm.is_finite() {
            return Err(AnalyzeError::InvalidEstimate(estimated_pw_mm));
        }

        let reference = self.interpolator.interpolate(latitude, longitude).await?;

        compare(latitude, longitude, estimated_pw_mm, reference.predicted_pw_mm, reference.method)
    }
}

/// Build a report from an estimate and its reference.
///
/// The relative error divides by the magnitude of the reference; a zero
/// reference is reported as [`AnalyzeError::DegenerateReference`].
pub fn compare(
    latitude: f64,
    longitude: f64,
    estimated_pw_mm: f64,
    interpolated_pw_mm: f64,
    reference_method: Method,
) -> Result<ErrorReport, AnalyzeError> {
    // ---
    if interpolated_pw_mm == 0.0 {
        return Err(AnalyzeError::DegenerateReference { latitude, longitude });
    }

    let absolute_error_mm = (estimated_pw_mm - interpolated_pw_mm).abs();
    let relative_error_pct = absolute_error_mm / interpolated_pw_mm.abs() * 100.0;

    Ok(ErrorReport {
        latitude,
        longitude,
        estimated_pw_mm,
        interpolated_pw_mm,
        absolute_error_mm,
        relative_error_pct,
        interpretation: Interpretation::from_relative_error(relative_error_pct),
        reference_method,
    })
}
