//! PW estimation from a complete feature record.

use std::sync::Arc;

use crate::scorer::{Score, ScoreError, ScoreQuery, Scorer};
use crate::{FeatureRecord, Method, PredictionResult};

// ---

/// First-order empirical ZWD-to-PW ratio.
///
/// The true ratio depends on the weighted mean temperature of the column
/// (roughly 0.15 to 0.17); this constant is an approximation for degraded
/// mode, not a physical conversion.
pub const ZWD_TO_PW_RATIO: f64 = 0.16;

/// Uncertainty reported with the closed-form fallback.
pub const FALLBACK_UNCERTAINTY_MM: f64 = 0.1;

/// Check a scorer answer. A non-finite or negative PW, or a non-finite or
/// negative uncertainty, is malformed.
pub(crate) fn validate(score: Score) -> Result<Score, ScoreError> {
    // ---
    if !(score.pw_mm.is_finite() && score.pw_mm >= 0.0) {
        return Err(ScoreError::Malformed(format!(
            "predicted PW {} is not a finite non-negative value",
            score.pw_mm
        )));
    }
    if !score.uncertainty_mm.is_finite() || score.uncertainty_mm < 0.0 {
        return Err(ScoreError::Malformed(format!(
            "uncertainty {} is not a finite non-negative value",
            score.uncertainty_mm
        )));
    }
    Ok(score)
}

#[derive(Clone)]
pub struct Estimator {
    scorer: Arc<dyn Scorer>,
}

impl Estimator {
    // ---
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Estimator { scorer }
    }

    /// Predict PW for a record. Never fails: scorer problems resolve to a
    /// [`Method::Fallback`] result whose note names the cause.
    pub async fn predict(&self, record: &FeatureRecord) -> PredictionResult {
        // ---
        let query = ScoreQuery::Observation {
            features: record.clone(),
        };

        match self.scorer.score(&query).await.and_then(validate) {
            Ok(score) => {
                tracing::debug!(
                    "Model estimate for {}: {:.3} ± {:.3} mm",
                    record.station_id,
                    score.pw_mm,
                    score.uncertainty_mm
                );
                PredictionResult {
                    predicted_pw_mm: score.pw_mm,
                    uncertainty_mm: score.uncertainty_mm,
                    method: Method::Model,
                    note: None,
                }
            }
            Err(e) => {
                tracing::warn!("Model unavailable for {}: {}; using fallback", record.station_id, e);
                fallback(record.zwd_millimeters, &e)
            }
        }
    }
}

/// Closed-form degraded estimate: `zwd × 0.16`.
fn fallback(zwd_millimeters: f64, cause: &ScoreError) -> PredictionResult {
    // ---
    PredictionResult {
        predicted_pw_mm: zwd_millimeters * ZWD_TO_PW_RATIO,
        uncertainty_mm: FALLBACK_UNCERTAINTY_MM,
        method: Method::Fallback,
        note: Some(format!(
            "Model unavailable ({cause}); PW approximated as ZWD × {ZWD_TO_PW_RATIO}"
        )),
    }
}
