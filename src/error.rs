//! HTTP mapping of pipeline errors.
//!
//! Client input problems are 4xx, catalog and I/O problems are 5xx. Scorer
//! failures never appear here; they are absorbed as labeled fallbacks.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::analyze::AnalyzeError;
use crate::enrich::EnrichError;
use crate::extract::ExtractError;
use crate::interpolate::InterpolateError;

// ---

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    // ---
    #[error("{0}")]
    BadRequest(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Interpolate(#[from] InterpolateError),

    #[error(transparent)]
    Analyze(#[from] AnalyzeError),

    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
}

impl ApiError {
    /// Status code and stable machine-readable error code.
    fn classify(&self) -> (StatusCode, &'static str) {
        // ---
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "input_validation"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Extract(ExtractError::UnsupportedFormat(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unsupported_format")
            }
            ApiError::Extract(ExtractError::ExtractionFailed) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed")
            }
            ApiError::Enrich(EnrichError::UnknownStation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unknown_station")
            }
            ApiError::Enrich(EnrichError::StationLookup(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "station_catalog_unavailable")
            }
            ApiError::Interpolate(InterpolateError::InvalidCoordinates { .. })
            | ApiError::Analyze(AnalyzeError::InterpolationUnavailable(
                InterpolateError::InvalidCoordinates { .. },
            )) => (StatusCode::BAD_REQUEST, "invalid_coordinates"),
            ApiError::Analyze(AnalyzeError::InvalidEstimate(_)) => {
                (StatusCode::BAD_REQUEST, "input_validation")
            }
            ApiError::Analyze(AnalyzeError::DegenerateReference { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "degenerate_reference")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, error) = self.classify();

        if status.is_server_error() {
            tracing::error!("{}: {}", error, self);
        } else {
            tracing::info!("Rejected request ({}): {}", error, self);
        }

        let body = ErrorBody {
            success: false,
            error,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_classification() {
        // ---
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Extract(ExtractError::ExtractionFailed), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ApiError::Enrich(EnrichError::UnknownStation("UNKNOWN".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Analyze(AnalyzeError::InterpolationUnavailable(
                    InterpolateError::InvalidCoordinates { latitude: 91.0, longitude: 0.0 },
                )),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Analyze(AnalyzeError::DegenerateReference { latitude: 0.0, longitude: 0.0 }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ApiError::Internal("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.classify().0, status, "{err}");
        }
    }

    #[test]
    fn test_degenerate_reference_has_distinct_code() {
        // ---
        let err = ApiError::Analyze(AnalyzeError::DegenerateReference { latitude: 1.0, longitude: 2.0 });
        assert_eq!(err.classify().1, "degenerate_reference");
    }
}
