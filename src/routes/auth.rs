// src/routes/auth.rs
//! Bearer-token precondition for the estimation endpoints.
//!
//! Identity verification belongs to the deployment (gateway, identity
//! provider). This extractor only checks that the caller presents the
//! configured `API_TOKEN`; with no token configured every caller passes.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use super::AppState;
use crate::ApiError;

// ---

/// Marker for a request that passed the token check.
#[derive(Debug, Clone, Copy)]
pub struct Caller;

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // ---
        let Some(expected) = state.config.api_token.as_deref() else {
            return Ok(Caller);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if token == expected => Ok(Caller),
            _ => Err(ApiError::Unauthorized),
        }
    }
}
