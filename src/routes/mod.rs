use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};

use crate::analyze::ErrorAnalyzer;
use crate::enrich::Enricher;
use crate::estimator::Estimator;
use crate::interpolate::Interpolator;
use crate::scorer::Scorer;
use crate::stations::StationDirectory;
use crate::weather::WeatherLookup;
use crate::Config;

mod auth;
mod error_analysis;
mod features;
mod health;
mod interpolation;
mod rinex;

pub use auth::Caller;

// ---

/// Shared, read-only resources handed to every handler.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub config: Config,
    pub enricher: Enricher,
    pub estimator: Estimator,
    pub interpolator: Interpolator,
    pub analyzer: ErrorAnalyzer,
}

impl AppState {
    pub fn new(
        config: Config,
        stations: Arc<dyn StationDirectory>,
        weather: Arc<dyn WeatherLookup>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        // ---
        let interpolator = Interpolator::new(scorer.clone());
        AppState {
            config,
            enricher: Enricher::new(stations, weather),
            estimator: Estimator::new(scorer),
            analyzer: ErrorAnalyzer::new(interpolator.clone()),
            interpolator,
        }
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    let body_limit = state.config.max_upload_mb as usize * 1024 * 1024;

    Router::new()
        .merge(rinex::router())
        .merge(features::router())
        .merge(interpolation::router())
        .merge(error_analysis::router())
        .merge(health::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
