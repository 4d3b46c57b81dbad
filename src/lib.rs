//! Precipitable-water estimation from GNSS zenith wet delay.
//!
//! Three request paths share one pipeline:
//! - RINEX upload: [`extract`] → [`enrich`] → [`estimator`]
//! - coordinates only: [`interpolate`]
//! - validation: [`interpolate`] + [`analyze`]
//!
//! The fitted model sits behind the [`scorer::Scorer`] trait. Whenever it
//! cannot answer, results are labeled `fallback*`, never `model`.
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): `routes`
//! only sees the types re-exported here, not the modules' internals.

pub mod analyze;
pub mod config;
pub mod decompress;
pub mod enrich;
pub mod error;
pub mod estimator;
pub mod extract;
pub mod interpolate;
pub mod models;
pub mod routes;
pub mod schema;
pub mod scorer;
pub mod scratch;
pub mod stations;
pub mod weather;

pub use config::Config;
pub use error::ApiError;
pub use models::{
    CalendarFields, Coordinates, ErrorReport, FeatureRecord, Interpretation, Method,
    PredictionResult, StationInfo, WeatherSample, WeatherSource,
};
pub use routes::{router, AppState};
