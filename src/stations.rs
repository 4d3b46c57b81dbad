//! Station catalog access.
//!
//! The catalog is read-only after startup. [`PgStationDirectory`] reads the
//! `gnss_stations` table through an explicitly constructed pool handle;
//! [`InMemoryStations`] serves fixed catalogs (tests, seeded deployments).

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::StationInfo;

// ---

#[derive(thiserror::Error, Debug)]
pub enum StationLookupError {
    // ---
    #[error("station catalog query failed: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StationDirectory: Send + Sync {
    /// Look up a station by its exact id. `Ok(None)` means unknown.
    async fn lookup(&self, station_id: &str) -> Result<Option<StationInfo>, StationLookupError>;
}

/// Postgres-backed station catalog.
#[derive(Debug, Clone)]
pub struct PgStationDirectory {
    pool: PgPool,
}

impl PgStationDirectory {
    pub fn new(pool: PgPool) -> Self {
        PgStationDirectory { pool }
    }
}

#[async_trait]
impl StationDirectory for PgStationDirectory {
    async fn lookup(&self, station_id: &str) -> Result<Option<StationInfo>, StationLookupError> {
        // ---
        let station = sqlx::query_as::<_, StationInfo>(
            r#"
            SELECT station_id,
                   latitude,
                   longitude,
                   elevation_m AS elevation_meters,
                   name
              FROM gnss_stations
             WHERE station_id = $1
            "#,
        )
        .bind(station_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(station)
    }
}

/// Fixed in-memory station catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStations {
    stations: HashMap<String, StationInfo>,
}

impl InMemoryStations {
    pub fn new(stations: impl IntoIterator<Item = StationInfo>) -> Self {
        // ---
        InMemoryStations {
            stations: stations
                .into_iter()
                .map(|s| (s.station_id.clone(), s))
                .collect(),
        }
    }
}

#[async_trait]
impl StationDirectory for InMemoryStations {
    async fn lookup(&self, station_id: &str) -> Result<Option<StationInfo>, StationLookupError> {
        Ok(self.stations.get(station_id).cloned())
    }
}
