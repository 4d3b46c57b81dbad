//! Context enrichment: station geometry and meteorological covariates.

use std::sync::Arc;

use crate::stations::{StationDirectory, StationLookupError};
use crate::weather::{climatology, WeatherLookup};
use crate::{FeatureRecord, StationInfo, WeatherSource};

// ---

/// Length of the marker prefix shared by short and long RINEX file names.
const MARKER_PREFIX_LEN: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum EnrichError {
    // ---
    #[error("station '{0}' is not in the station catalog")]
    UnknownStation(String),

    #[error(transparent)]
    StationLookup(#[from] StationLookupError),
}

#[derive(Clone)]
pub struct Enricher {
    stations: Arc<dyn StationDirectory>,
    weather: Arc<dyn WeatherLookup>,
}

impl Enricher {
    // ---
    pub fn new(stations: Arc<dyn StationDirectory>, weather: Arc<dyn WeatherLookup>) -> Self {
        Enricher { stations, weather }
    }

    /// Attach station geometry and, if requested, weather covariates.
    ///
    /// Unknown stations fail the request. Weather failures never do: the
    /// record gets a climatology estimate and is tagged
    /// [`WeatherSource::Climatology`].
    pub async fn enrich(
        &self,
        record: FeatureRecord,
        include_weather: bool,
    ) -> Result<FeatureRecord, EnrichError> {
        // ---
        let station = self.resolve_station(&record.station_id).await?;
        let record = record.with_geometry(station.latitude, station.longitude, station.elevation_meters);

        Ok(self.attach_weather(record, include_weather).await)
    }

    /// Resolve a station id verbatim, then by its 4-character marker prefix.
    pub async fn resolve_station(&self, station_id: &str) -> Result<StationInfo, EnrichError> {
        // ---
        if let Some(station) = self.stations.lookup(station_id).await? {
            return Ok(station);
        }

        if let Some(prefix) = station_id.get(..MARKER_PREFIX_LEN) {
            if prefix.len() < station_id.len() {
                if let Some(station) = self.stations.lookup(prefix).await? {
                    tracing::debug!("Resolved station {} by marker prefix {}", station_id, prefix);
                    return Ok(station);
                }
            }
        }

        Err(EnrichError::UnknownStation(station_id.to_string()))
    }

    /// Attach weather covariates to a record that already carries geometry.
    /// Records without geometry are returned unchanged.
    pub async fn attach_weather(&self, record: FeatureRecord, include_weather: bool) -> FeatureRecord {
        // ---
        if !include_weather {
            return record;
        }

        let (Some(lat), Some(lon)) = (record.latitude, record.longitude) else {
            return record;
        };

        match self.weather.lookup(lat, lon, record.epoch_utc).await {
            Ok(sample) => record.with_weather(sample, WeatherSource::Observed),
            Err(e) => {
                tracing::warn!(
                    "Weather lookup failed for station {} at {}: {}; using climatology",
                    record.station_id,
                    record.date_string,
                    e
                );
                let sample = climatology(lat, record.elevation_meters.unwrap_or(0.0), &record.calendar);
                record.with_weather(sample, WeatherSource::Climatology)
            }
        }
    }
}
