//! Geocode lookup and the combined city → sites operation.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::aggregator::{aggregate, SearchBounds};
use super::provider::GeoProvider;
use super::types::{Coordinate, PlaceError, RankedPlace};

/// A city, where it is, and what to see there.
#[derive(Debug, Clone, Serialize)]
pub struct CitySites {
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub places: Vec<RankedPlace>,
}

/// Entry point for the facade and the CLI. Cheap to clone.
#[derive(Clone)]
pub struct SitesService {
    provider: Arc<dyn GeoProvider>,
}

impl SitesService {
    pub fn new(provider: Arc<dyn GeoProvider>) -> Self {
        Self { provider }
    }

    /// Resolve a city name to a single coordinate.
    pub async fn geocode(&self, city: &str) -> Result<Coordinate, PlaceError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(PlaceError::InvalidParameter("Missing 'city' parameter".into()));
        }
        let coord = self.provider.resolve_location(city).await?;
        info!(city, center = %coord, "geocoded");
        Ok(coord)
    }

    pub async fn nearby(
        &self,
        center: Coordinate,
        bounds: SearchBounds,
    ) -> Result<Vec<RankedPlace>, PlaceError> {
        aggregate(self.provider.as_ref(), center, bounds).await
    }

    /// Geocode then search. A failed geocode yields no partial result.
    pub async fn sites(&self, city: &str, bounds: SearchBounds) -> Result<CitySites, PlaceError> {
        let center = self.geocode(city).await?;
        let places = self.nearby(center, bounds).await?;
        Ok(CitySites {
            city: city.trim().to_string(),
            lat: center.lat(),
            lng: center.lon(),
            places,
        })
    }
}
