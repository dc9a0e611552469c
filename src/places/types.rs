//! Core types for the places subsystem.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, PlaceError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(PlaceError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// A raw place record as decoded from the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub id: String,
    pub name: String,
    /// Absent when the provider record had no usable geometry.
    pub coordinate: Option<Coordinate>,
    pub vicinity: Option<String>,
    pub formatted_address: Option<String>,
    pub types: Vec<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
}

/// Outcome reported by the provider for one nearby-search page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    Ok,
    ZeroResults,
    /// Any other provider status, kept verbatim (e.g. `OVER_QUERY_LIMIT`).
    Error(String),
}

impl SearchStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "OK" => Self::Ok,
            "ZERO_RESULTS" => Self::ZeroResults,
            other => Self::Error(other.to_string()),
        }
    }
}

/// One page of nearby-search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub candidates: Vec<PlaceCandidate>,
    pub next_token: Option<String>,
    pub status: SearchStatus,
}

/// Parameters for a single nearby-search call.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub center: Coordinate,
    pub radius_meters: u32,
    pub category: String,
    pub keywords: Option<String>,
    pub page_token: Option<String>,
}

/// A normalized place, ready for ranking and serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPlace {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub address: String,
    pub types: Vec<String>,
    pub rating: f64,
    pub rating_count: u64,
}

impl TryFrom<PlaceCandidate> for RankedPlace {
    type Error = PlaceError;

    fn try_from(candidate: PlaceCandidate) -> Result<Self, Self::Error> {
        let coordinate = candidate.coordinate.ok_or_else(|| {
            PlaceError::MalformedRecord(format!("place '{}' has no location", candidate.id))
        })?;

        let address = candidate
            .vicinity
            .filter(|v| !v.trim().is_empty())
            .or(candidate.formatted_address)
            .unwrap_or_default();

        Ok(Self {
            id: candidate.id,
            name: candidate.name,
            coordinate,
            address,
            types: candidate.types,
            rating: candidate.rating.unwrap_or(0.0),
            rating_count: candidate.rating_count.unwrap_or(0),
        })
    }
}

#[derive(Serialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Serialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Serialize)]
struct RankedPlaceJson<'a> {
    place_id: &'a str,
    name: &'a str,
    lat: f64,
    lng: f64,
    geometry: Geometry,
    address: &'a str,
    types: &'a [String],
    rating: f64,
    user_ratings_total: u64,
}

// Map clients read both the flat `lat`/`lng` and the provider-style
// `geometry.location` form.
impl Serialize for RankedPlace {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (lat, lng) = (self.coordinate.lat(), self.coordinate.lon());
        RankedPlaceJson {
            place_id: &self.id,
            name: &self.name,
            lat,
            lng,
            geometry: Geometry { location: LatLng { lat, lng } },
            address: &self.address,
            types: &self.types,
            rating: self.rating,
            user_ratings_total: self.rating_count,
        }
        .serialize(serializer)
    }
}

/// Places subsystem errors.
#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("Location not found: '{0}'")]
    NotFound(String),

    /// Provider answered with an error status (quota, denied, malformed request).
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    InvalidParameter(String),

    /// A single provider record was unusable. Never aborts a search.
    #[error("Malformed place record: {0}")]
    MalformedRecord(String),

    #[error("Invalid coordinates ({lat}, {lon}). Lat: -90..90, Lon: -180..180")]
    InvalidCoordinate { lat: f64, lon: f64 },
}
