//! Geo provider contract and the Google Maps implementation.
//!
//! Google answers most failures with HTTP 200 and a `status` field, so the
//! decode step inspects that before trusting `results`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::types::{Coordinate, NearbyQuery, PlaceCandidate, PlaceError, SearchPage, SearchStatus};
use crate::config::ProviderConfig;

const USER_AGENT: &str = concat!("sitescout/", env!("CARGO_PKG_VERSION"));

/// The mapping provider seen by the aggregator.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Best-guess coordinate for a free-text location.
    async fn resolve_location(&self, query: &str) -> Result<Coordinate, PlaceError>;

    /// One page of places around `query.center`.
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<SearchPage, PlaceError>;
}

// ─── Wire format ────────────────────────────────────────────────

#[derive(Deserialize, Debug, Default)]
struct WireLocation {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
struct WireGeometry {
    #[serde(default)]
    location: Option<WireLocation>,
}

impl WireGeometry {
    fn coordinate(&self) -> Option<Coordinate> {
        let loc = self.location.as_ref()?;
        Coordinate::new(loc.lat?, loc.lng?).ok()
    }
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    #[serde(default)]
    geometry: WireGeometry,
}

#[derive(Deserialize, Debug)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct NearbyResult {
    place_id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    geometry: Option<WireGeometry>,
    vicinity: Option<String>,
    formatted_address: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
    next_page_token: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

fn upstream_message(status: &str, error_message: Option<&str>) -> String {
    match error_message {
        Some(msg) if !msg.is_empty() => format!("{} ({})", status, msg),
        _ => status.to_string(),
    }
}

fn decode_geocode(query: &str, body: GeocodeResponse) -> Result<Coordinate, PlaceError> {
    match body.status.as_str() {
        "OK" => {
            let first = body
                .results
                .first()
                .ok_or_else(|| PlaceError::NotFound(query.to_string()))?;
            first.geometry.coordinate().ok_or_else(|| {
                PlaceError::InvalidResponse(format!("geocode result for '{}' has no location", query))
            })
        }
        "ZERO_RESULTS" => Err(PlaceError::NotFound(query.to_string())),
        other => Err(PlaceError::Upstream(upstream_message(
            other,
            body.error_message.as_deref(),
        ))),
    }
}

fn decode_nearby(body: NearbyResponse) -> SearchPage {
    let status = SearchStatus::from_raw(&body.status);
    if let SearchStatus::Error(ref raw) = status {
        warn!(
            status = %raw,
            message = body.error_message.as_deref().unwrap_or(""),
            "nearby search rejected by provider"
        );
    }

    let candidates = body
        .results
        .into_iter()
        .filter_map(|r| {
            let Some(id) = r.place_id.filter(|id| !id.is_empty()) else {
                debug!(name = ?r.name, "dropping place without place_id");
                return None;
            };
            Some(PlaceCandidate {
                id,
                name: r.name.unwrap_or_default(),
                coordinate: r.geometry.as_ref().and_then(WireGeometry::coordinate),
                vicinity: r.vicinity,
                formatted_address: r.formatted_address,
                types: r.types,
                rating: r.rating,
                rating_count: r.user_ratings_total,
            })
        })
        .collect();

    SearchPage {
        candidates,
        next_token: body.next_page_token.filter(|t| !t.is_empty()),
        status,
    }
}

// ─── Google Maps client ─────────────────────────────────────────

/// Google Maps Geocoding + Places Nearby Search client.
///
/// ureq is blocking, so every call is moved onto tokio's blocking pool.
#[derive(Clone)]
pub struct GoogleMapsClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl GoogleMapsClient {
    pub fn new(config: &ProviderConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, PlaceError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.agent.get(&url);
        for (name, value) in params {
            request = request.query(name, value);
        }

        let response = request
            .query("key", &self.api_key)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => PlaceError::Upstream(format!("HTTP {}", code)),
                ureq::Error::Transport(t) => PlaceError::Transport(t.to_string()),
            })?;

        response
            .into_json()
            .map_err(|e| PlaceError::InvalidResponse(e.to_string()))
    }

    fn geocode_blocking(&self, query: &str) -> Result<Coordinate, PlaceError> {
        let body: GeocodeResponse = self.get_json("geocode/json", &[("address", query)])?;
        decode_geocode(query, body)
    }

    fn nearby_blocking(&self, query: &NearbyQuery) -> Result<SearchPage, PlaceError> {
        let location = query.center.to_string();
        let radius = query.radius_meters.to_string();
        let mut params = vec![
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("type", query.category.as_str()),
        ];
        if let Some(ref keywords) = query.keywords {
            params.push(("keyword", keywords.as_str()));
        }
        if let Some(ref token) = query.page_token {
            params.push(("pagetoken", token.as_str()));
        }

        let body: NearbyResponse = self.get_json("place/nearbysearch/json", &params)?;
        Ok(decode_nearby(body))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, PlaceError>
where
    F: FnOnce() -> Result<T, PlaceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PlaceError::Transport(format!("provider task failed: {}", e)))?
}

#[async_trait]
impl GeoProvider for GoogleMapsClient {
    async fn resolve_location(&self, query: &str) -> Result<Coordinate, PlaceError> {
        let client = self.clone();
        let query = query.to_string();
        run_blocking(move || client.geocode_blocking(&query)).await
    }

    async fn search_nearby(&self, query: &NearbyQuery) -> Result<SearchPage, PlaceError> {
        let client = self.clone();
        let query = query.clone();
        run_blocking(move || client.nearby_blocking(&query)).await
    }
}
