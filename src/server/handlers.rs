use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::places::{CitySites, Coordinate, PlaceError, RankedPlace, SearchBounds};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

impl From<PlaceError> for ApiError {
    fn from(err: PlaceError) -> Self {
        let status = match &err {
            PlaceError::NotFound(_) => StatusCode::NOT_FOUND,
            PlaceError::InvalidParameter(_) | PlaceError::InvalidCoordinate { .. } => {
                StatusCode::BAD_REQUEST
            }
            PlaceError::Upstream(_)
            | PlaceError::Transport(_)
            | PlaceError::InvalidResponse(_)
            | PlaceError::MalformedRecord(_) => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            warn!(error = %err, "provider failure");
        }
        ApiError(status, err.to_string())
    }
}

/// `Query` whose rejection is reported through [`ApiError`].
pub(super) struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError(rejection.status(), rejection.body_text())),
        }
    }
}

/// Gives the bare 408 from the timeout layer the usual error body.
pub(super) async fn timeout_body(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    ApiError(StatusCode::REQUEST_TIMEOUT, "Request timed out".into()).into_response()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

// ─── GET /health ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── GET /geocode ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeocodeQuery {
    pub city: Option<String>,
}

#[derive(Serialize)]
pub struct GeocodeResponse {
    pub lat: f64,
    pub lng: f64,
}

pub(super) async fn geocode(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<GeocodeQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let start = Instant::now();
    let city = params.city.unwrap_or_default();

    let coord = state.service.geocode(&city).await?;

    info!(
        city = city.trim(),
        lat = coord.lat(),
        lng = coord.lon(),
        ms = elapsed_ms(start),
        "GET /geocode"
    );

    Ok(Json(GeocodeResponse {
        lat: coord.lat(),
        lng: coord.lon(),
    }))
}

// ─── GET /places ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PlacesQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct PlacesResponse {
    pub results: Vec<RankedPlace>,
}

pub(super) async fn places(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<PlacesQuery>,
) -> Result<Json<PlacesResponse>, ApiError> {
    let start = Instant::now();

    let (Some(lat), Some(lng)) = (params.lat, params.lng) else {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            "Provide 'lat' and 'lng' parameters".into(),
        ));
    };
    let center = Coordinate::new(lat, lng)?;
    let bounds = SearchBounds::from_optional(params.radius, params.limit)?;

    let results = state.service.nearby(center, bounds).await?;

    info!(
        center = %center,
        radius = bounds.radius_meters(),
        limit = bounds.limit(),
        returned = results.len(),
        ms = elapsed_ms(start),
        "GET /places"
    );

    Ok(Json(PlacesResponse { results }))
}

// ─── GET /get_sites ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SitesQuery {
    pub city: Option<String>,
    pub radius: Option<u32>,
    pub limit: Option<usize>,
}

pub(super) async fn get_sites(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<SitesQuery>,
) -> Result<Json<CitySites>, ApiError> {
    let start = Instant::now();

    // Reject bad bounds before spending a geocode call.
    let bounds = SearchBounds::from_optional(params.radius, params.limit)?;
    let city = params.city.unwrap_or_default();

    let sites = state.service.sites(&city, bounds).await?;

    info!(
        city = %sites.city,
        returned = sites.places.len(),
        ms = elapsed_ms(start),
        "GET /get_sites"
    );

    Ok(Json(sites))
}
