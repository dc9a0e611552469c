//! Places subsystem for sitescout.
//!
//! Resolves city names through the mapping provider and builds the ranked
//! tourist-attraction feed around a coordinate.

pub mod aggregator;
pub mod provider;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{aggregate, is_excluded, SearchBounds};
pub use provider::{GeoProvider, GoogleMapsClient};
pub use service::{CitySites, SitesService};
pub use types::{Coordinate, NearbyQuery, PlaceCandidate, PlaceError, RankedPlace, SearchPage, SearchStatus};
