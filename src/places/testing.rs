//! Deterministic in-memory provider for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::provider::GeoProvider;
use super::types::{Coordinate, NearbyQuery, PlaceCandidate, PlaceError, SearchPage, SearchStatus};

enum Script {
    Pages(VecDeque<SearchPage>),
    /// Every call yields `n` fresh places and another token.
    Endless(usize),
    Failing(Option<PlaceError>),
}

pub struct StubProvider {
    script: Mutex<Script>,
    locations: HashMap<String, Coordinate>,
    geocode_failure: Mutex<Option<PlaceError>>,
    queries: Mutex<Vec<NearbyQuery>>,
}

impl StubProvider {
    fn from_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            locations: HashMap::new(),
            geocode_failure: Mutex::new(None),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pages(pages: Vec<SearchPage>) -> Self {
        Self::from_script(Script::Pages(pages.into()))
    }

    pub fn endless(per_page: usize) -> Self {
        Self::from_script(Script::Endless(per_page))
    }

    pub fn failing(err: PlaceError) -> Self {
        Self::from_script(Script::Failing(Some(err)))
    }

    pub fn with_location(mut self, name: &str, lat: f64, lon: f64) -> Self {
        let coord = Coordinate::new(lat, lon).unwrap();
        self.locations.insert(name.to_lowercase(), coord);
        self
    }

    pub fn with_geocode_failure(self, err: PlaceError) -> Self {
        *self.geocode_failure.lock().unwrap() = Some(err);
        self
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<NearbyQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeoProvider for StubProvider {
    async fn resolve_location(&self, query: &str) -> Result<Coordinate, PlaceError> {
        if let Some(err) = self.geocode_failure.lock().unwrap().take() {
            return Err(err);
        }
        self.locations
            .get(&query.to_lowercase())
            .copied()
            .ok_or_else(|| PlaceError::NotFound(query.to_string()))
    }

    async fn search_nearby(&self, query: &NearbyQuery) -> Result<SearchPage, PlaceError> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.clone());
            queries.len()
        };

        let mut script = self.script.lock().unwrap();
        match &mut *script {
            Script::Pages(pages) => Ok(pages.pop_front().unwrap_or_else(|| page(vec![], None))),
            Script::Endless(n) => {
                let places = (0..*n)
                    .map(|i| place(&format!("call{}-{}", call, i), (call * 100 + i) as u64, 4.0))
                    .collect();
                Ok(page(places, Some(&format!("token-{}", call))))
            }
            Script::Failing(err) => Err(err
                .take()
                .unwrap_or_else(|| PlaceError::Transport("stub exhausted".into()))),
        }
    }
}

/// A well-formed tourist attraction near central Delhi.
pub fn place(id: &str, rating_count: u64, rating: f64) -> PlaceCandidate {
    PlaceCandidate {
        id: id.to_string(),
        name: format!("Place {}", id),
        coordinate: Some(Coordinate::new(28.61, 77.21).unwrap()),
        vicinity: Some(format!("{} Road", id)),
        formatted_address: None,
        types: vec!["tourist_attraction".into(), "point_of_interest".into()],
        rating: Some(rating),
        rating_count: Some(rating_count),
    }
}

pub fn page(candidates: Vec<PlaceCandidate>, token: Option<&str>) -> SearchPage {
    let status = if candidates.is_empty() {
        SearchStatus::ZeroResults
    } else {
        SearchStatus::Ok
    };
    SearchPage {
        candidates,
        next_token: token.map(str::to_string),
        status,
    }
}
