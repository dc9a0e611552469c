//! Nearby search aggregation: paginate, dedupe, filter, rank, truncate.
//!
//! Pages are fetched until the buffer holds `limit` places, the provider
//! stops returning a continuation token, or [`MAX_PAGES`] pages were read.
//! Results are ranked by rating count, then rating, both descending.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info};

use super::provider::GeoProvider;
use super::types::{Coordinate, NearbyQuery, PlaceCandidate, PlaceError, RankedPlace, SearchStatus};

pub const SEARCH_CATEGORY: &str = "tourist_attraction";

pub const SEARCH_KEYWORDS: &str = "museum OR monument OR art gallery OR fort OR palace \
     OR memorial OR heritage site OR viewpoint";

/// Category tags that keep a place out of the tourist feed.
pub const EXCLUDED_TAGS: &[&str] = &[
    "place_of_worship",
    "church",
    "mosque",
    "hindu_temple",
    "synagogue",
    "gurdwara",
    "gurudwara",
    "temple",
];

/// Continuation tokens only become valid this long after they are issued.
pub const PAGE_TOKEN_DELAY: Duration = Duration::from_secs(2);

/// First page plus two continuations.
pub const MAX_PAGES: usize = 3;

pub const RADIUS_RANGE: (u32, u32) = (100, 50_000);
pub const LIMIT_RANGE: (usize, usize) = (10, 60);

/// Validated radius and result limit for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBounds {
    radius_meters: u32,
    limit: usize,
}

impl SearchBounds {
    pub const DEFAULT_RADIUS: u32 = 15_000;
    pub const DEFAULT_LIMIT: usize = 60;

    pub fn new(radius_meters: u32, limit: usize) -> Result<Self, PlaceError> {
        let (rmin, rmax) = RADIUS_RANGE;
        if !(rmin..=rmax).contains(&radius_meters) {
            return Err(PlaceError::InvalidParameter(format!(
                "radius must be between {} and {} meters, got {}",
                rmin, rmax, radius_meters
            )));
        }
        let (lmin, lmax) = LIMIT_RANGE;
        if !(lmin..=lmax).contains(&limit) {
            return Err(PlaceError::InvalidParameter(format!(
                "limit must be between {} and {}, got {}",
                lmin, lmax, limit
            )));
        }
        Ok(Self { radius_meters, limit })
    }

    /// Bounds from optional client input, defaulting what is missing.
    pub fn from_optional(radius_meters: Option<u32>, limit: Option<usize>) -> Result<Self, PlaceError> {
        Self::new(
            radius_meters.unwrap_or(Self::DEFAULT_RADIUS),
            limit.unwrap_or(Self::DEFAULT_LIMIT),
        )
    }

    pub fn radius_meters(&self) -> u32 {
        self.radius_meters
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for SearchBounds {
    fn default() -> Self {
        Self {
            radius_meters: Self::DEFAULT_RADIUS,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

pub fn is_excluded(types: &[String]) -> bool {
    types
        .iter()
        .any(|t| EXCLUDED_TAGS.iter().any(|ex| t.eq_ignore_ascii_case(ex)))
}

/// Popularity order: more ratings first, then higher rating.
fn by_popularity(a: &RankedPlace, b: &RankedPlace) -> Ordering {
    b.rating_count
        .cmp(&a.rating_count)
        .then_with(|| b.rating.total_cmp(&a.rating))
}

/// Per-call state. Never shared across requests.
struct SearchSession {
    limit: usize,
    results: Vec<RankedPlace>,
    seen: HashSet<String>,
    token: Option<String>,
    pages: usize,
}

impl SearchSession {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            results: Vec::with_capacity(limit),
            seen: HashSet::new(),
            token: None,
            pages: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.results.len() >= self.limit
    }

    /// Consume one page in provider order, stopping early once full.
    fn absorb(&mut self, candidates: Vec<PlaceCandidate>) {
        for candidate in candidates {
            if self.is_full() {
                break;
            }
            if !self.seen.insert(candidate.id.clone()) {
                continue;
            }
            if is_excluded(&candidate.types) {
                debug!(id = %candidate.id, types = ?candidate.types, "skipping place of worship");
                continue;
            }
            match RankedPlace::try_from(candidate) {
                Ok(place) => self.results.push(place),
                Err(e) => debug!(error = %e, "skipping malformed record"),
            }
        }
    }

    fn finish(mut self) -> Vec<RankedPlace> {
        self.results.sort_by(by_popularity);
        self.results.truncate(self.limit);
        self.results
    }
}

/// Collect ranked tourist places around `center`.
///
/// Provider error statuses are returned as [`PlaceError::Upstream`] straight
/// away, without retrying. An empty list is a valid result.
pub async fn aggregate(
    provider: &dyn GeoProvider,
    center: Coordinate,
    bounds: SearchBounds,
) -> Result<Vec<RankedPlace>, PlaceError> {
    let mut session = SearchSession::new(bounds.limit());

    loop {
        let query = NearbyQuery {
            center,
            radius_meters: bounds.radius_meters(),
            category: SEARCH_CATEGORY.to_string(),
            keywords: Some(SEARCH_KEYWORDS.to_string()),
            page_token: session.token.take(),
        };

        let page = provider.search_nearby(&query).await?;
        session.pages += 1;

        if let SearchStatus::Error(raw) = page.status {
            return Err(PlaceError::Upstream(raw));
        }

        debug!(
            page = session.pages,
            candidates = page.candidates.len(),
            has_more = page.next_token.is_some(),
            "nearby page fetched"
        );
        session.absorb(page.candidates);

        if session.is_full() {
            break;
        }
        let Some(token) = page.next_token else {
            break;
        };
        if session.pages >= MAX_PAGES {
            break;
        }

        tokio::time::sleep(PAGE_TOKEN_DELAY).await;
        session.token = Some(token);
    }

    let pages = session.pages;
    let seen = session.seen.len();
    let results = session.finish();
    info!(
        center = %center,
        radius = bounds.radius_meters(),
        pages,
        seen,
        returned = results.len(),
        "nearby search complete"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::testing::{page, place, StubProvider};
    use tokio::time::Instant;

    fn center() -> Coordinate {
        Coordinate::new(28.6139, 77.2090).unwrap()
    }

    fn bounds(limit: usize) -> SearchBounds {
        SearchBounds::new(5_000, limit).unwrap()
    }

    fn unique_page(prefix: &str, n: usize, token: Option<&str>) -> crate::places::SearchPage {
        let places = (0..n)
            .map(|i| place(&format!("{}-{}", prefix, i), (i as u64) * 10, 4.0))
            .collect();
        page(places, token)
    }

    fn assert_sorted(results: &[RankedPlace]) {
        for pair in results.windows(2) {
            let a = (pair[0].rating_count, pair[0].rating);
            let b = (pair[1].rating_count, pair[1].rating);
            assert!(a.0 > b.0 || (a.0 == b.0 && a.1 >= b.1), "{:?} before {:?}", a, b);
        }
    }

    #[test]
    fn test_bounds_validation() {
        assert!(SearchBounds::new(100, 10).is_ok());
        assert!(SearchBounds::new(50_000, 60).is_ok());
        assert!(SearchBounds::new(99, 10).is_err());
        assert!(SearchBounds::new(50_001, 10).is_err());
        assert!(SearchBounds::new(1_000, 9).is_err());
        assert!(SearchBounds::new(1_000, 61).is_err());
        let defaults = SearchBounds::from_optional(None, None).unwrap();
        assert_eq!(defaults, SearchBounds::default());
    }

    #[test]
    fn test_excluded_tags_case_insensitive() {
        assert!(is_excluded(&["Mosque".to_string()]));
        assert!(is_excluded(&["museum".to_string(), "PLACE_OF_WORSHIP".to_string()]));
        assert!(!is_excluded(&["museum".to_string(), "tourist_attraction".to_string()]));
        assert!(!is_excluded(&[]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_filters_worship_sites() {
        let mut places: Vec<_> = (0..5).map(|i| place(&format!("p{}", i), 100, 4.0)).collect();
        places[1].types = vec!["mosque".into()];
        places[3].types = vec!["tourist_attraction".into(), "MOSQUE".into()];
        let stub = StubProvider::with_pages(vec![page(places, None)]);

        let results = aggregate(&stub, center(), bounds(10)).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|p| !is_excluded(&p.types)));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_reached_on_first_page() {
        let stub = StubProvider::with_pages(vec![
            unique_page("a", 20, Some("t1")),
            unique_page("b", 20, Some("t2")),
            unique_page("c", 20, None),
        ]);

        let results = aggregate(&stub, center(), bounds(10)).await.unwrap();

        assert_eq!(results.len(), 10);
        assert_sorted(&results);
        assert_eq!(stub.calls(), 1);
        assert!(results.iter().all(|p| p.id.starts_with("a-")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_capped_at_three_pages() {
        let stub = StubProvider::endless(5);
        let start = Instant::now();

        let results = aggregate(&stub, center(), bounds(60)).await.unwrap();

        assert_eq!(stub.calls(), MAX_PAGES);
        assert_eq!(results.len(), 15);
        // Two waits: before the second and third page.
        assert!(start.elapsed() >= PAGE_TOKEN_DELAY * 2);
        assert!(start.elapsed() < PAGE_TOKEN_DELAY * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_are_echoed() {
        let stub = StubProvider::with_pages(vec![
            unique_page("a", 3, Some("t1")),
            unique_page("b", 3, Some("t2")),
            unique_page("c", 3, None),
        ]);

        aggregate(&stub, center(), bounds(60)).await.unwrap();

        let queries = stub.queries();
        let tokens: Vec<_> = queries.iter().map(|q| q.page_token.clone()).collect();
        assert_eq!(tokens, vec![None, Some("t1".into()), Some("t2".into())]);
        assert!(queries.iter().all(|q| q.category == SEARCH_CATEGORY));
        assert!(queries.iter().all(|q| q.radius_meters == 5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedupes_across_pages() {
        let mut second: Vec<_> = (0..4).map(|i| place(&format!("a-{}", i), 999, 5.0)).collect();
        second.extend((0..6).map(|i| place(&format!("b-{}", i), 50, 3.0)));
        let stub = StubProvider::with_pages(vec![
            unique_page("a", 8, Some("t1")),
            page(second, None),
        ]);

        let results = aggregate(&stub, center(), bounds(60)).await.unwrap();

        assert_eq!(results.len(), 14);
        let ids: HashSet<_> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), results.len());
        // First sighting wins; the repeated records carried different counts.
        let shared = results.iter().find(|p| p.id == "a-0").unwrap();
        assert_eq!(shared.rating_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicates_within_page() {
        let stub = StubProvider::with_pages(vec![page(
            vec![place("x", 1, 1.0), place("x", 2, 2.0), place("y", 3, 3.0)],
            None,
        )]);
        let results = aggregate(&stub, center(), bounds(10)).await.unwrap();
        let ids: Vec<_> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_records_without_location() {
        let mut broken = place("broken", 10_000, 5.0);
        broken.coordinate = None;
        let stub = StubProvider::with_pages(vec![page(vec![broken, place("ok", 1, 1.0)], None)]);

        let results = aggregate(&stub, center(), bounds(10)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_by_count_then_rating() {
        let mut unrated = place("unrated", 0, 0.0);
        unrated.rating = None;
        unrated.rating_count = None;
        let stub = StubProvider::with_pages(vec![page(
            vec![
                unrated,
                place("low", 10, 4.9),
                place("high", 500, 3.1),
                place("tie-better", 10, 5.0),
            ],
            None,
        )]);

        let results = aggregate(&stub, center(), bounds(10)).await.unwrap();

        let ids: Vec<_> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "tie-better", "low", "unrated"]);
        assert_sorted(&results);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_results_without_token() {
        let stub = StubProvider::with_pages(vec![crate::places::SearchPage {
            candidates: vec![],
            next_token: None,
            status: SearchStatus::ZeroResults,
        }]);

        let results = aggregate(&stub, center(), bounds(10)).await.unwrap();

        assert!(results.is_empty());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_filtered_is_success() {
        let mut places: Vec<_> = (0..4).map(|i| place(&format!("t{}", i), 5, 4.0)).collect();
        for p in &mut places {
            p.types = vec!["hindu_temple".into()];
        }
        let stub = StubProvider::with_pages(vec![page(places, None)]);
        let results = aggregate(&stub, center(), bounds(10)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_is_not_retried() {
        let stub = StubProvider::with_pages(vec![
            unique_page("a", 5, Some("t1")),
            crate::places::SearchPage {
                candidates: vec![],
                next_token: None,
                status: SearchStatus::Error("INVALID_REQUEST".into()),
            },
        ]);

        let err = aggregate(&stub, center(), bounds(60)).await.unwrap_err();

        assert!(matches!(err, PlaceError::Upstream(ref s) if s == "INVALID_REQUEST"));
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_propagates() {
        let stub = StubProvider::failing(PlaceError::Transport("connection reset".into()));
        let err = aggregate(&stub, center(), bounds(10)).await.unwrap_err();
        assert!(matches!(err, PlaceError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_for_fixed_pages() {
        let pages = || {
            vec![
                unique_page("a", 20, Some("t1")),
                unique_page("b", 20, Some("t2")),
                unique_page("c", 20, None),
            ]
        };
        let first = aggregate(&StubProvider::with_pages(pages()), center(), bounds(40))
            .await
            .unwrap();
        let second = aggregate(&StubProvider::with_pages(pages()), center(), bounds(40))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_length_never_exceeds_limit() {
        for limit in [10, 25, 60] {
            let stub = StubProvider::endless(20);
            let results = aggregate(&stub, center(), bounds(limit)).await.unwrap();
            assert!(results.len() <= limit);
        }
    }
}
