//! End-to-end enrichment through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use flightboard::database::AirportRecord;
use flightboard::enrich::{AirportLookup, RemoteError, RemoteRoute, RouteLookupOutcome};
use flightboard::sources::MockSource;
use flightboard::{
    normalize, within_area, AircraftIndex, BudgetGuard, EnrichmentResolver, IdentitySource,
    Position, PositionSource, ReferenceArea, RouteCache, RouteLookup,
};

const DAY: Duration = Duration::from_secs(86400);

struct CountingLookup {
    calls: AtomicUsize,
}

impl CountingLookup {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RouteLookup for CountingLookup {
    fn name(&self) -> &str {
        "counting"
    }

    fn lookup(&self, callsign: &str) -> Result<RouteLookupOutcome, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match callsign {
            "RYR4421" => Ok(RouteLookupOutcome::Found(RemoteRoute {
                origin: Some("STN".to_string()),
                destination: Some("DUB".to_string()),
            })),
            _ => Ok(RouteLookupOutcome::NotFound),
        }
    }
}

struct CountingAirports {
    calls: AtomicUsize,
}

impl CountingAirports {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AirportLookup for CountingAirports {
    fn lookup_airport(&self, code: &str) -> Result<Option<AirportRecord>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(AirportRecord {
            code: code.to_string(),
            name: format!("{} Airport", code),
            ..Default::default()
        }))
    }
}

fn mock_ryanair() -> Position {
    MockSource::new()
        .fetch()
        .unwrap()
        .into_iter()
        .filter_map(normalize)
        .find(|p| p.callsign.as_deref() == Some("RYR4421"))
        .unwrap()
}

fn resolver_in(
    index: Arc<AircraftIndex>,
    cache: Arc<RouteCache>,
    ceiling: u32,
    remote: Arc<CountingLookup>,
) -> EnrichmentResolver {
    EnrichmentResolver::new(index, cache, Arc::new(BudgetGuard::new(ceiling))).with_remote(remote)
}

#[test]
fn mock_flight_enriched_over_two_cycles() {
    let remote = CountingLookup::new();
    let resolver = resolver_in(
        Arc::new(AircraftIndex::open_in_memory().unwrap()),
        Arc::new(RouteCache::open_in_memory(DAY).unwrap()),
        200,
        remote.clone(),
    );

    let position = mock_ryanair();
    assert_eq!(position.hex, "4ca87d");

    // First cycle: prefix identity, one remote call, result cached
    let first = resolver.enrich(position.clone());
    assert_eq!(first.identity.operator.as_deref(), Some("RYANAIR"));
    assert_eq!(first.identity.type_code, None);
    assert_eq!(first.identity.registration, None);
    assert_eq!(first.identity.source, IdentitySource::CallsignPrefix);
    assert_eq!(remote.calls(), 1);
    assert_eq!(resolver.budget().consumed(), 1);
    assert!(resolver.cache().get("RYR4421").unwrap().is_some());

    // Second cycle: warm cache, nothing spent
    let second = resolver.enrich(position);
    assert_eq!(second, first);
    assert_eq!(remote.calls(), 1);
    assert_eq!(resolver.budget().consumed(), 1);
    let route = second.route.unwrap();
    assert_eq!(route.origin.as_deref(), Some("STN"));
    assert_eq!(route.destination.as_deref(), Some("DUB"));
}

#[test]
fn zero_budget_never_calls_remote() {
    let remote = CountingLookup::new();
    let resolver = resolver_in(
        Arc::new(AircraftIndex::open_in_memory().unwrap()),
        Arc::new(RouteCache::open_in_memory(DAY).unwrap()),
        0,
        remote.clone(),
    );

    let flight = resolver.enrich(mock_ryanair());
    assert_eq!(flight.route, None);
    assert_eq!(flight.identity.operator.as_deref(), Some("RYANAIR"));
    assert_eq!(remote.calls(), 0);
    assert_eq!(resolver.cache().stats().unwrap().total, 0);
}

#[test]
fn whole_mock_batch_respects_budget() {
    let remote = CountingLookup::new();
    let resolver = resolver_in(
        Arc::new(AircraftIndex::open_in_memory().unwrap()),
        Arc::new(RouteCache::open_in_memory(DAY).unwrap()),
        3,
        remote.clone(),
    );

    let positions: Vec<Position> = MockSource::new()
        .fetch()
        .unwrap()
        .into_iter()
        .filter_map(normalize)
        .collect();
    let flights = resolver.enrich_batch(positions.clone());

    assert_eq!(flights.len(), 8);
    let hexes: Vec<_> = flights.iter().map(|f| f.hex()).collect();
    let expected: Vec<_> = positions.iter().map(|p| p.hex.as_str()).collect();
    assert_eq!(hexes, expected);
    assert_eq!(remote.calls(), 3);
    assert!(resolver.budget().is_exhausted());
}

#[test]
fn expired_route_is_fetched_again() {
    let remote = CountingLookup::new();
    let resolver = resolver_in(
        Arc::new(AircraftIndex::open_in_memory().unwrap()),
        Arc::new(RouteCache::open_in_memory(DAY).unwrap()),
        200,
        remote.clone(),
    );
    let position = mock_ryanair();

    let now = Utc::now();
    resolver.enrich_at(position.clone(), now);
    assert_eq!(remote.calls(), 1);

    let within = now + ChronoDuration::hours(23);
    assert!(resolver.enrich_at(position.clone(), within).route.is_some());
    assert_eq!(remote.calls(), 1);

    let past_ttl = now + ChronoDuration::hours(24) + ChronoDuration::seconds(1);
    assert!(resolver.enrich_at(position, past_ttl).route.is_some());
    assert_eq!(remote.calls(), 2);
}

#[test]
fn restart_reuses_persisted_routes() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_str().unwrap();
    let position = mock_ryanair();

    {
        let remote = CountingLookup::new();
        let resolver = resolver_in(
            Arc::new(AircraftIndex::open(data_dir).unwrap()),
            Arc::new(RouteCache::open(data_dir, DAY).unwrap()),
            200,
            remote.clone(),
        );
        assert!(resolver.enrich(position.clone()).route.is_some());
        assert_eq!(remote.calls(), 1);
    }

    // New process: fresh budget, same files
    let remote = CountingLookup::new();
    let resolver = resolver_in(
        Arc::new(AircraftIndex::open(data_dir).unwrap()),
        Arc::new(RouteCache::open(data_dir, DAY).unwrap()),
        200,
        remote.clone(),
    );
    let flight = resolver.enrich(position);
    assert_eq!(
        flight.route.and_then(|r| r.origin),
        Some("STN".to_string())
    );
    assert_eq!(remote.calls(), 0);
    assert_eq!(resolver.budget().consumed(), 0);
}

#[test]
fn seeded_index_wins_over_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("aircraft.csv");
    std::fs::write(
        &csv_path,
        "'icao24','registration','manufacturericao','manufacturername','model','typecode','serialnumber','linenumber','icaoaircrafttype','operator','operatorcallsign','operatoricao','operatoriata','owner'\n\
         '4ca87d','EI-DCL','BOEING','Boeing','737-8AS','B738','33563','','L2J','Ryanair','RYANAIR','RYR','FR','Ryanair'\n\
         '','','','','','','','','','','','','',''\n",
    )
    .unwrap();

    let index = Arc::new(AircraftIndex::open_in_memory().unwrap());
    let summary = index.seed_from(csv_path.to_str().unwrap()).unwrap();
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 1);

    // Re-import yields the same contents
    index.seed_from(csv_path.to_str().unwrap()).unwrap();
    assert_eq!(index.stats().unwrap().counts.total, 1);

    let remote = CountingLookup::new();
    let resolver = resolver_in(
        index,
        Arc::new(RouteCache::open_in_memory(DAY).unwrap()),
        200,
        remote.clone(),
    );
    let position = mock_ryanair();
    let flight = resolver.enrich(position.clone());
    assert_eq!(flight.identity.source, IdentitySource::Index);
    assert_eq!(flight.identity.type_code.as_deref(), Some("B738"));
    assert_eq!(flight.identity.registration.as_deref(), Some("EI-DCL"));
    assert_eq!(flight.identity.operator.as_deref(), Some("Ryanair"));
    assert_eq!(remote.calls(), 1);

    // The next cycle is served entirely from local state
    let consumed = resolver.budget().consumed();
    let again = resolver.enrich(position);
    assert_eq!(again, flight);
    assert_eq!(remote.calls(), 1);
    assert_eq!(resolver.budget().consumed(), consumed);
}

#[test]
fn broken_import_keeps_existing_index() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.csv");
    std::fs::write(&good, "icao24,registration,typecode,operator\n4ca87d,EI-DCL,B738,Ryanair\n")
        .unwrap();
    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, "registration,typecode\nEI-DCL,B738\n").unwrap();

    let index = AircraftIndex::open_in_memory().unwrap();
    index.seed_from(good.to_str().unwrap()).unwrap();
    assert!(index.seed_from(bad.to_str().unwrap()).is_err());

    let record = index.lookup("4ca87d").unwrap().unwrap();
    assert_eq!(record.registration.as_deref(), Some("EI-DCL"));
}

#[test]
fn far_decoder_reports_cost_no_budget() {
    let payload = serde_json::json!({
        "now": 1_700_000_000.0,
        "aircraft": [
            {"hex": "4ca87d", "flight": "RYR4421 ", "lat": 51.52, "lon": -0.11, "alt_baro": 12000, "gs": 310.0},
            {"hex": "400aaa", "flight": "EZY12AB", "lat": 55.95, "lon": -3.19, "alt_baro": 35000, "gs": 450.0},
            {"hex": "484bbb", "flight": "KLM1001", "lat": 52.31, "lon": 4.76, "alt_baro": 36000, "gs": 470.0}
        ]
    });
    let reports = flightboard::sources::decoder::parse_aircraft_json(&payload).unwrap();
    let area = ReferenceArea::new(51.5074, -0.1278, 10.0);
    let positions = within_area(reports.into_iter().filter_map(normalize).collect(), &area);

    let remote = CountingLookup::new();
    let resolver = resolver_in(
        Arc::new(AircraftIndex::open_in_memory().unwrap()),
        Arc::new(RouteCache::open_in_memory(DAY).unwrap()),
        200,
        remote.clone(),
    );
    let flights = resolver.enrich_batch(positions);

    assert_eq!(flights.len(), 1);
    assert_eq!(flights[0].hex(), "4ca87d");
    assert!(flights[0].position.distance_nm.is_some_and(|d| d < 2.0));
    assert_eq!(remote.calls(), 1);
    assert_eq!(resolver.budget().consumed(), 1);
}

#[test]
fn airport_names_are_reused_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_str().unwrap();

    {
        let airports = CountingAirports::new();
        let resolver = resolver_in(
            Arc::new(AircraftIndex::open_in_memory().unwrap()),
            Arc::new(RouteCache::open(data_dir, DAY).unwrap()),
            200,
            CountingLookup::new(),
        )
        .with_airport_lookup(airports.clone());

        let route = resolver.enrich(mock_ryanair()).route.unwrap();
        assert_eq!(route.origin_name.as_deref(), Some("STN Airport"));
        assert_eq!(airports.calls(), 2);
        assert_eq!(resolver.budget().consumed(), 3);
    }

    // Zero TTL: the route has to be fetched again, its airports do not
    let airports = CountingAirports::new();
    let remote = CountingLookup::new();
    let resolver = resolver_in(
        Arc::new(AircraftIndex::open_in_memory().unwrap()),
        Arc::new(RouteCache::open(data_dir, Duration::ZERO).unwrap()),
        200,
        remote.clone(),
    )
    .with_airport_lookup(airports.clone());

    let route = resolver.enrich(mock_ryanair()).route.unwrap();
    assert_eq!(remote.calls(), 1);
    assert_eq!(airports.calls(), 0);
    assert_eq!(route.destination_name.as_deref(), Some("DUB Airport"));
    assert_eq!(resolver.budget().consumed(), 1);
}
