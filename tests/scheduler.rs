//! Poll loop driven by the mock source

use std::sync::Arc;
use std::time::Duration;

use flightboard::sources::MockSource;
use flightboard::{
    AircraftIndex, BudgetGuard, DataSource, EnrichmentResolver, FlightboardConfig, PollerState,
    ReferenceArea, RouteCache, Scheduler, SourceKind,
};

fn resolver() -> Arc<EnrichmentResolver> {
    Arc::new(EnrichmentResolver::new(
        Arc::new(AircraftIndex::open_in_memory().unwrap()),
        Arc::new(RouteCache::open_in_memory(Duration::from_secs(86400)).unwrap()),
        Arc::new(BudgetGuard::new(200)),
    ))
}

#[tokio::test(start_paused = true)]
async fn mock_source_publishes_enriched_snapshots() {
    let scheduler = Scheduler::new(MockSource::new(), resolver());
    assert_eq!(scheduler.interval(), Duration::from_secs(5));

    let mut snapshots = scheduler.subscribe();
    let states = scheduler.watch_state();
    let shutdown = scheduler.shutdown_token();
    let handle = scheduler.start();

    for cycle in 1..=3 {
        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot.cycle, cycle);
        assert_eq!(snapshot.source, "mock");
        assert_eq!(snapshot.len(), 8);

        let ryanair = snapshot
            .flights
            .iter()
            .find(|f| f.hex() == "4ca87d")
            .unwrap();
        assert_eq!(ryanair.identity.operator.as_deref(), Some("RYANAIR"));
        // No remote configured: the route stays unknown
        assert_eq!(ryanair.route, None);
    }

    shutdown.cancel();
    handle.await.unwrap();
    assert_eq!(*states.borrow(), PollerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn data_source_from_config_drives_scheduler() {
    let config = FlightboardConfig {
        source: SourceKind::Mock,
        ..Default::default()
    };
    let source = DataSource::from_config(&config).unwrap();
    let scheduler = Scheduler::new(source, resolver()).with_interval(Duration::from_secs(30));

    let mut snapshots = scheduler.subscribe();
    let shutdown = scheduler.shutdown_token();
    let handle = scheduler.start();

    snapshots.changed().await.unwrap();
    let first = snapshots.borrow_and_update().clone();
    let started = tokio::time::Instant::now();

    snapshots.changed().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(29));
    let second = snapshots.borrow_and_update().clone();

    // Each cycle is a fresh snapshot, not a patched one
    assert_eq!(second.cycle, first.cycle + 1);
    assert!(!Arc::ptr_eq(&first, &second));

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn mock_flights_are_sorted_but_never_dropped() {
    // Reference point in Edinburgh, far from the London mock traffic
    let area = ReferenceArea::new(55.95, -3.19, 10.0);
    let scheduler = Scheduler::new(MockSource::new(), resolver()).with_area(area);

    let mut snapshots = scheduler.subscribe();
    let shutdown = scheduler.shutdown_token();
    let handle = scheduler.start();

    snapshots.changed().await.unwrap();
    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.len(), 8);

    let distances: Vec<f64> = snapshot
        .flights
        .iter()
        .map(|f| f.position.distance_nm.unwrap())
        .collect();
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(distances[0] > 250.0);

    shutdown.cancel();
    handle.await.unwrap();
}

#[test]
fn config_reference_area_matches_settings() {
    let config = FlightboardConfig {
        latitude: 53.35,
        longitude: -2.27,
        radius_nm: 25.0,
        ..Default::default()
    };
    let area = config.reference_area();
    assert_eq!(area, ReferenceArea::new(53.35, -2.27, 25.0));
    assert!(area.contains(53.48, -2.24));
}
