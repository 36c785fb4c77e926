//! Tiered flight enrichment
//!
//! Each normalized position is joined with an aircraft identity and a route.
//! Both field groups are resolved by walking an ordered list of tiers and
//! stopping at the first one that produces a value:
//!
//! | Field group | Tiers (default order)                        |
//! |-------------|----------------------------------------------|
//! | identity    | [`IdentityTier::Index`], [`IdentityTier::CallsignPrefix`] |
//! | route       | [`RouteTier::Cache`], [`RouteTier::Remote`]  |
//!
//! A route found remotely also gets airport names for its codes, from the
//! local airport table or, on a miss, one more budgeted remote call per
//! airport.
//!
//! Enrichment never fails. Lookup errors are logged and the affected field
//! group is left unknown for the cycle.

pub mod budget;
pub mod cache;
pub mod import;
pub mod index;
pub mod prefix;
pub mod remote;

pub use budget::{BudgetGuard, BudgetStatus, DEFAULT_MAX_API_CALLS};
pub use cache::{
    normalize_airport_code, normalize_callsign, RouteCache, RouteCacheStats,
    DEFAULT_ROUTE_TTL_SECS,
};
pub use import::{parse_aircraft_csv, read_aircraft_csv, ImportError, OPENSKY_AIRCRAFT_DB_URL};
pub use index::{normalize_hex, AircraftIndex, IndexStats, SeedSummary};
pub use prefix::CallsignPrefixResolver;
pub use remote::{
    AirLabsClient, AirportLookup, RemoteError, RemoteRoute, RouteLookup, RouteLookupOutcome,
    AIRLABS_BASE_URL,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::config::FlightboardConfig;
use crate::database::AirportRecord;
use crate::flight::{AircraftIdentity, EnrichedFlight, Position, Route};

/// A step that can produce an aircraft identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityTier {
    /// Full identity from the aircraft index, keyed by hex
    Index,
    /// Operator only, from the callsign's airline prefix
    CallsignPrefix,
}

impl IdentityTier {
    pub const DEFAULT_ORDER: [IdentityTier; 2] = [IdentityTier::Index, IdentityTier::CallsignPrefix];
}

/// A step that can produce a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTier {
    /// Unexpired entry in the persistent cache
    Cache,
    /// Metered remote lookup, gated by the session budget
    Remote,
}

impl RouteTier {
    pub const DEFAULT_ORDER: [RouteTier; 2] = [RouteTier::Cache, RouteTier::Remote];
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    remote_found: AtomicU64,
    remote_not_found: AtomicU64,
    remote_failed: AtomicU64,
    airports_found: AtomicU64,
}

/// Session counters for the enrichment chain
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EnrichmentStats {
    pub cache_hits: u64,
    pub remote_found: u64,
    pub remote_not_found: u64,
    pub remote_failed: u64,
    /// Airport names fetched remotely
    pub airports_found: u64,
    pub budget: BudgetStatus,
}

/// Joins positions with identity and route
///
/// Safe to share across threads. The index, cache and budget each serialize
/// their own access; the resolver adds two small session sets on top.
pub struct EnrichmentResolver {
    index: Arc<AircraftIndex>,
    prefixes: CallsignPrefixResolver,
    cache: Arc<RouteCache>,
    remote: Option<Arc<dyn RouteLookup>>,
    airports: Option<Arc<dyn AirportLookup>>,
    budget: Arc<BudgetGuard>,
    identity_tiers: Vec<IdentityTier>,
    route_tiers: Vec<RouteTier>,
    /// Callsigns the remote service reported as unknown this session
    session_misses: Mutex<HashSet<String>>,
    /// Callsigns with a remote call currently in progress
    in_flight: Mutex<HashSet<String>>,
    /// Airport codes the remote service reported as unknown this session
    airport_misses: Mutex<HashSet<String>>,
    /// Held for the whole of an airport name lookup
    airport_lock: Mutex<()>,
    counters: Counters,
}

impl EnrichmentResolver {
    pub fn new(index: Arc<AircraftIndex>, cache: Arc<RouteCache>, budget: Arc<BudgetGuard>) -> Self {
        Self {
            index,
            prefixes: CallsignPrefixResolver::new(),
            cache,
            remote: None,
            airports: None,
            budget,
            identity_tiers: IdentityTier::DEFAULT_ORDER.to_vec(),
            route_tiers: RouteTier::DEFAULT_ORDER.to_vec(),
            session_misses: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashSet::new()),
            airport_misses: Mutex::new(HashSet::new()),
            airport_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Build the full chain from configuration
    ///
    /// Fails only if the index or cache storage cannot be opened.
    pub fn from_config(config: &FlightboardConfig) -> Result<Self> {
        let index = Arc::new(AircraftIndex::open(&config.data_dir)?);
        let cache = Arc::new(RouteCache::open(
            &config.data_dir,
            config.route_cache_ttl(),
        )?);
        let budget = Arc::new(BudgetGuard::new(config.max_api_calls_per_session));

        if index.is_empty()? {
            warn!("Aircraft index is empty, identity will rely on callsign prefixes. Run `flightboard seed` to populate it");
        }

        let resolver = Self::new(index, cache, budget);
        Ok(match &config.airlabs_api_key {
            Some(key) => {
                info!(
                    "Remote route lookups enabled ({} calls per session)",
                    config.max_api_calls_per_session
                );
                let client = Arc::new(AirLabsClient::new(key.clone(), config.remote_timeout()));
                resolver
                    .with_remote(client.clone())
                    .with_airport_lookup(client)
            }
            None => {
                info!("No AirLabs key configured, remote route lookups disabled");
                resolver
            }
        })
    }

    pub fn with_remote(mut self, remote: Arc<dyn RouteLookup>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Resolve airport names for remotely found routes
    pub fn with_airport_lookup(mut self, airports: Arc<dyn AirportLookup>) -> Self {
        self.airports = Some(airports);
        self
    }

    pub fn with_identity_tiers(mut self, tiers: Vec<IdentityTier>) -> Self {
        self.identity_tiers = tiers;
        self
    }

    pub fn with_route_tiers(mut self, tiers: Vec<RouteTier>) -> Self {
        self.route_tiers = tiers;
        self
    }

    pub fn index(&self) -> &AircraftIndex {
        &self.index
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    pub fn budget(&self) -> &BudgetGuard {
        &self.budget
    }

    pub fn stats(&self) -> EnrichmentStats {
        EnrichmentStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            remote_found: self.counters.remote_found.load(Ordering::Relaxed),
            remote_not_found: self.counters.remote_not_found.load(Ordering::Relaxed),
            remote_failed: self.counters.remote_failed.load(Ordering::Relaxed),
            airports_found: self.counters.airports_found.load(Ordering::Relaxed),
            budget: self.budget.status(),
        }
    }

    /// Enrich one position
    pub fn enrich(&self, position: Position) -> EnrichedFlight {
        self.enrich_at(position, Utc::now())
    }

    /// Enrich one position, judging cache freshness as of `now`
    pub fn enrich_at(&self, position: Position, now: DateTime<Utc>) -> EnrichedFlight {
        let identity = self.resolve_identity(&position);
        let route = position
            .callsign
            .as_deref()
            .and_then(|callsign| self.resolve_route(callsign, now));

        debug!(
            "Enriched {} ({}): identity from {}, route {}",
            position.hex,
            position.callsign.as_deref().unwrap_or("-"),
            identity.source,
            route
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        EnrichedFlight {
            position,
            identity,
            route,
        }
    }

    /// Enrich a batch in parallel, keeping input order
    pub fn enrich_batch(&self, positions: Vec<Position>) -> Vec<EnrichedFlight> {
        let now = Utc::now();
        positions
            .into_par_iter()
            .map(|position| self.enrich_at(position, now))
            .collect()
    }

    /// Resolve the route for a callsign outside of a poll cycle
    pub fn resolve_route_for(&self, callsign: &str) -> Option<Route> {
        self.resolve_route(callsign, Utc::now())
    }

    fn resolve_identity(&self, position: &Position) -> AircraftIdentity {
        self.identity_tiers
            .iter()
            .find_map(|tier| match tier {
                IdentityTier::Index => match self.index.identity(&position.hex) {
                    Ok(identity) => identity,
                    Err(e) => {
                        error!("Aircraft index lookup for {} failed: {}", position.hex, e);
                        None
                    }
                },
                IdentityTier::CallsignPrefix => position
                    .callsign
                    .as_deref()
                    .and_then(|callsign| self.prefixes.resolve(callsign))
                    .map(AircraftIdentity::operator_only),
            })
            .unwrap_or_else(AircraftIdentity::unknown)
    }

    fn resolve_route(&self, callsign: &str, now: DateTime<Utc>) -> Option<Route> {
        let callsign = normalize_callsign(callsign);
        if callsign.is_empty() {
            return None;
        }

        self.route_tiers.iter().find_map(|tier| match tier {
            RouteTier::Cache => self.cached_route(&callsign, now),
            RouteTier::Remote => self.remote_route(&callsign, now),
        })
    }

    fn cached_route(&self, callsign: &str, now: DateTime<Utc>) -> Option<Route> {
        match self.cache.get_at(callsign, now) {
            Ok(Some(route)) => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                Some(route)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Route cache read for {} failed: {}", callsign, e);
                None
            }
        }
    }

    fn is_session_miss(&self, callsign: &str) -> bool {
        self.session_misses
            .lock()
            .map(|misses| misses.contains(callsign))
            .unwrap_or(false)
    }

    fn remember_miss(&self, callsign: &str) {
        if let Ok(mut misses) = self.session_misses.lock() {
            misses.insert(callsign.to_string());
        }
    }

    /// Claim the callsign for a remote call; false if another worker has it
    fn claim(&self, callsign: &str) -> bool {
        self.in_flight
            .lock()
            .map(|mut in_flight| in_flight.insert(callsign.to_string()))
            .unwrap_or(false)
    }

    fn release(&self, callsign: &str) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(callsign);
        }
    }

    fn remote_route(&self, callsign: &str, now: DateTime<Utc>) -> Option<Route> {
        let remote = self.remote.as_ref()?;
        if !remote.is_enabled() || self.is_session_miss(callsign) || !self.claim(callsign) {
            return None;
        }

        let route = self.call_remote(remote.as_ref(), callsign, now);
        self.release(callsign);
        route
    }

    fn call_remote(
        &self,
        remote: &dyn RouteLookup,
        callsign: &str,
        now: DateTime<Utc>,
    ) -> Option<Route> {
        if !self.budget.try_consume() {
            debug!("Remote budget exhausted, skipping lookup for {}", callsign);
            return None;
        }

        match remote.lookup(callsign) {
            Ok(RouteLookupOutcome::Found(found)) => {
                self.counters.remote_found.fetch_add(1, Ordering::Relaxed);
                let origin_name = found.origin.as_deref().and_then(|c| self.airport_name(c));
                let destination_name = found
                    .destination
                    .as_deref()
                    .and_then(|c| self.airport_name(c));
                let route = Route::new(found.origin, found.destination, now)
                    .with_names(origin_name, destination_name);
                if let Err(e) = self.cache.put(callsign, &route) {
                    error!("Route cache write for {} failed: {}", callsign, e);
                }
                Some(route)
            }
            Ok(RouteLookupOutcome::NotFound) => {
                self.counters.remote_not_found.fetch_add(1, Ordering::Relaxed);
                self.remember_miss(callsign);
                None
            }
            Err(e) => {
                self.counters.remote_failed.fetch_add(1, Ordering::Relaxed);
                self.budget.record_failure();
                if e == RemoteError::RateLimited {
                    self.budget.exhaust();
                }
                warn!("{} lookup for {} failed: {}", remote.name(), callsign, e);
                None
            }
        }
    }

    /// Name of the airport with `code`, from the airport table or, on a
    /// miss, the remote service (one budget unit)
    fn airport_name(&self, code: &str) -> Option<String> {
        let code = normalize_airport_code(code);
        if code.is_empty() {
            return None;
        }

        // Serialized: routes sharing an airport make at most one call for it
        let _guard = self
            .airport_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match self.cache.airport(&code) {
            Ok(Some(airport)) => return Some(airport.name),
            Ok(None) => {}
            Err(e) => {
                error!("Airport cache read for {} failed: {}", code, e);
                return None;
            }
        }

        let lookup = self.airports.as_ref()?;
        let known_miss = self
            .airport_misses
            .lock()
            .map(|misses| misses.contains(&code))
            .unwrap_or(false);
        if !lookup.airport_lookups_enabled() || known_miss {
            return None;
        }
        if !self.budget.try_consume() {
            debug!("Remote budget exhausted, skipping airport lookup for {}", code);
            return None;
        }

        match lookup.lookup_airport(&code) {
            Ok(Some(airport)) => {
                self.counters.airports_found.fetch_add(1, Ordering::Relaxed);
                let airport = AirportRecord { code, ..airport };
                if let Err(e) = self.cache.put_airport(&airport) {
                    error!("Airport cache write for {} failed: {}", airport.code, e);
                }
                Some(airport.name)
            }
            Ok(None) => {
                if let Ok(mut misses) = self.airport_misses.lock() {
                    misses.insert(code);
                }
                None
            }
            Err(e) => {
                self.budget.record_failure();
                if e == RemoteError::RateLimited {
                    self.budget.exhaust();
                }
                warn!("Airport lookup for {} failed: {}", code, e);
                None
            }
        }
    }
}
