//! Persistent route cache with a time-to-live
//!
//! An entry older than the TTL is reported as absent, the same as a callsign
//! that was never cached. Airport names resolved alongside routes are kept
//! in the same store without a TTL.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::database::{AirportRecord, FlightboardDatabase, RouteRecord};
use crate::flight::Route;

/// Default route TTL (24 hours)
pub const DEFAULT_ROUTE_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteCacheStats {
    pub total: u64,
    pub fresh: u64,
    pub airports: u64,
}

impl RouteCacheStats {
    pub fn expired(&self) -> u64 {
        self.total.saturating_sub(self.fresh)
    }
}

/// Route cache shared by all enrichment workers
///
/// Owns its own database connection; every access goes through the mutex.
pub struct RouteCache {
    db: Mutex<FlightboardDatabase>,
    ttl: Duration,
}

/// Normalize a callsign to the stored key form
pub fn normalize_callsign(callsign: &str) -> String {
    callsign.trim().to_uppercase()
}

/// Normalize an airport code to the stored key form
pub fn normalize_airport_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl RouteCache {
    pub fn new(db: FlightboardDatabase, ttl: std::time::Duration) -> Self {
        Self {
            db: Mutex::new(db),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    /// Open the cache stored in `data_dir`
    pub fn open(data_dir: &str, ttl: std::time::Duration) -> Result<Self> {
        Ok(Self::new(FlightboardDatabase::open_in_dir(data_dir)?, ttl))
    }

    pub fn open_in_memory(ttl: std::time::Duration) -> Result<Self> {
        Ok(Self::new(FlightboardDatabase::open_in_memory()?, ttl))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn db(&self) -> Result<MutexGuard<'_, FlightboardDatabase>> {
        self.db.lock().map_err(|_| anyhow!("Route cache lock poisoned"))
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Fresh route for `callsign`, if any
    pub fn get(&self, callsign: &str) -> Result<Option<Route>> {
        self.get_at(callsign, Utc::now())
    }

    /// Fresh route for `callsign` as seen at `now`
    pub fn get_at(&self, callsign: &str, now: DateTime<Utc>) -> Result<Option<Route>> {
        self.db()?
            .routes()
            .get_fresh(&normalize_callsign(callsign), self.cutoff(now))
    }

    /// Store `route` for `callsign`, replacing any previous entry
    pub fn put(&self, callsign: &str, route: &Route) -> Result<()> {
        self.db()?
            .routes()
            .upsert(&normalize_callsign(callsign), route)
    }

    /// Stored airport for `code`
    pub fn airport(&self, code: &str) -> Result<Option<AirportRecord>> {
        self.db()?.airports().get(&normalize_airport_code(code))
    }

    /// Store an airport under its normalized code
    pub fn put_airport(&self, airport: &AirportRecord) -> Result<()> {
        let airport = AirportRecord {
            code: normalize_airport_code(&airport.code),
            ..airport.clone()
        };
        self.db()?.airports().upsert(&airport)
    }

    /// Entries older than the TTL, oldest first
    pub fn expired(&self) -> Result<Vec<RouteRecord>> {
        self.expired_at(Utc::now())
    }

    pub fn expired_at(&self, now: DateTime<Utc>) -> Result<Vec<RouteRecord>> {
        self.db()?.routes().older_than(self.cutoff(now))
    }

    /// Delete entries older than the TTL
    pub fn prune_expired(&self) -> Result<usize> {
        self.prune_expired_at(Utc::now())
    }

    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self.db()?.routes().delete_older_than(self.cutoff(now))?;
        if removed > 0 {
            info!("Pruned {} expired routes", removed);
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<RouteCacheStats> {
        let now = Utc::now();
        let db = self.db()?;
        let routes = db.routes();
        Ok(RouteCacheStats {
            total: routes.count()?,
            fresh: routes.count_fresh(self.cutoff(now))?,
            airports: db.airports().count()?,
        })
    }
}
