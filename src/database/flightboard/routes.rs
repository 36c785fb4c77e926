//! Route repository for the shared database
//!
//! Maps a callsign to its origin/destination with the time it was resolved.
//! Freshness is decided by the caller through a cutoff timestamp; this layer
//! only stores and filters.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::flight::Route;

const ROUTE_COLUMNS: &str = "origin, destination, origin_name, destination_name, resolved_at";

/// Build a route from the columns in [`ROUTE_COLUMNS`] order, starting at `offset`
fn route_from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Route> {
    let resolved_at: i64 = row.get(offset + 4)?;
    Ok(Route::new(
        row.get(offset)?,
        row.get(offset + 1)?,
        DateTime::from_timestamp(resolved_at, 0).unwrap_or_default(),
    )
    .with_names(row.get(offset + 2)?, row.get(offset + 3)?))
}

/// A cached route together with its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRecord {
    pub callsign: String,
    pub route: Route,
}

/// Repository for route cache operations
pub struct RouteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RouteRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM routes", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count routes: {}", e))
    }

    /// Number of routes resolved strictly after `cutoff`
    pub fn count_fresh(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM routes WHERE resolved_at > ?1",
                [cutoff.timestamp()],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to count fresh routes: {}", e))
    }

    /// Get the route for `callsign` if it was resolved strictly after `cutoff`
    pub fn get_fresh(&self, callsign: &str, cutoff: DateTime<Utc>) -> Result<Option<Route>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM routes WHERE callsign = ?1 AND resolved_at > ?2",
                    ROUTE_COLUMNS
                ),
                params![callsign, cutoff.timestamp()],
                |row| route_from_row(row, 0),
            )
            .optional()
            .map_err(|e| anyhow!("Failed to get route for {}: {}", callsign, e))
    }

    /// Insert or replace the route for `callsign`
    pub fn upsert(&self, callsign: &str, route: &Route) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO routes (callsign, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    ROUTE_COLUMNS
                ),
                params![
                    callsign,
                    route.origin,
                    route.destination,
                    route.origin_name,
                    route.destination_name,
                    route.resolved_at.timestamp()
                ],
            )
            .map_err(|e| anyhow!("Failed to store route for {}: {}", callsign, e))?;
        Ok(())
    }

    /// All entries resolved at or before `cutoff`, oldest first
    pub fn older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<RouteRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT callsign, {} FROM routes WHERE resolved_at <= ?1 ORDER BY resolved_at ASC",
            ROUTE_COLUMNS
        ))?;

        let rows = stmt
            .query_map([cutoff.timestamp()], |row| {
                Ok(RouteRecord {
                    callsign: row.get(0)?,
                    route: route_from_row(row, 1)?,
                })
            })
            .map_err(|e| anyhow!("Failed to query expired routes: {}", e))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Failed to read expired routes: {}", e))
    }

    /// Delete entries resolved at or before `cutoff`
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM routes WHERE resolved_at <= ?1",
                [cutoff.timestamp()],
            )
            .map_err(|e| anyhow!("Failed to prune routes: {}", e))
    }
}
