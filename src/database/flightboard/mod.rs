//! Flightboard database storage
//!
//! The persistent SQLite database shared across sessions. It stores:
//! - the aircraft identity index (hex -> type, registration, operator)
//! - the route cache (callsign -> origin/destination with resolution time)
//! - airport names (code -> name, city, country)
//!
//! Nothing else is persisted.

mod aircraft;
mod airports;
mod routes;

pub use aircraft::{AircraftCounts, AircraftIndexMeta, AircraftRecord, AircraftRepository};
pub use airports::{AirportRecord, AirportRepository};
pub use routes::{RouteRecord, RouteRepository};

use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus};
use anyhow::Result;
use tracing::info;

/// File name of the database inside the data directory
pub const DATABASE_FILE_NAME: &str = "flightboard-data.sqlite3";

/// Main flightboard database (SQLite backend)
///
/// Handles schema initialization and drift detection, and hands out
/// repositories borrowing its connection.
pub struct FlightboardDatabase {
    db: DatabaseConn,
}

impl FlightboardDatabase {
    /// Open the database at the specified path
    ///
    /// A missing database is created and initialized. An outdated, newer or
    /// corrupted schema is reset, which discards the index and the cache.
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {}
            SchemaStatus::NotInitialized => {
                info!("Initializing flightboard database schema at {}", path);
                schema.initialize()?;
            }
            SchemaStatus::NeedsMigration { from, to } => {
                info!(
                    "Flightboard database needs migration from v{} to v{}, resetting",
                    from, to
                );
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                info!(
                    "Flightboard database schema incompatible (db: v{}, required: v{}), resetting",
                    database_version, required_version
                );
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Corrupted => {
                info!("Flightboard database schema corrupted, resetting");
                schema.reset()?;
                schema.initialize()?;
            }
        }

        Ok(Self { db })
    }

    /// Open the database from a data directory
    ///
    /// Uses the standard file path `{data_dir}/flightboard-data.sqlite3`.
    pub fn open_in_dir(data_dir: &str) -> Result<Self> {
        crate::database::ensure_data_dir(data_dir)?;
        let path = format!("{}/{}", data_dir.trim_end_matches('/'), DATABASE_FILE_NAME);
        Self::open(&path)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn).initialize()?;
        Ok(Self { db })
    }

    pub fn aircraft(&self) -> AircraftRepository<'_> {
        AircraftRepository::new(&self.db.conn)
    }

    pub fn routes(&self) -> RouteRepository<'_> {
        RouteRepository::new(&self.db.conn)
    }

    pub fn airports(&self) -> AirportRepository<'_> {
        AirportRepository::new(&self.db.conn)
    }

    /// Get the underlying database connection
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        SchemaManager::new(&self.db.conn).get_meta(key)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        SchemaManager::new(&self.db.conn).set_meta(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::Route;
    use chrono::{Duration, Utc};

    #[test]
    fn test_open_in_memory() {
        let db = FlightboardDatabase::open_in_memory().unwrap();
        assert!(db.aircraft().is_empty().unwrap());
        assert_eq!(db.routes().count().unwrap(), 0);
        assert_eq!(db.airports().count().unwrap(), 0);
    }

    #[test]
    fn test_meta_operations() {
        let db = FlightboardDatabase::open_in_memory().unwrap();
        db.set_meta("test_key", "test_value").unwrap();
        assert_eq!(
            db.get_meta("test_key").unwrap(),
            Some("test_value".to_string())
        );
    }

    #[test]
    fn test_reopen_keeps_routes() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        let route = Route::new(Some("STN".into()), Some("DUB".into()), Utc::now());
        {
            let db = FlightboardDatabase::open_in_dir(data_dir).unwrap();
            db.routes().upsert("RYR4421", &route).unwrap();
        }

        let db = FlightboardDatabase::open_in_dir(data_dir).unwrap();
        let cutoff = Utc::now() - Duration::hours(1);
        assert_eq!(db.routes().get_fresh("RYR4421", cutoff).unwrap(), Some(route));
    }
}
