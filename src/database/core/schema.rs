//! Database schema management
//!
//! All tables live in one SQLite file so the aircraft index and the route
//! cache can share a data directory, while each keeps its own connection.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 2;

/// Schema definitions for all tables in the shared database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// Meta table (schema version and global key/value metadata)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS flightboard_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// Aircraft identity index, keyed by lower-case hex
    ///
    /// Unknown fields are stored as NULL.
    pub const AIRCRAFT_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS aircraft (
            hex TEXT PRIMARY KEY,
            registration TEXT,
            type_code TEXT,
            model TEXT,
            operator TEXT,
            operator_icao TEXT,
            owner TEXT
        );
    "#;

    /// Metadata about the last index seed
    pub const AIRCRAFT_META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS aircraft_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            source TEXT NOT NULL,
            seeded_at INTEGER NOT NULL,
            entry_count INTEGER NOT NULL DEFAULT 0
        );
    "#;

    pub const AIRCRAFT_INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_aircraft_registration ON aircraft(registration)",
        "CREATE INDEX IF NOT EXISTS idx_aircraft_type_code ON aircraft(type_code)",
    ];

    /// Route cache, keyed by upper-case callsign
    pub const ROUTES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS routes (
            callsign TEXT PRIMARY KEY,
            origin TEXT,
            destination TEXT,
            origin_name TEXT,
            destination_name TEXT,
            resolved_at INTEGER NOT NULL
        );
    "#;

    /// `resolved_at` index backs the "older than TTL" queries used for pruning
    pub const ROUTES_INDEXES: &'static [&'static str] =
        &["CREATE INDEX IF NOT EXISTS idx_routes_resolved_at ON routes(resolved_at)"];

    /// Airport names, keyed by the upper-case code they were looked up with
    ///
    /// Airports do not move, so entries never expire.
    pub const AIRPORTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS airports (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            iata TEXT,
            icao TEXT,
            city TEXT,
            country TEXT,
            latitude REAL,
            longitude REAL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    const REQUIRED_TABLES: &'static [&'static str] = &[
        "flightboard_meta",
        "aircraft",
        "aircraft_meta",
        "routes",
        "airports",
    ];
}

/// Schema manager for the shared database
///
/// Handles schema initialization, version checking, and resets.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Creates all tables and indexes if they don't exist, and records the
    /// schema version. Safe to call on an already initialized database.
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create meta table: {}", e))?;

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;

        self.conn
            .execute(SchemaDefinitions::AIRCRAFT_TABLE, [])
            .map_err(|e| anyhow!("Failed to create aircraft table: {}", e))?;

        self.conn
            .execute(SchemaDefinitions::AIRCRAFT_META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create aircraft_meta table: {}", e))?;

        for index_sql in SchemaDefinitions::AIRCRAFT_INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create aircraft index: {}", e))?;
        }

        self.conn
            .execute(SchemaDefinitions::ROUTES_TABLE, [])
            .map_err(|e| anyhow!("Failed to create routes table: {}", e))?;

        for index_sql in SchemaDefinitions::ROUTES_INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create routes index: {}", e))?;
        }

        self.conn
            .execute(SchemaDefinitions::AIRPORTS_TABLE, [])
            .map_err(|e| anyhow!("Failed to create airports table: {}", e))?;

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let meta_exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='flightboard_meta'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to inspect schema: {}", e))?;

        if meta_exists == 0 {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current_version = self.get_schema_version()?;

        if current_version == SCHEMA_VERSION {
            if self.verify_integrity()? {
                Ok(SchemaStatus::Current)
            } else {
                Ok(SchemaStatus::Corrupted)
            }
        } else if current_version < SCHEMA_VERSION {
            Ok(SchemaStatus::NeedsMigration {
                from: current_version,
                to: SCHEMA_VERSION,
            })
        } else {
            Ok(SchemaStatus::Incompatible {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    fn get_schema_version(&self) -> Result<u32> {
        let version = self.get_meta("schema_version")?.unwrap_or_else(|| "0".into());
        version
            .parse()
            .map_err(|e| anyhow!("Invalid schema version: {}", e))
    }

    fn verify_integrity(&self) -> Result<bool> {
        for table in SchemaDefinitions::REQUIRED_TABLES {
            let exists: i32 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .map_err(|e| anyhow!("Failed to inspect table {}: {}", table, e))?;

            if exists == 0 {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO flightboard_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM flightboard_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }

    /// Drop all tables
    pub fn reset(&self) -> Result<()> {
        for table in [
            "airports",
            "routes",
            "aircraft_meta",
            "aircraft",
            "flightboard_meta",
        ] {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", table), [])
                .map_err(|e| anyhow!("Failed to drop {}: {}", table, e))?;
        }
        Ok(())
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Fresh database
    NotInitialized,

    /// Schema is current and valid
    Current,

    /// Schema needs migration from an older version
    NeedsMigration { from: u32, to: u32 },

    /// Database is from a newer version
    Incompatible {
        database_version: u32,
        required_version: u32,
    },

    /// Required tables are missing
    Corrupted,
}
