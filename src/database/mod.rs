//! Database module
//!
//! All persistent state lives in one SQLite file:
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # Schema definitions and management
//! │
//! └── flightboard/    # Persistent storage
//!     ├── aircraft    # hex -> identity index
//!     ├── airports    # code -> airport name
//!     └── routes      # callsign -> route cache
//! ```
//!
//! The repositories here are plain borrowing views over a connection. The
//! thread-safe stores used by the enrichment chain (`AircraftIndex`,
//! `RouteCache`) each own a [`FlightboardDatabase`] behind a mutex.
//!
//! ```rust,ignore
//! use flightboard::database::FlightboardDatabase;
//!
//! let db = FlightboardDatabase::open_in_dir("~/.flightboard")?;
//! if let Some(record) = db.aircraft().lookup("4ca87d")? {
//!     println!("{:?}", record.type_code);
//! }
//! ```

pub mod core;
pub mod flightboard;

pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};

pub use flightboard::{
    AircraftCounts, AircraftIndexMeta, AircraftRecord, AircraftRepository, AirportRecord,
    AirportRepository, FlightboardDatabase, RouteRecord, RouteRepository, DATABASE_FILE_NAME,
};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
