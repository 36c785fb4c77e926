#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Flightboard - live overhead-aircraft feed
//!
//! Flightboard polls a position source (a local ADS-B decoder, the OpenSky
//! Network, the Flightradar24 API or built-in mock data), normalizes the
//! reports and enriches every aircraft with its identity (type,
//! registration, operator) and route (origin, destination). The result is
//! published once per poll cycle as a complete [`FleetSnapshot`] for a
//! display to render.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Sources, poller, enrichment, storage | `rusqlite`, `ureq`, `tokio` |
//! | `display` | Lenses and table formatting | `tabled` |
//! | `cli` | The `flightboard` binary | All above + `clap`, `indicatif` |
//!
//! ```toml
//! # Library only
//! flightboard = { version = "0.3", default-features = false }
//!
//! # Default (CLI binary)
//! flightboard = "0.3"
//! ```
//!
//! # Architecture
//!
//! - **[`sources`]**: the [`PositionSource`] capability and its variants
//! - **[`poller`]**: the poll state machine, normalization, the distance
//!   filter and [`Scheduler`]
//! - **[`enrich`]**: the tiered enrichment chain
//!   - `index`: hex -> identity store, seeded from a bulk CSV import
//!   - `prefix`: ICAO airline prefix -> operator name
//!   - `cache`: callsign -> route store with a TTL, plus airport names
//!   - `budget`: per-session ceiling on remote lookups
//!   - `remote`: metered route and airport lookups (AirLabs)
//! - **[`database`]**: SQLite connection, schema and repositories
//! - **[`lens`]**: diagnostics and output formatting (requires `display`)
//! - **[`config`]**: configuration loading
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flightboard::*;
//!
//! let config = FlightboardConfig::new(&None)?;
//! let source = DataSource::from_config(&config)?;
//! let resolver = Arc::new(EnrichmentResolver::from_config(&config)?);
//!
//! let scheduler = Scheduler::new(source, resolver).with_area(config.reference_area());
//! let mut snapshots = scheduler.subscribe();
//! let handle = scheduler.start();
//!
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow_and_update().clone();
//!     println!("cycle {}: {} flights", snapshot.cycle, snapshot.len());
//! }
//! ```

pub mod config;
pub mod database;
pub mod enrich;
pub mod flight;
pub mod poller;
pub mod sources;

#[cfg(feature = "display")]
pub mod lens;

pub use crate::config::FlightboardConfig;

pub use crate::database::FlightboardDatabase;

pub use crate::enrich::{
    AircraftIndex, AirportLookup, BudgetGuard, CallsignPrefixResolver, EnrichmentResolver,
    EnrichmentStats, RouteCache, RouteLookup,
};

pub use crate::flight::{
    AircraftIdentity, EnrichedFlight, FleetSnapshot, IdentitySource, Position, RawPositionReport,
    Route,
};

pub use crate::poller::{normalize, within_area, PollerState, Scheduler};

pub use crate::sources::{DataSource, PositionSource, ReferenceArea, SourceError, SourceKind};

#[cfg(feature = "display")]
pub use crate::lens::utils::OutputFormat;
