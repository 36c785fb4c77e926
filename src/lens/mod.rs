//! Lens module
//!
//! High-level "lens" structs that combine the library operations with
//! output formatting, so the CLI commands stay thin.
//!
//! | Lens | Wraps | Operations |
//! |------|-------|------------|
//! | `AircraftLens` | `AircraftIndex` | lookup by hex, index statistics, seed |
//! | `RouteLens` | `EnrichmentResolver` | cached route, resolve, prune, cache/budget statistics |
//! | `FleetLens` | `FleetSnapshot` | snapshot rendering |
//!
//! All lenses render through [`utils::OutputFormat`].
//!
//! ```rust,ignore
//! use flightboard::enrich::AircraftIndex;
//! use flightboard::lens::aircraft::AircraftLens;
//! use flightboard::lens::utils::OutputFormat;
//!
//! let index = AircraftIndex::open("~/.flightboard")?;
//! let lens = AircraftLens::new(&index);
//! if let Some(result) = lens.lookup("4ca87d")? {
//!     println!("{}", lens.format_lookup(&result, OutputFormat::Table)?);
//! }
//! ```

pub mod aircraft;
pub mod fleet;
pub mod route;
pub mod utils;
