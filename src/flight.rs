//! Flight record types
//!
//! Types shared by the sources, the poller and the enrichment chain:
//!
//! - [`RawPositionReport`]: what a data source hands back, still in the
//!   source's own units and with any field possibly missing
//! - [`Position`]: the normalized common record (feet, knots, degrees)
//! - [`AircraftIdentity`] and [`Route`]: enrichment results
//! - [`EnrichedFlight`] and [`FleetSnapshot`]: what the presentation layer reads
//!
//! Unknown values are `None`, never an empty string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder used when rendering a missing value
pub const UNKNOWN: &str = "unknown";

/// Altitude as reported by a source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Altitude {
    Feet(f64),
    Meters(f64),
}

impl Altitude {
    pub fn to_feet(self) -> f64 {
        match self {
            Altitude::Feet(ft) => ft,
            Altitude::Meters(m) => m * 3.28084,
        }
    }
}

/// Speed as reported by a source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Speed {
    Knots(f64),
    MetersPerSecond(f64),
}

impl Speed {
    pub fn to_knots(self) -> f64 {
        match self {
            Speed::Knots(kts) => kts,
            Speed::MetersPerSecond(ms) => ms * 1.94384,
        }
    }
}

/// Vertical rate as reported by a source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VerticalRate {
    FeetPerMinute(f64),
    MetersPerSecond(f64),
}

impl VerticalRate {
    pub fn to_feet_per_minute(self) -> f64 {
        match self {
            VerticalRate::FeetPerMinute(fpm) => fpm,
            VerticalRate::MetersPerSecond(ms) => ms * 196.85,
        }
    }
}

/// A single position report as produced by a data source
///
/// Immutable once created. The hex identifier is the only required field;
/// everything else is whatever the source payload carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPositionReport {
    /// ICAO 24-bit transponder address, as sent by the source
    pub hex: String,
    pub callsign: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<Altitude>,
    pub ground_speed: Option<Speed>,
    pub heading: Option<f64>,
    pub vertical_rate: Option<VerticalRate>,
    pub squawk: Option<String>,
    pub on_ground: bool,
    /// When the source observed the aircraft
    pub observed_at: DateTime<Utc>,
}

impl RawPositionReport {
    /// Create a report with only the identifier and observation time set
    pub fn new(hex: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            hex: hex.into(),
            callsign: None,
            latitude: None,
            longitude: None,
            altitude: None,
            ground_speed: None,
            heading: None,
            vertical_rate: None,
            squawk: None,
            on_ground: false,
            observed_at,
        }
    }

    pub fn with_callsign(mut self, callsign: impl Into<String>) -> Self {
        self.callsign = Some(callsign.into());
        self
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_altitude(mut self, altitude: Altitude) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_ground_speed(mut self, speed: Speed) -> Self {
        self.ground_speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }
}

/// Normalized position record
///
/// Produced by the poller from a [`RawPositionReport`]: hex lower-cased,
/// callsign trimmed and upper-cased, units converted to feet / knots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub hex: String,
    pub callsign: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Feet
    pub altitude: i32,
    /// Knots
    pub ground_speed: u32,
    /// Degrees, 0-359
    pub heading: u16,
    /// Feet per minute
    pub vertical_rate: i32,
    pub squawk: Option<String>,
    pub observed_at: DateTime<Utc>,
    /// Nautical miles from the reference point, 0.1 nm resolution; set when
    /// the batch was filtered to the display area
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_nm: Option<f64>,
}

/// Where an identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Aircraft index entry keyed by hex
    Index,
    /// Operator derived from the callsign's ICAO airline prefix
    CallsignPrefix,
    /// Nothing matched
    Unknown,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentitySource::Index => write!(f, "index"),
            IdentitySource::CallsignPrefix => write!(f, "callsign-prefix"),
            IdentitySource::Unknown => write!(f, "unknown"),
        }
    }
}

/// Static identity of an airframe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftIdentity {
    /// ICAO type designator, e.g. `B738`
    pub type_code: Option<String>,
    pub registration: Option<String>,
    pub operator: Option<String>,
    pub source: IdentitySource,
}

impl AircraftIdentity {
    pub fn unknown() -> Self {
        Self {
            type_code: None,
            registration: None,
            operator: None,
            source: IdentitySource::Unknown,
        }
    }

    /// Identity with only an operator name, as derived from a callsign prefix
    pub fn operator_only(operator: impl Into<String>) -> Self {
        Self {
            type_code: None,
            registration: None,
            operator: Some(operator.into()),
            source: IdentitySource::CallsignPrefix,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.source == IdentitySource::Unknown
    }
}

/// Origin and destination of a callsign
///
/// At least one of the two airport codes is present; a lookup that finds
/// neither is a not-found, not a route. Airport names are filled in when
/// they could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: Option<String>,
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,
    /// Resolution time, truncated to whole seconds so that a cached copy
    /// compares equal to the value it was created from
    pub resolved_at: DateTime<Utc>,
}

impl Route {
    pub fn new(
        origin: Option<String>,
        destination: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        let resolved_at =
            DateTime::from_timestamp(resolved_at.timestamp(), 0).unwrap_or(resolved_at);
        Self {
            origin,
            destination,
            origin_name: None,
            destination_name: None,
            resolved_at,
        }
    }

    pub fn with_names(
        mut self,
        origin_name: Option<String>,
        destination_name: Option<String>,
    ) -> Self {
        self.origin_name = origin_name;
        self.destination_name = destination_name;
        self
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.origin.as_deref().unwrap_or(UNKNOWN),
            self.destination.as_deref().unwrap_or(UNKNOWN)
        )
    }
}

/// A position report joined with identity and route
///
/// Built fresh every poll cycle and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFlight {
    pub position: Position,
    pub identity: AircraftIdentity,
    pub route: Option<Route>,
}

impl EnrichedFlight {
    pub fn hex(&self) -> &str {
        &self.position.hex
    }

    pub fn callsign(&self) -> Option<&str> {
        self.position.callsign.as_deref()
    }
}

/// Complete set of enriched flights from one successful poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    /// Name of the source the snapshot was polled from
    pub source: String,
    /// Poll cycle number, starting at 1 for the first published snapshot
    pub cycle: u64,
    pub polled_at: Option<DateTime<Utc>>,
    pub flights: Vec<EnrichedFlight>,
}

impl FleetSnapshot {
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert!((Altitude::Meters(1000.0).to_feet() - 3280.84).abs() < 0.01);
        assert_eq!(Altitude::Feet(3500.0).to_feet(), 3500.0);
        assert!((Speed::MetersPerSecond(100.0).to_knots() - 194.384).abs() < 0.001);
        assert!(
            (VerticalRate::MetersPerSecond(5.0).to_feet_per_minute() - 984.25).abs() < 0.001
        );
    }

    #[test]
    fn test_route_truncates_to_seconds() {
        let ts = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let route = Route::new(Some("STN".into()), Some("DUB".into()), ts);
        assert_eq!(route.resolved_at.timestamp(), 1_700_000_000);
        assert_eq!(route.resolved_at.timestamp_subsec_nanos(), 0);
        assert_eq!(route.to_string(), "STN -> DUB");
    }

    #[test]
    fn test_unknown_identity() {
        let identity = AircraftIdentity::unknown();
        assert!(identity.is_unknown());
        assert_eq!(identity.operator, None);

        let identity = AircraftIdentity::operator_only("RYANAIR");
        assert_eq!(identity.source, IdentitySource::CallsignPrefix);
        assert_eq!(identity.type_code, None);
    }
}
