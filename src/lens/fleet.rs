//! Fleet lens
//!
//! Flattens a [`FleetSnapshot`] into display rows for the `run` command.

use anyhow::{anyhow, Result};
use serde::Serialize;
use tabled::Tabled;

use super::utils::{or_unknown, render_rows, truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};
use crate::flight::{EnrichedFlight, FleetSnapshot};

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct FlightRow {
    pub hex: String,
    pub callsign: String,
    #[tabled(rename = "type")]
    pub type_code: String,
    pub registration: String,
    pub operator: String,
    pub origin: String,
    pub destination: String,
    #[tabled(rename = "alt_ft")]
    pub altitude: i32,
    #[tabled(rename = "gs_kt")]
    pub ground_speed: u32,
    #[tabled(rename = "hdg")]
    pub heading: u16,
    #[tabled(rename = "dist_nm")]
    pub distance: String,
}

impl From<&EnrichedFlight> for FlightRow {
    fn from(flight: &EnrichedFlight) -> Self {
        let (origin, destination) = match &flight.route {
            Some(route) => (route.origin.as_deref(), route.destination.as_deref()),
            None => (None, None),
        };
        Self {
            hex: flight.hex().to_string(),
            callsign: or_unknown(flight.callsign()),
            type_code: or_unknown(flight.identity.type_code.as_deref()),
            registration: or_unknown(flight.identity.registration.as_deref()),
            operator: truncate_name(
                &or_unknown(flight.identity.operator.as_deref()),
                DEFAULT_NAME_MAX_LEN,
            ),
            origin: or_unknown(origin),
            destination: or_unknown(destination),
            altitude: flight.position.altitude,
            ground_speed: flight.position.ground_speed,
            heading: flight.position.heading,
            distance: flight
                .position
                .distance_nm
                .map(|d| format!("{:.1}", d))
                .unwrap_or_else(|| or_unknown(None)),
        }
    }
}

#[derive(Debug, Default)]
pub struct FleetLens;

impl FleetLens {
    pub fn new() -> Self {
        Self
    }

    pub fn rows(&self, snapshot: &FleetSnapshot) -> Vec<FlightRow> {
        snapshot.flights.iter().map(FlightRow::from).collect()
    }

    /// Render a snapshot
    ///
    /// JSON formats emit the full snapshot (positions, identities, routes);
    /// `json-line` emits one flight per line. Table formats get a header
    /// line with the cycle number.
    pub fn format_snapshot(&self, snapshot: &FleetSnapshot, format: OutputFormat) -> Result<String> {
        let json_err = |e: serde_json::Error| anyhow!("Failed to serialize to JSON: {}", e);

        match format {
            OutputFormat::Json => serde_json::to_string(snapshot).map_err(json_err),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(snapshot).map_err(json_err),
            OutputFormat::JsonLine => Ok(snapshot
                .flights
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>()
                .map_err(json_err)?
                .join("\n")),
            OutputFormat::Psv => render_rows(&self.rows(snapshot), format),
            OutputFormat::Table | OutputFormat::Markdown => {
                let polled = snapshot
                    .polled_at
                    .map(|t| t.format("%H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                Ok(format!(
                    "{} cycle {} at {}: {} flights\n{}",
                    snapshot.source,
                    snapshot.cycle,
                    polled,
                    snapshot.len(),
                    render_rows(&self.rows(snapshot), format)?
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::tests::position;
    use crate::flight::{AircraftIdentity, Position, Route};
    use chrono::Utc;

    fn snapshot() -> FleetSnapshot {
        FleetSnapshot {
            source: "mock".into(),
            cycle: 3,
            polled_at: Some(Utc::now()),
            flights: vec![
                EnrichedFlight {
                    position: Position {
                        distance_nm: Some(3.3),
                        ..position("4ca87d", Some("RYR4421"))
                    },
                    identity: AircraftIdentity::operator_only("RYANAIR"),
                    route: Some(Route::new(Some("STN".into()), Some("DUB".into()), Utc::now())),
                },
                EnrichedFlight {
                    position: position("abc123", None),
                    identity: AircraftIdentity::unknown(),
                    route: None,
                },
            ],
        }
    }

    #[test]
    fn test_rows() {
        let rows = FleetLens::new().rows(&snapshot());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].operator, "RYANAIR");
        assert_eq!(rows[0].origin, "STN");
        assert_eq!(rows[0].type_code, "unknown");
        assert_eq!(rows[1].callsign, "unknown");
        assert_eq!(rows[1].destination, "unknown");
        assert_eq!(rows[0].distance, "3.3");
        assert_eq!(rows[1].distance, "unknown");
    }

    #[test]
    fn test_format_snapshot() {
        let lens = FleetLens::new();
        let snapshot = snapshot();

        let table = lens.format_snapshot(&snapshot, OutputFormat::Table).unwrap();
        assert!(table.starts_with("mock cycle 3 at "));
        assert!(table.contains("RYR4421"));

        let lines = lens.format_snapshot(&snapshot, OutputFormat::JsonLine).unwrap();
        assert_eq!(lines.lines().count(), 2);

        let json = lens.format_snapshot(&snapshot, OutputFormat::Json).unwrap();
        let parsed: FleetSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_empty_snapshot() {
        let empty = FleetSnapshot::default();
        let out = FleetLens::new().format_snapshot(&empty, OutputFormat::Psv).unwrap();
        assert_eq!(out.lines().count(), 1);
    }
}
