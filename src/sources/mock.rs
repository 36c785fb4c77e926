//! Fixed test data around London
//!
//! Deterministic and offline: the same eight flights on every fetch, with
//! only the observation time moving. Hex addresses are upper case, as some
//! decoders send them.

use chrono::Utc;
use std::time::Duration;

use super::{PositionSource, SourceError};
use crate::flight::{Altitude, RawPositionReport, Speed, VerticalRate};

struct MockFlight {
    hex: &'static str,
    callsign: &'static str,
    latitude: f64,
    longitude: f64,
    altitude_ft: f64,
    ground_speed_kt: f64,
    heading: f64,
    vertical_rate_fpm: f64,
    squawk: &'static str,
}

#[rustfmt::skip]
const MOCK_FLIGHTS: &[MockFlight] = &[
    MockFlight { hex: "4007F6", callsign: "BA117",   latitude: 51.52, longitude: -0.15, altitude_ft: 38000.0, ground_speed_kt: 487.0, heading: 285.0, vertical_rate_fpm: -200.0,  squawk: "4521" },
    MockFlight { hex: "4CA87D", callsign: "RYR4421", latitude: 51.55, longitude: -0.08, altitude_ft: 24500.0, ground_speed_kt: 412.0, heading: 310.0, vertical_rate_fpm: 1200.0,  squawk: "7402" },
    MockFlight { hex: "406B2C", callsign: "EZY6012", latitude: 51.48, longitude: -0.20, altitude_ft: 31000.0, ground_speed_kt: 445.0, heading: 350.0, vertical_rate_fpm: 0.0,     squawk: "0521" },
    MockFlight { hex: "4076B3", callsign: "VIR401",  latitude: 51.60, longitude: -0.05, altitude_ft: 36000.0, ground_speed_kt: 502.0, heading: 270.0, vertical_rate_fpm: 100.0,   squawk: "2204" },
    MockFlight { hex: "3C6589", callsign: "DLH902",  latitude: 51.45, longitude: -0.22, altitude_ft: 18500.0, ground_speed_kt: 320.0, heading: 245.0, vertical_rate_fpm: -800.0,  squawk: "1000" },
    MockFlight { hex: "484B2E", callsign: "KLM642",  latitude: 51.53, longitude: -0.10, altitude_ft: 12000.0, ground_speed_kt: 280.0, heading: 230.0, vertical_rate_fpm: -1500.0, squawk: "7620" },
    MockFlight { hex: "39BD24", callsign: "AFR1234", latitude: 51.58, longitude: -0.18, altitude_ft: 35000.0, ground_speed_kt: 460.0, heading: 330.0, vertical_rate_fpm: 0.0,     squawk: "1234" },
    MockFlight { hex: "896180", callsign: "UAE32",   latitude: 51.50, longitude: -0.12, altitude_ft: 8500.0,  ground_speed_kt: 210.0, heading: 260.0, vertical_rate_fpm: -2000.0, squawk: "6101" },
];

#[derive(Debug, Default)]
pub struct MockSource;

impl MockSource {
    pub fn new() -> Self {
        Self
    }
}

impl PositionSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self) -> Result<Vec<RawPositionReport>, SourceError> {
        let now = Utc::now();
        Ok(MOCK_FLIGHTS
            .iter()
            .map(|f| RawPositionReport {
                hex: f.hex.to_string(),
                callsign: Some(f.callsign.to_string()),
                latitude: Some(f.latitude),
                longitude: Some(f.longitude),
                altitude: Some(Altitude::Feet(f.altitude_ft)),
                ground_speed: Some(Speed::Knots(f.ground_speed_kt)),
                heading: Some(f.heading),
                vertical_rate: Some(VerticalRate::FeetPerMinute(f.vertical_rate_fpm)),
                squawk: Some(f.squawk.to_string()),
                on_ground: false,
                observed_at: now,
            })
            .collect())
    }

    fn recommended_poll_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn is_rate_limited(&self) -> bool {
        false
    }

    fn honors_radius(&self) -> bool {
        false
    }
}
