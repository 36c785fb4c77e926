//! Local ADS-B decoder (readsb, dump1090, tar1090)
//!
//! Decoders serve `aircraft.json` over HTTP. Field names differ between
//! decoder families, so each value is read from the first key that carries it.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{http_agent, number, text, transport_error, PositionSource, SourceError};
use crate::flight::{Altitude, RawPositionReport, Speed, VerticalRate};

pub const DEFAULT_DECODER_URL: &str = "http://localhost:8080/data/aircraft.json";

/// Reports not heard from for longer than this are skipped
const MAX_SEEN_SECS: f64 = 60.0;

pub struct DecoderSource {
    agent: ureq::Agent,
    url: String,
}

impl DecoderSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Convert a decoder payload to reports
///
/// Accepts `{"now": .., "aircraft": [..]}` or a bare array.
pub fn parse_aircraft_json(payload: &Value) -> Result<Vec<RawPositionReport>, SourceError> {
    let aircraft = match payload {
        Value::Array(list) => list,
        Value::Object(map) => match map.get("aircraft") {
            Some(Value::Array(list)) => list,
            _ => return Err(SourceError::unavailable("payload has no aircraft list")),
        },
        _ => return Err(SourceError::unavailable("unexpected payload shape")),
    };

    let now = number(payload, &["now"])
        .and_then(|ts| DateTime::from_timestamp_millis((ts * 1000.0) as i64))
        .unwrap_or_else(Utc::now);

    let reports = aircraft
        .iter()
        .filter_map(|entry| {
            let hex = text(entry, &["hex"])?;
            let seen = number(entry, &["seen_pos", "seen"]).unwrap_or(0.0);
            if seen > MAX_SEEN_SECS {
                return None;
            }

            let ground_flag = entry
                .get("alt_baro")
                .and_then(Value::as_str)
                .is_some_and(|alt| alt.eq_ignore_ascii_case("ground"));
            let on_ground = ground_flag
                || ["ground", "on_ground"]
                    .iter()
                    .any(|key| entry.get(key).and_then(Value::as_bool).unwrap_or(false));

            let observed_at = now - ChronoDuration::milliseconds((seen * 1000.0) as i64);

            Some(RawPositionReport {
                hex,
                callsign: text(entry, &["flight", "call"]),
                latitude: number(entry, &["lat"]),
                longitude: number(entry, &["lon"]),
                altitude: number(entry, &["alt_baro", "altitude", "alt"]).map(Altitude::Feet),
                ground_speed: number(entry, &["gs", "speed", "spd"]).map(Speed::Knots),
                heading: number(entry, &["track", "heading", "trk"]),
                vertical_rate: number(entry, &["baro_rate", "vert_rate", "vspeed"])
                    .map(VerticalRate::FeetPerMinute),
                squawk: text(entry, &["squawk"]),
                on_ground,
                observed_at,
            })
        })
        .collect();

    Ok(reports)
}

impl PositionSource for DecoderSource {
    fn name(&self) -> &str {
        "decoder"
    }

    fn fetch(&self) -> Result<Vec<RawPositionReport>, SourceError> {
        let mut resp = self.agent.get(&self.url).call().map_err(transport_error)?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(SourceError::unavailable(format!(
                "decoder at {} returned HTTP {}",
                self.url, status
            )));
        }

        let payload: Value = resp
            .body_mut()
            .read_json()
            .map_err(|e| SourceError::unavailable(format!("malformed decoder payload: {}", e)))?;

        let reports = parse_aircraft_json(&payload)?;
        debug!("decoder: {} reports from {}", reports.len(), self.url);
        Ok(reports)
    }

    fn recommended_poll_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn is_rate_limited(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{http_response, serve_once};
    use serde_json::json;

    #[test]
    fn test_parse_readsb_payload() {
        let payload = json!({
            "now": 1700000000.0,
            "messages": 12345,
            "aircraft": [
                {"hex": "4ca87d", "flight": "RYR4421 ", "alt_baro": 24500, "gs": 412.3,
                 "track": 310.2, "baro_rate": 1216, "squawk": "7402",
                 "lat": 51.55, "lon": -0.08, "seen": 0.4},
                {"hex": "400f01", "alt_baro": "ground", "gs": 5.0,
                 "lat": 51.47, "lon": -0.45, "seen": 1.0},
                {"hex": "406b2c", "lat": 51.48, "lon": -0.2, "seen": 120.0},
                {"flight": "NOHEX1", "lat": 51.0, "lon": 0.0}
            ]
        });

        let reports = parse_aircraft_json(&payload).unwrap();
        assert_eq!(reports.len(), 2);

        let ryr = &reports[0];
        assert_eq!(ryr.hex, "4ca87d");
        assert_eq!(ryr.callsign.as_deref(), Some("RYR4421"));
        assert_eq!(ryr.altitude, Some(Altitude::Feet(24500.0)));
        assert_eq!(ryr.ground_speed, Some(Speed::Knots(412.3)));
        assert_eq!(ryr.vertical_rate, Some(VerticalRate::FeetPerMinute(1216.0)));
        assert!(!ryr.on_ground);
        assert_eq!(
            ryr.observed_at,
            DateTime::from_timestamp_millis(1_699_999_999_600).unwrap()
        );

        let ground = &reports[1];
        assert!(ground.on_ground);
        assert_eq!(ground.altitude, None);
    }

    #[test]
    fn test_parse_legacy_field_names() {
        let payload = json!([
            {"hex": "abc123", "call": "EZY6012", "altitude": 31000, "speed": 445,
             "heading": 350, "vert_rate": 0, "lat": 51.48, "lon": -0.2}
        ]);

        let reports = parse_aircraft_json(&payload).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].callsign.as_deref(), Some("EZY6012"));
        assert_eq!(reports[0].altitude, Some(Altitude::Feet(31000.0)));
        assert_eq!(reports[0].heading, Some(350.0));
    }

    #[test]
    fn test_parse_rejects_unexpected_shape() {
        assert!(parse_aircraft_json(&json!({"planes": []})).is_err());
        assert!(parse_aircraft_json(&json!("nope")).is_err());
        assert!(parse_aircraft_json(&json!({"aircraft": []})).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_from_local_endpoint() {
        let body = r#"{"now": 1700000000, "aircraft": [{"hex": "4ca87d", "lat": 51.5, "lon": -0.1}]}"#;
        let url = serve_once(http_response("200 OK", &[], body));
        let source = DecoderSource::new(format!("{}/data/aircraft.json", url), Duration::from_secs(5));

        let reports = source.fetch().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].hex, "4ca87d");
    }

    #[test]
    fn test_fetch_malformed_payload_is_unavailable() {
        let url = serve_once(http_response("200 OK", &[], "<html>not json</html>"));
        let source = DecoderSource::new(url, Duration::from_secs(5));
        assert!(matches!(
            source.fetch(),
            Err(SourceError::Unavailable { credit_consumed: false, .. })
        ));
    }

    #[test]
    fn test_fetch_unreachable_is_unavailable() {
        let source = DecoderSource::new("http://127.0.0.1:9/data/aircraft.json", Duration::from_secs(1));
        assert!(matches!(source.fetch(), Err(SourceError::Unavailable { .. })));
    }
}
