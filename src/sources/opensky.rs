//! OpenSky Network state vectors
//!
//! Anonymous access is limited to roughly 10 requests per minute; HTTP basic
//! credentials raise the limit. Values arrive in SI units.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    http_agent, retry_after_secs, transport_error, BoundingBox, PositionSource, SourceError,
};
use crate::flight::{Altitude, RawPositionReport, Speed, VerticalRate};

pub const OPENSKY_STATES_URL: &str = "https://opensky-network.org/api/states/all";

/// Minimum entries in a state vector
const STATE_VECTOR_LEN: usize = 17;

#[derive(Debug, Deserialize)]
struct StatesResponse {
    time: Option<i64>,
    states: Option<Vec<Vec<Value>>>,
}

pub struct OpenSkySource {
    agent: ureq::Agent,
    url: String,
    area: BoundingBox,
    authorization: Option<String>,
}

impl OpenSkySource {
    pub fn new(area: BoundingBox, credentials: Option<(String, String)>, timeout: Duration) -> Self {
        let authorization = credentials.map(|(user, pass)| {
            format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
        });
        info!(
            "OpenSky: {} mode",
            if authorization.is_some() {
                "authenticated"
            } else {
                "anonymous"
            }
        );

        Self {
            agent: http_agent(timeout),
            url: OPENSKY_STATES_URL.to_string(),
            area,
            authorization,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authorization.is_some()
    }
}

fn float(state: &[Value], idx: usize) -> Option<f64> {
    state.get(idx).and_then(Value::as_f64)
}

fn string(state: &[Value], idx: usize) -> Option<String> {
    state
        .get(idx)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Convert one positional state vector to a report
///
/// Layout: `[0]` icao24, `[1]` callsign, `[3]` time_position, `[4]`
/// last_contact, `[5]` lon, `[6]` lat, `[7]` baro altitude m, `[8]`
/// on_ground, `[9]` velocity m/s, `[10]` track, `[11]` vertical rate m/s,
/// `[13]` geometric altitude m, `[14]` squawk.
fn parse_state(state: &[Value], response_time: DateTime<Utc>) -> Option<RawPositionReport> {
    if state.len() < STATE_VECTOR_LEN {
        return None;
    }
    let hex = string(state, 0)?;

    let observed_at = state
        .get(3)
        .and_then(Value::as_i64)
        .or_else(|| state.get(4).and_then(Value::as_i64))
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or(response_time);

    Some(RawPositionReport {
        hex,
        callsign: string(state, 1),
        latitude: float(state, 6),
        longitude: float(state, 5),
        altitude: float(state, 7).or_else(|| float(state, 13)).map(Altitude::Meters),
        ground_speed: float(state, 9).map(Speed::MetersPerSecond),
        heading: float(state, 10),
        vertical_rate: float(state, 11).map(VerticalRate::MetersPerSecond),
        squawk: string(state, 14),
        on_ground: state.get(8).and_then(Value::as_bool).unwrap_or(false),
        observed_at,
    })
}

fn parse_states(body: StatesResponse) -> Vec<RawPositionReport> {
    let response_time = body
        .time
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    body.states
        .unwrap_or_default()
        .iter()
        .filter_map(|state| parse_state(state, response_time))
        .collect()
}

impl PositionSource for OpenSkySource {
    fn name(&self) -> &str {
        "opensky"
    }

    fn fetch(&self) -> Result<Vec<RawPositionReport>, SourceError> {
        let mut request = self
            .agent
            .get(&self.url)
            .query("lamin", format!("{:.4}", self.area.south))
            .query("lamax", format!("{:.4}", self.area.north))
            .query("lomin", format!("{:.4}", self.area.west))
            .query("lomax", format!("{:.4}", self.area.east));
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }

        let mut resp = request.call().map_err(transport_error)?;

        match resp.status().as_u16() {
            200 => {}
            429 => {
                let retry_after = retry_after_secs(
                    resp.headers()
                        .get("x-rate-limit-retry-after-seconds")
                        .or_else(|| resp.headers().get("retry-after")),
                );
                warn!("OpenSky rate limit hit, retry after {:?}", retry_after);
                return Err(SourceError::RateLimited { retry_after });
            }
            401 | 403 => {
                return Err(SourceError::unavailable(
                    "OpenSky rejected the configured credentials",
                ));
            }
            status => {
                return Err(SourceError::unavailable(format!("OpenSky returned HTTP {}", status)));
            }
        }

        let body: StatesResponse = resp
            .body_mut()
            .read_json()
            .map_err(|e| SourceError::unavailable(format!("malformed OpenSky payload: {}", e)))?;

        let reports = parse_states(body);
        debug!("opensky: {} state vectors", reports.len());
        Ok(reports)
    }

    fn recommended_poll_interval(&self) -> Duration {
        if self.is_authenticated() {
            Duration::from_secs(5)
        } else {
            Duration::from_secs(10)
        }
    }

    fn is_rate_limited(&self) -> bool {
        true
    }

    fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{http_response, serve_once};

    const STATES: &str = r#"{
        "time": 1700000000,
        "states": [
            ["4ca87d", "RYR4421 ", "Ireland", 1699999998, 1699999999, -0.08, 51.55,
             7467.6, false, 211.9, 310.0, 6.1, null, 7500.0, "7402", false, 0],
            ["400f01", "", "United Kingdom", null, 1699999990, -0.45, 51.47,
             null, true, 0.0, 90.0, null, null, null, null, false, 0],
            ["short", "BAD"]
        ]
    }"#;

    #[test]
    fn test_parse_states() {
        let body: StatesResponse = serde_json::from_str(STATES).unwrap();
        let reports = parse_states(body);
        assert_eq!(reports.len(), 2);

        let ryr = &reports[0];
        assert_eq!(ryr.hex, "4ca87d");
        assert_eq!(ryr.callsign.as_deref(), Some("RYR4421"));
        assert_eq!(ryr.latitude, Some(51.55));
        assert_eq!(ryr.longitude, Some(-0.08));
        assert_eq!(ryr.altitude, Some(Altitude::Meters(7467.6)));
        assert_eq!(ryr.ground_speed, Some(Speed::MetersPerSecond(211.9)));
        assert_eq!(ryr.vertical_rate, Some(VerticalRate::MetersPerSecond(6.1)));
        assert_eq!(ryr.squawk.as_deref(), Some("7402"));
        assert_eq!(ryr.observed_at.timestamp(), 1_699_999_998);

        let ground = &reports[1];
        assert_eq!(ground.callsign, None);
        assert!(ground.on_ground);
        assert_eq!(ground.altitude, None);
        assert_eq!(ground.observed_at.timestamp(), 1_699_999_990);
    }

    #[test]
    fn test_parse_null_states() {
        let body: StatesResponse = serde_json::from_str(r#"{"time": 1, "states": null}"#).unwrap();
        assert!(parse_states(body).is_empty());
    }

    #[test]
    fn test_geometric_altitude_fallback() {
        let body: StatesResponse = serde_json::from_str(
            r#"{"time": 1, "states": [["abc123", "X", "", 1, 1, 0.0, 51.0, null, false,
                 100.0, 0.0, 0.0, null, 1000.0, null, false, 0]]}"#,
        )
        .unwrap();
        let reports = parse_states(body);
        assert_eq!(reports[0].altitude, Some(Altitude::Meters(1000.0)));
    }

    #[test]
    fn test_rate_limit_response() {
        let url = serve_once(http_response(
            "429 Too Many Requests",
            &[("X-Rate-Limit-Retry-After-Seconds", "42")],
            "",
        ));
        let source = OpenSkySource::new(
            BoundingBox::around(51.5, -0.1, 10.0),
            None,
            Duration::from_secs(5),
        )
        .with_url(url);

        assert_eq!(
            source.fetch(),
            Err(SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(42))
            })
        );
    }

    #[test]
    fn test_fetch_states() {
        let url = serve_once(http_response("200 OK", &[], STATES));
        let source = OpenSkySource::new(
            BoundingBox::around(51.5, -0.1, 10.0),
            Some(("user".into(), "pass".into())),
            Duration::from_secs(5),
        )
        .with_url(url);

        assert!(source.is_authenticated());
        assert_eq!(source.recommended_poll_interval(), Duration::from_secs(5));
        assert_eq!(source.fetch().unwrap().len(), 2);
    }
}
