//! Flightradar24 commercial API
//!
//! Every call is paid for with prepaid credits. Whether a failed call is
//! charged is not documented, so it is a [`CreditPolicy`] decided by
//! configuration. When a balance is configured the source refuses to call
//! once it is spent.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{
    http_agent, number, retry_after_secs, text, transport_error, BoundingBox, PositionSource,
    SourceError,
};
use crate::flight::{Altitude, RawPositionReport, Speed, VerticalRate};

pub const FR24_API_BASE: &str = "https://fr24api.flightradar24.com/api";

/// Which responses are charged against the balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditPolicy {
    /// Any request the server answered costs a credit
    EveryResponse,
    /// Only successful requests cost a credit
    SuccessfulOnly,
}

pub struct Fr24Source {
    agent: ureq::Agent,
    base_url: String,
    token: String,
    area: BoundingBox,
    sandbox: bool,
    policy: CreditPolicy,
    /// Remaining balance, if one was configured
    credits: Option<AtomicU64>,
    credits_used: AtomicU64,
}

impl Fr24Source {
    pub fn new(area: BoundingBox, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            base_url: FR24_API_BASE.to_string(),
            token: token.into(),
            area,
            sandbox: false,
            policy: CreditPolicy::EveryResponse,
            credits: None,
            credits_used: AtomicU64::new(0),
        }
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_credits(mut self, balance: Option<u64>, policy: CreditPolicy) -> Self {
        self.credits = balance.map(AtomicU64::new);
        self.policy = policy;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn credits_remaining(&self) -> Option<u64> {
        self.credits.as_ref().map(|c| c.load(Ordering::Acquire))
    }

    pub fn credits_used(&self) -> u64 {
        self.credits_used.load(Ordering::Relaxed)
    }

    fn endpoint(&self) -> String {
        let path = "/live/flight-positions/full";
        if self.sandbox {
            format!("{}/sandbox{}", self.base_url, path)
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn bounds(&self) -> String {
        format!(
            "{:.4},{:.4},{:.4},{:.4}",
            self.area.north, self.area.south, self.area.west, self.area.east
        )
    }

    fn has_credit(&self) -> bool {
        !matches!(self.credits_remaining(), Some(0))
    }

    fn charge(&self) {
        self.credits_used.fetch_add(1, Ordering::Relaxed);
        if let Some(credits) = &self.credits {
            let _ = credits.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some(c.saturating_sub(1))
            });
        }
    }

    /// Build the error for a failed response and charge it if policy says so
    fn failed(&self, reason: String) -> SourceError {
        let credit_consumed = self.policy == CreditPolicy::EveryResponse;
        if credit_consumed {
            self.charge();
        }
        SourceError::Unavailable {
            reason,
            credit_consumed,
        }
    }
}

/// Convert a flight-positions payload to reports
///
/// The list is under `data`, or the payload is the list itself. Entries
/// without a hex address are skipped.
pub fn parse_flight_positions(payload: &Value) -> Result<Vec<RawPositionReport>, SourceError> {
    let items = match payload {
        Value::Array(list) => list,
        Value::Object(map) => match map.get("data").or_else(|| map.get("flights")) {
            Some(Value::Array(list)) => list,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => return Err(SourceError::unavailable("FR24 data is not a list")),
        },
        _ => return Err(SourceError::unavailable("unexpected FR24 payload shape")),
    };

    let now = Utc::now();
    let reports = items
        .iter()
        .filter_map(|item| {
            let hex = text(item, &["hex"])?;
            let observed_at = text(item, &["timestamp"])
                .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or(now);

            Some(RawPositionReport {
                hex,
                callsign: text(item, &["callsign", "flight"]),
                latitude: number(item, &["lat", "latitude"]),
                longitude: number(item, &["lon", "longitude", "lng"]),
                altitude: number(item, &["alt", "altitude"]).map(Altitude::Feet),
                ground_speed: number(item, &["gspeed", "ground_speed", "speed"]).map(Speed::Knots),
                heading: number(item, &["track", "heading", "direction"]),
                vertical_rate: number(item, &["vspeed", "vertical_speed"])
                    .map(VerticalRate::FeetPerMinute),
                squawk: text(item, &["squawk"]),
                on_ground: item
                    .get("on_ground")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                observed_at,
            })
        })
        .collect();

    Ok(reports)
}

impl PositionSource for Fr24Source {
    fn name(&self) -> &str {
        if self.sandbox {
            "fr24-sandbox"
        } else {
            "fr24"
        }
    }

    fn fetch(&self) -> Result<Vec<RawPositionReport>, SourceError> {
        if !self.has_credit() {
            return Err(SourceError::CreditsExhausted);
        }

        let mut resp = self
            .agent
            .get(&self.endpoint())
            .query("bounds", self.bounds())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .header("Accept-Version", "v1")
            .call()
            .map_err(transport_error)?;

        match resp.status().as_u16() {
            200 => {}
            402 => {
                error!("FR24 reports the credit balance is exhausted");
                return Err(SourceError::CreditsExhausted);
            }
            401 => {
                error!("FR24 authentication failed (401), check the API token");
                return Err(self.failed("FR24 rejected the API token".to_string()));
            }
            403 => {
                error!("FR24 access forbidden (403), check the subscription tier");
                return Err(self.failed("FR24 subscription does not allow this endpoint".to_string()));
            }
            429 => {
                let retry_after = retry_after_secs(resp.headers().get("retry-after"));
                warn!("FR24 rate limit hit, retry after {:?}", retry_after);
                return Err(SourceError::RateLimited { retry_after });
            }
            status => return Err(self.failed(format!("FR24 returned HTTP {}", status))),
        }

        let payload: Value = match resp.body_mut().read_json() {
            Ok(payload) => payload,
            Err(e) => return Err(self.failed(format!("malformed FR24 payload: {}", e))),
        };

        self.charge();
        let reports = parse_flight_positions(&payload)?;

        match self.credits_remaining() {
            Some(remaining) => debug!(
                "{}: {} positions, {} credits left",
                self.name(),
                reports.len(),
                remaining
            ),
            None => debug!("{}: {} positions", self.name(), reports.len()),
        }
        if self.credits_remaining() == Some(0) {
            info!("FR24 credit balance spent, no further calls will be made");
        }

        Ok(reports)
    }

    fn recommended_poll_interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn is_rate_limited(&self) -> bool {
        true
    }

    /// Sandbox data is sample traffic from anywhere
    fn honors_radius(&self) -> bool {
        !self.sandbox
    }

    fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{http_response, serve_once};
    use serde_json::json;

    fn source(url: String) -> Fr24Source {
        Fr24Source::new(BoundingBox::around(51.5, -0.1, 10.0), "token", Duration::from_secs(5))
            .with_base_url(url)
    }

    #[test]
    fn test_parse_flight_positions() {
        let payload = json!({"data": [
            {"fr24_id": "321a0cc3", "hex": "4CA87D", "callsign": "RYR4421", "lat": 51.55,
             "lon": -0.08, "track": 310, "alt": 24500, "gspeed": 412, "vspeed": 1200,
             "squawk": "7402", "timestamp": "2023-11-14T22:13:20Z"},
            {"fr24_id": "nohex", "callsign": "GHOST", "lat": 51.0, "lon": 0.0}
        ]});

        let reports = parse_flight_positions(&payload).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].hex, "4CA87D");
        assert_eq!(reports[0].altitude, Some(Altitude::Feet(24500.0)));
        assert_eq!(reports[0].ground_speed, Some(Speed::Knots(412.0)));
        assert_eq!(reports[0].observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_bare_list_and_empty() {
        let reports =
            parse_flight_positions(&json!([{"hex": "abc123", "latitude": 1.0, "longitude": 2.0}]))
                .unwrap();
        assert_eq!(reports[0].latitude, Some(1.0));
        assert!(parse_flight_positions(&json!({"data": []})).unwrap().is_empty());
        assert!(parse_flight_positions(&json!({"data": null})).unwrap().is_empty());
        assert!(parse_flight_positions(&json!(42)).is_err());
    }

    #[test]
    fn test_sandbox_endpoint_and_bounds() {
        let source = source("https://example.invalid/api".into()).with_sandbox(true);
        assert_eq!(
            source.endpoint(),
            "https://example.invalid/api/sandbox/live/flight-positions/full"
        );
        assert_eq!(source.name(), "fr24-sandbox");
        assert_eq!(source.bounds().split(',').count(), 4);
        assert!(!source.honors_radius());
        assert!(source.with_sandbox(false).honors_radius());
    }

    #[test]
    fn test_exhausted_balance_stops_before_calling() {
        // Nothing listens here; a call would surface as Unavailable instead
        let source = source("http://127.0.0.1:9".into())
            .with_credits(Some(0), CreditPolicy::EveryResponse);
        assert_eq!(source.fetch(), Err(SourceError::CreditsExhausted));
        assert_eq!(source.credits_used(), 0);
    }

    #[test]
    fn test_payment_required_is_credits_exhausted() {
        let url = serve_once(http_response("402 Payment Required", &[], ""));
        let source = source(url);
        assert_eq!(source.fetch(), Err(SourceError::CreditsExhausted));
    }

    #[test]
    fn test_failed_call_charged_under_every_response_policy() {
        let url = serve_once(http_response("500 Internal Server Error", &[], ""));
        let source = source(url).with_credits(Some(10), CreditPolicy::EveryResponse);

        let err = source.fetch().unwrap_err();
        assert!(err.credit_consumed());
        assert_eq!(source.credits_remaining(), Some(9));
    }

    #[test]
    fn test_failed_call_free_under_successful_only_policy() {
        let url = serve_once(http_response("500 Internal Server Error", &[], ""));
        let source = source(url).with_credits(Some(10), CreditPolicy::SuccessfulOnly);

        let err = source.fetch().unwrap_err();
        assert!(!err.credit_consumed());
        assert_eq!(source.credits_remaining(), Some(10));
    }

    #[test]
    fn test_successful_call_is_charged() {
        let body = r#"{"data": [{"hex": "4ca87d", "lat": 51.5, "lon": -0.1, "alt": 30000}]}"#;
        let url = serve_once(http_response("200 OK", &[], body));
        let source = source(url).with_credits(Some(1), CreditPolicy::SuccessfulOnly);

        assert_eq!(source.fetch().unwrap().len(), 1);
        assert_eq!(source.credits_remaining(), Some(0));
        assert_eq!(source.credits_used(), 1);
        assert_eq!(source.fetch(), Err(SourceError::CreditsExhausted));
    }

    #[test]
    fn test_transport_failure_is_never_charged() {
        let source = source("http://127.0.0.1:9".into())
            .with_credits(Some(5), CreditPolicy::EveryResponse);
        let err = source.fetch().unwrap_err();
        assert!(!err.credit_consumed());
        assert_eq!(source.credits_remaining(), Some(5));
    }
}
