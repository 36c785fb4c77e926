//! Metered remote route lookup
//!
//! One HTTP call per cache miss, keyed by callsign. Callers must take a unit
//! from the session budget before calling [`RouteLookup::lookup`] or
//! [`AirportLookup::lookup_airport`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::database::AirportRecord;

pub const AIRLABS_BASE_URL: &str = "https://airlabs.co/api/v9";

/// Default bound on a single remote call
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure of a single remote lookup
///
/// None of these escape the enrichment resolver; they only decide what
/// happens to the budget and whether the client stays enabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote lookup timed out")]
    Timeout,

    #[error("remote lookup unavailable: {0}")]
    Unavailable(String),

    #[error("remote lookup rate limited")]
    RateLimited,

    #[error("remote lookup rejected credentials")]
    Unauthorized,

    #[error("malformed remote response: {0}")]
    Malformed(String),
}

/// Airport codes returned by a successful lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRoute {
    pub origin: Option<String>,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteLookupOutcome {
    Found(RemoteRoute),
    /// The service answered but knows no route for the callsign
    NotFound,
}

/// A remote service that resolves a callsign to a route
pub trait RouteLookup: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the client can still be called this session
    fn is_enabled(&self) -> bool {
        true
    }

    fn lookup(&self, callsign: &str) -> Result<RouteLookupOutcome, RemoteError>;
}

/// A remote service that resolves an airport code to its name
pub trait AirportLookup: Send + Sync {
    /// Whether airport lookups can still be issued this session
    fn airport_lookups_enabled(&self) -> bool {
        true
    }

    /// `Ok(None)` when the service answered but does not know the code
    fn lookup_airport(&self, code: &str) -> Result<Option<AirportRecord>, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct AirLabsResponse {
    #[serde(default)]
    response: Option<Vec<AirLabsFlight>>,
    #[serde(default)]
    error: Option<AirLabsError>,
}

#[derive(Debug, Deserialize)]
struct AirLabsFlight {
    dep_iata: Option<String>,
    dep_icao: Option<String>,
    arr_iata: Option<String>,
    arr_icao: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirLabsAirportResponse {
    #[serde(default)]
    response: Option<Vec<AirLabsAirport>>,
    #[serde(default)]
    error: Option<AirLabsError>,
}

#[derive(Debug, Deserialize)]
struct AirLabsAirport {
    name: Option<String>,
    iata_code: Option<String>,
    icao_code: Option<String>,
    city: Option<String>,
    country_code: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AirLabsError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

/// Pick the first non-blank code, preferring IATA
fn airport_code(iata: Option<String>, icao: Option<String>) -> Option<String> {
    [iata, icao]
        .into_iter()
        .flatten()
        .map(|code| code.trim().to_uppercase())
        .find(|code| !code.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn api_error(err: AirLabsError) -> RemoteError {
    match err.code.as_str() {
        "unknown_api_key" | "expired_api_key" | "wrong_api_key" => RemoteError::Unauthorized,
        "month_limit_exceeded" | "minute_limit_exceeded" | "hour_limit_exceeded" => {
            RemoteError::RateLimited
        }
        _ => RemoteError::Unavailable(format!("{} ({})", err.message, err.code)),
    }
}

fn parse_airlabs(body: AirLabsResponse) -> Result<RouteLookupOutcome, RemoteError> {
    if let Some(err) = body.error {
        return Err(api_error(err));
    }

    let Some(flight) = body.response.and_then(|list| list.into_iter().next()) else {
        return Ok(RouteLookupOutcome::NotFound);
    };

    let origin = airport_code(flight.dep_iata, flight.dep_icao);
    let destination = airport_code(flight.arr_iata, flight.arr_icao);

    if origin.is_none() && destination.is_none() {
        return Ok(RouteLookupOutcome::NotFound);
    }

    Ok(RouteLookupOutcome::Found(RemoteRoute {
        origin,
        destination,
    }))
}

fn parse_airlabs_airport(
    code: &str,
    body: AirLabsAirportResponse,
) -> Result<Option<AirportRecord>, RemoteError> {
    if let Some(err) = body.error {
        return Err(api_error(err));
    }

    let Some(airport) = body.response.and_then(|list| list.into_iter().next()) else {
        return Ok(None);
    };
    let Some(name) = non_blank(airport.name) else {
        return Ok(None);
    };

    Ok(Some(AirportRecord {
        code: code.trim().to_uppercase(),
        name,
        iata: non_blank(airport.iata_code).map(|c| c.to_uppercase()),
        icao: non_blank(airport.icao_code).map(|c| c.to_uppercase()),
        city: non_blank(airport.city),
        country: non_blank(airport.country_code),
        latitude: airport.lat,
        longitude: airport.lng,
    }))
}

/// AirLabs client for the `/flights` and `/airports` endpoints
///
/// A 401 disables the client for the rest of the session.
pub struct AirLabsClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
    enabled: AtomicBool,
}

impl AirLabsClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::with_base_url(api_key, AIRLABS_BASE_URL, timeout)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            enabled: AtomicBool::new(true),
        }
    }

    fn disable(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            error!("AirLabs rejected the API key, lookups disabled for this session");
        }
    }

    /// GET `{base}/{endpoint}?api_key=..&{key}={value}` and decode the body
    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        key: &str,
        value: &str,
    ) -> Result<T, RemoteError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut resp = self
            .agent
            .get(&url)
            .query("api_key", &self.api_key)
            .query(key, value)
            .call()
            .map_err(|e| match e {
                ureq::Error::Timeout(_) => RemoteError::Timeout,
                other => RemoteError::Unavailable(other.to_string()),
            })?;

        match resp.status().as_u16() {
            200 => {}
            401 | 403 => {
                self.disable();
                return Err(RemoteError::Unauthorized);
            }
            429 => {
                warn!("AirLabs rate limit hit on /{} for {}", endpoint, value);
                return Err(RemoteError::RateLimited);
            }
            status => {
                return Err(RemoteError::Unavailable(format!("HTTP {}", status)));
            }
        }

        resp.body_mut()
            .read_json::<T>()
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

impl RouteLookup for AirLabsClient {
    fn name(&self) -> &str {
        "airlabs"
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn lookup(&self, callsign: &str) -> Result<RouteLookupOutcome, RemoteError> {
        let body: AirLabsResponse = self.get_json("flights", "flight_icao", callsign)?;

        let outcome = parse_airlabs(body);
        match &outcome {
            Ok(RouteLookupOutcome::Found(route)) => info!(
                "AirLabs: {} -> {}/{}",
                callsign,
                route.origin.as_deref().unwrap_or("?"),
                route.destination.as_deref().unwrap_or("?")
            ),
            Ok(RouteLookupOutcome::NotFound) => debug!("AirLabs: no route for {}", callsign),
            Err(RemoteError::Unauthorized) => self.disable(),
            Err(_) => {}
        }
        outcome
    }
}

impl AirportLookup for AirLabsClient {
    fn airport_lookups_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Three-letter codes are queried as IATA, anything else as ICAO
    fn lookup_airport(&self, code: &str) -> Result<Option<AirportRecord>, RemoteError> {
        let code = code.trim().to_uppercase();
        let key = if code.len() == 3 { "iata_code" } else { "icao_code" };
        let body: AirLabsAirportResponse = self.get_json("airports", key, &code)?;

        let outcome = parse_airlabs_airport(&code, body);
        match &outcome {
            Ok(Some(airport)) => debug!("AirLabs: airport {} -> {}", code, airport.name),
            Ok(None) => debug!("AirLabs: no airport for {}", code),
            Err(RemoteError::Unauthorized) => self.disable(),
            Err(_) => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{http_response, serve_once};
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve one canned response and hand back the request line
    fn serve_recording(response: String) -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap();
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&buf[..n])
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn parse(json: &str) -> Result<RouteLookupOutcome, RemoteError> {
        parse_airlabs(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_parse_found() {
        let outcome = parse(
            r#"{"response": [
                {"flight_icao": "RYR4421", "dep_iata": "STN", "dep_icao": "EGSS",
                 "arr_iata": "DUB", "arr_icao": "EIDW"},
                {"dep_iata": "XXX", "arr_iata": "YYY"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            outcome,
            RouteLookupOutcome::Found(RemoteRoute {
                origin: Some("STN".into()),
                destination: Some("DUB".into()),
            })
        );
    }

    #[test]
    fn test_parse_falls_back_to_icao() {
        let outcome = parse(
            r#"{"response": [{"dep_iata": "", "dep_icao": "egss", "arr_iata": null, "arr_icao": null}]}"#,
        )
        .unwrap();

        assert_eq!(
            outcome,
            RouteLookupOutcome::Found(RemoteRoute {
                origin: Some("EGSS".into()),
                destination: None,
            })
        );
    }

    #[test]
    fn test_parse_not_found() {
        assert_eq!(parse(r#"{"response": []}"#).unwrap(), RouteLookupOutcome::NotFound);
        assert_eq!(parse(r#"{}"#).unwrap(), RouteLookupOutcome::NotFound);
        assert_eq!(
            parse(r#"{"response": [{"dep_iata": " ", "arr_iata": ""}]}"#).unwrap(),
            RouteLookupOutcome::NotFound
        );
    }

    #[test]
    fn test_parse_error_body() {
        assert_eq!(
            parse(r#"{"error": {"message": "bad key", "code": "unknown_api_key"}}"#),
            Err(RemoteError::Unauthorized)
        );
        assert_eq!(
            parse(r#"{"error": {"message": "limit", "code": "month_limit_exceeded"}}"#),
            Err(RemoteError::RateLimited)
        );
        assert!(matches!(
            parse(r#"{"error": {"message": "oops", "code": "internal"}}"#),
            Err(RemoteError::Unavailable(_))
        ));
    }

    #[test]
    fn test_parse_airport() {
        let body = serde_json::from_str(
            r#"{"response": [{"name": " London Stansted Airport ", "iata_code": "STN",
                 "icao_code": "EGSS", "city": "London", "country_code": "GB",
                 "lat": 51.885, "lng": 0.235}]}"#,
        )
        .unwrap();
        let airport = parse_airlabs_airport("stn", body).unwrap().unwrap();
        assert_eq!(airport.code, "STN");
        assert_eq!(airport.name, "London Stansted Airport");
        assert_eq!(airport.icao.as_deref(), Some("EGSS"));
        assert_eq!(airport.country.as_deref(), Some("GB"));
        assert_eq!(airport.longitude, Some(0.235));

        let unnamed = serde_json::from_str(r#"{"response": [{"name": "", "iata_code": "XXX"}]}"#)
            .unwrap();
        assert_eq!(parse_airlabs_airport("XXX", unnamed).unwrap(), None);

        let limited = serde_json::from_str(
            r#"{"error": {"message": "limit", "code": "minute_limit_exceeded"}}"#,
        )
        .unwrap();
        assert_eq!(
            parse_airlabs_airport("STN", limited),
            Err(RemoteError::RateLimited)
        );
    }

    #[test]
    fn test_airport_lookup_queries_by_code_kind() {
        let (base, handle) = serve_recording(http_response(
            "200 OK",
            &[("Content-Type", "application/json")],
            r#"{"response": [{"name": "Dublin Airport", "iata_code": "DUB", "icao_code": "EIDW"}]}"#,
        ));
        let client = AirLabsClient::with_base_url("key", base, Duration::from_secs(5));

        let airport = client.lookup_airport("eidw").unwrap().unwrap();
        assert_eq!(airport.code, "EIDW");
        assert_eq!(airport.name, "Dublin Airport");

        let request = handle.join().unwrap();
        assert!(request.starts_with("GET /airports?"));
        assert!(request.contains("icao_code=EIDW"));
    }

    #[test]
    fn test_unauthorized_airport_lookup_disables_client() {
        let base = serve_once(http_response("401 Unauthorized", &[], ""));
        let client = AirLabsClient::with_base_url("bad", base, Duration::from_secs(5));

        assert_eq!(client.lookup_airport("STN"), Err(RemoteError::Unauthorized));
        assert!(!client.airport_lookups_enabled());
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_unreachable_host_is_unavailable() {
        // Port 9 on localhost is not expected to serve HTTP
        let client =
            AirLabsClient::with_base_url("key", "http://127.0.0.1:9", Duration::from_secs(1));
        let result = client.lookup("RYR4421");
        assert!(matches!(
            result,
            Err(RemoteError::Unavailable(_)) | Err(RemoteError::Timeout)
        ));
        assert!(client.is_enabled());
    }
}
