//! Position data sources
//!
//! Every source hands back a batch of [`RawPositionReport`]s on demand and
//! tells the poller how often it wants to be asked. The set of sources is
//! closed and selected by configuration:
//!
//! | Kind      | Variant                    | Transport                    |
//! |-----------|----------------------------|------------------------------|
//! | `decoder` | [`DecoderSource`]          | local readsb/dump1090 JSON   |
//! | `opensky` | [`OpenSkySource`]          | OpenSky REST, anonymous/basic|
//! | `fr24`    | [`Fr24Source`]             | FR24 REST, bearer token      |
//! | `mock`    | [`MockSource`]             | fixed in-memory data         |

pub mod decoder;
pub mod fr24;
pub mod mock;
pub mod opensky;

pub use decoder::{DecoderSource, DEFAULT_DECODER_URL};
pub use fr24::{CreditPolicy, Fr24Source};
pub use mock::MockSource;
pub use opensky::OpenSkySource;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::config::FlightboardConfig;
use crate::flight::RawPositionReport;

/// Why a fetch produced no reports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Transient failure; retry after backoff
    #[error("source unavailable: {reason}")]
    Unavailable {
        reason: String,
        /// Whether the failed call was charged against prepaid credits
        credit_consumed: bool,
    },

    /// The source asked us to slow down
    #[error("source rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Prepaid credits are gone; polling must stop
    #[error("source credits exhausted")]
    CreditsExhausted,
}

impl SourceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SourceError::Unavailable {
            reason: reason.into(),
            credit_consumed: false,
        }
    }

    pub fn credit_consumed(&self) -> bool {
        match self {
            SourceError::Unavailable {
                credit_consumed, ..
            } => *credit_consumed,
            SourceError::RateLimited { .. } | SourceError::CreditsExhausted => false,
        }
    }
}

/// Capability shared by all sources
pub trait PositionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the current batch of reports; an empty batch is a valid result
    fn fetch(&self) -> Result<Vec<RawPositionReport>, SourceError>;

    fn recommended_poll_interval(&self) -> Duration;

    fn is_rate_limited(&self) -> bool;

    /// Delay after a rate-limit response that carried no retry hint
    fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// Whether reports outside the display radius are dropped
    ///
    /// Sources that return fixed or sample data answer `false`: their
    /// reports are still ordered by distance but none are dropped.
    fn honors_radius(&self) -> bool {
        true
    }
}

/// Source selector used in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SourceKind {
    Decoder,
    #[serde(alias = "public")]
    #[cfg_attr(feature = "cli", value(name = "opensky"))]
    OpenSky,
    #[serde(alias = "commercial")]
    Fr24,
    #[default]
    Mock,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Decoder => write!(f, "decoder"),
            SourceKind::OpenSky => write!(f, "opensky"),
            SourceKind::Fr24 => write!(f, "fr24"),
            SourceKind::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "decoder" | "rtlsdr" | "readsb" | "dump1090" => Ok(SourceKind::Decoder),
            "opensky" | "public" => Ok(SourceKind::OpenSky),
            "fr24" | "commercial" => Ok(SourceKind::Fr24),
            "mock" => Ok(SourceKind::Mock),
            other => Err(anyhow!(
                "Unknown source '{}', expected one of: decoder, opensky, fr24, mock",
                other
            )),
        }
    }
}

/// The configured source
pub enum DataSource {
    Decoder(DecoderSource),
    PublicNetwork(OpenSkySource),
    Commercial(Fr24Source),
    Mock(MockSource),
}

impl DataSource {
    pub fn from_config(config: &FlightboardConfig) -> Result<Self> {
        let area = config.reference_area().bounding_box();
        let timeout = config.source_timeout();

        Ok(match config.source {
            SourceKind::Decoder => {
                DataSource::Decoder(DecoderSource::new(config.decoder_url.clone(), timeout))
            }
            SourceKind::OpenSky => {
                let credentials = match (&config.opensky_username, &config.opensky_password) {
                    (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
                    _ => None,
                };
                DataSource::PublicNetwork(OpenSkySource::new(area, credentials, timeout))
            }
            SourceKind::Fr24 => {
                let token = config
                    .fr24_api_token
                    .clone()
                    .ok_or_else(|| anyhow!("The fr24 source requires fr24_api_token to be set"))?;
                let policy = if config.fr24_failed_calls_consume_credit {
                    CreditPolicy::EveryResponse
                } else {
                    CreditPolicy::SuccessfulOnly
                };
                DataSource::Commercial(
                    Fr24Source::new(area, token, timeout)
                        .with_sandbox(config.fr24_sandbox)
                        .with_credits(config.fr24_credits, policy),
                )
            }
            SourceKind::Mock => DataSource::Mock(MockSource::new()),
        })
    }

    fn inner(&self) -> &dyn PositionSource {
        match self {
            DataSource::Decoder(source) => source,
            DataSource::PublicNetwork(source) => source,
            DataSource::Commercial(source) => source,
            DataSource::Mock(source) => source,
        }
    }
}

impl PositionSource for DataSource {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn fetch(&self) -> Result<Vec<RawPositionReport>, SourceError> {
        self.inner().fetch()
    }

    fn recommended_poll_interval(&self) -> Duration {
        self.inner().recommended_poll_interval()
    }

    fn is_rate_limited(&self) -> bool {
        self.inner().is_rate_limited()
    }

    fn rate_limit_delay(&self) -> Duration {
        self.inner().rate_limit_delay()
    }

    fn honors_radius(&self) -> bool {
        self.inner().honors_radius()
    }
}

/// Query area around the reference point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Box covering `radius_nm` around a point (1 nm = 1 arc-minute of latitude)
    pub fn around(latitude: f64, longitude: f64, radius_nm: f64) -> Self {
        let dlat = radius_nm / 60.0;
        let dlon = radius_nm / (60.0 * latitude.to_radians().cos().abs().max(0.01));
        Self {
            north: (latitude + dlat).min(90.0),
            south: (latitude - dlat).max(-90.0),
            west: longitude - dlon,
            east: longitude + dlon,
        }
    }
}

/// Mean Earth radius in nautical miles
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Reference point and display radius
///
/// The bounding box sent to area-query sources is a coarse rectangle; the
/// great-circle distance from here decides what is actually shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceArea {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_nm: f64,
}

impl ReferenceArea {
    pub fn new(latitude: f64, longitude: f64, radius_nm: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_nm,
        }
    }

    /// Haversine distance from the reference point
    pub fn distance_nm(&self, latitude: f64, longitude: f64) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_NM * a.sqrt().min(1.0).asin()
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.distance_nm(latitude, longitude) <= self.radius_nm
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(self.latitude, self.longitude, self.radius_nm)
    }

    /// Same reference point with no radius limit
    pub fn unbounded(self) -> Self {
        Self {
            radius_nm: f64::INFINITY,
            ..self
        }
    }
}

/// HTTP agent shared by the network sources
///
/// Status codes are returned as responses so each source can map them.
pub(crate) fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .user_agent(concat!("flightboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .into()
}

pub(crate) fn transport_error(err: ureq::Error) -> SourceError {
    match err {
        ureq::Error::Timeout(_) => SourceError::unavailable("request timed out"),
        other => SourceError::unavailable(other.to_string()),
    }
}

/// First of `keys` that holds a number (or numeric string)
pub(crate) fn number(entry: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match entry.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// First of `keys` that holds a non-blank string
pub(crate) fn text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        entry
            .get(key)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Parse a retry hint given in whole seconds
pub(crate) fn retry_after_secs(value: Option<&ureq::http::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
