use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::database::DATABASE_FILE_NAME;
use crate::enrich::{DEFAULT_MAX_API_CALLS, DEFAULT_ROUTE_TTL_SECS};
use crate::sources::decoder::DEFAULT_DECODER_URL;
use crate::sources::{ReferenceArea, SourceKind};

#[derive(Debug, Clone, Serialize)]
pub struct FlightboardConfig {
    /// Path to the directory holding the aircraft index and route cache
    pub data_dir: String,

    /// Which position source to poll
    pub source: SourceKind,

    /// Reference point and radius used to build network source queries
    pub latitude: f64,
    pub longitude: f64,
    pub radius_nm: f64,

    /// aircraft.json endpoint of a local decoder
    pub decoder_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub opensky_username: Option<String>,
    #[serde(skip_serializing)]
    pub opensky_password: Option<String>,

    #[serde(skip_serializing)]
    pub fr24_api_token: Option<String>,
    pub fr24_sandbox: bool,
    /// Prepaid credit balance, if known
    pub fr24_credits: Option<u64>,
    /// Whether failed FR24 calls are charged against the balance
    pub fr24_failed_calls_consume_credit: bool,

    /// No key disables remote route lookups
    #[serde(skip_serializing)]
    pub airlabs_api_key: Option<String>,

    /// Remote route lookups allowed per session (default: 200)
    pub max_api_calls_per_session: u32,

    /// TTL for cached routes in seconds (default: 24 hours)
    pub route_cache_ttl_secs: u64,

    /// Override of the source's recommended poll interval
    pub poll_interval_secs: Option<u64>,

    pub remote_timeout_secs: u64,
    pub source_timeout_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### flightboard configuration file

### directory for the aircraft index and route cache
# data_dir = "~/.flightboard"

### position source: decoder, opensky, fr24 or mock
# source = "mock"

### reference point (network sources query a box around it)
# latitude = 51.5074
# longitude = -0.1278
# radius_nm = 10.0

### local ADS-B decoder
# decoder_url = "http://localhost:8080/data/aircraft.json"

### OpenSky Network credentials (anonymous when unset)
# opensky_username = ""
# opensky_password = ""

### Flightradar24 API
# fr24_api_token = ""
# fr24_sandbox = false
# fr24_credits = 30000
# fr24_failed_calls_consume_credit = true

### AirLabs route lookups (disabled when unset)
# airlabs_api_key = ""
# max_api_calls_per_session = 200

### timing (in seconds)
# route_cache_ttl_secs = 86400      # 24 hours
# poll_interval_secs = 10           # default: per source
# remote_timeout_secs = 5
# source_timeout_secs = 15
"#;

fn home_dir() -> String {
    dirs::home_dir()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string())
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> String {
    match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home_dir(), rest)
        }
        _ => path.to_string(),
    }
}

impl Default for FlightboardConfig {
    fn default() -> Self {
        Self {
            data_dir: format!("{}/.flightboard", home_dir()),
            source: SourceKind::Mock,
            latitude: 51.5074,
            longitude: -0.1278,
            radius_nm: 10.0,
            decoder_url: DEFAULT_DECODER_URL.to_string(),
            opensky_username: None,
            opensky_password: None,
            fr24_api_token: None,
            fr24_sandbox: false,
            fr24_credits: None,
            fr24_failed_calls_consume_credit: true,
            airlabs_api_key: None,
            max_api_calls_per_session: DEFAULT_MAX_API_CALLS,
            route_cache_ttl_secs: DEFAULT_ROUTE_TTL_SECS,
            poll_interval_secs: None,
            remote_timeout_secs: 5,
            source_timeout_secs: 15,
        }
    }
}

impl FlightboardConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<FlightboardConfig> {
        // Secrets are often kept in a .env file next to the deployment
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();

        // Config dir
        let flightboard_dir = format!("{}/.flightboard", home_dir());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(flightboard_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create flightboard directory: {}", e))?;
                let p = format!("{}/flightboard.toml", flightboard_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of FLIGHTBOARD)
        // E.g., `FLIGHTBOARD_SOURCE=decoder ./flightboard run` would poll a local decoder
        builder = builder.add_source(config::Environment::with_prefix("FLIGHTBOARD"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    /// Build a configuration from flat key/value settings
    ///
    /// Missing keys take their defaults. Unparsable numbers are an error
    /// rather than silently falling back.
    pub fn from_map(config: &HashMap<String, String>) -> Result<FlightboardConfig> {
        let defaults = FlightboardConfig::default();

        let text = |key: &str| -> Option<String> {
            config
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        fn parsed<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            match value {
                Some(v) => v
                    .parse()
                    .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", v, key, e)),
                None => Ok(default),
            }
        }

        let data_dir = match text("data_dir") {
            Some(dir) => expand_home(&dir),
            None => defaults.data_dir,
        };

        let source = match text("source") {
            Some(s) => SourceKind::from_str(&s)?,
            None => defaults.source,
        };

        let latitude = parsed(text("latitude"), "latitude", defaults.latitude)?;
        let longitude = parsed(text("longitude"), "longitude", defaults.longitude)?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(anyhow!(
                "Reference point {}, {} is out of range",
                latitude,
                longitude
            ));
        }

        let fr24_credits = match text("fr24_credits") {
            Some(v) => Some(parsed(Some(v), "fr24_credits", 0u64)?),
            None => None,
        };
        let poll_interval_secs = match text("poll_interval_secs") {
            Some(v) => Some(parsed(Some(v), "poll_interval_secs", 0u64)?),
            None => None,
        };

        FlightboardConfig {
            data_dir,
            source,
            latitude,
            longitude,
            radius_nm: parsed(text("radius_nm"), "radius_nm", defaults.radius_nm)?,
            decoder_url: text("decoder_url").unwrap_or(defaults.decoder_url),
            opensky_username: text("opensky_username"),
            opensky_password: text("opensky_password"),
            fr24_api_token: text("fr24_api_token"),
            fr24_sandbox: parsed(text("fr24_sandbox"), "fr24_sandbox", defaults.fr24_sandbox)?,
            fr24_credits,
            fr24_failed_calls_consume_credit: parsed(
                text("fr24_failed_calls_consume_credit"),
                "fr24_failed_calls_consume_credit",
                defaults.fr24_failed_calls_consume_credit,
            )?,
            airlabs_api_key: text("airlabs_api_key"),
            max_api_calls_per_session: parsed(
                text("max_api_calls_per_session"),
                "max_api_calls_per_session",
                defaults.max_api_calls_per_session,
            )?,
            route_cache_ttl_secs: parsed(
                text("route_cache_ttl_secs"),
                "route_cache_ttl_secs",
                defaults.route_cache_ttl_secs,
            )?,
            poll_interval_secs,
            remote_timeout_secs: parsed(
                text("remote_timeout_secs"),
                "remote_timeout_secs",
                defaults.remote_timeout_secs,
            )?,
            source_timeout_secs: parsed(
                text("source_timeout_secs"),
                "source_timeout_secs",
                defaults.source_timeout_secs,
            )?,
        }
        .validated()
    }

    /// Reject values that would stall or spin the poller
    fn validated(self) -> Result<Self> {
        if !self.radius_nm.is_finite() || self.radius_nm <= 0.0 {
            return Err(anyhow!(
                "radius_nm must be a positive number of nautical miles, got {}",
                self.radius_nm
            ));
        }
        if self.poll_interval_secs == Some(0) {
            return Err(anyhow!("poll_interval_secs must be at least 1"));
        }
        for (key, secs) in [
            ("remote_timeout_secs", self.remote_timeout_secs),
            ("source_timeout_secs", self.source_timeout_secs),
        ] {
            if secs == 0 {
                return Err(anyhow!("{} must be at least 1", key));
            }
        }
        Ok(self)
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, DATABASE_FILE_NAME)
    }

    /// Get route cache TTL as Duration
    pub fn route_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.route_cache_ttl_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    /// Reference point and display radius
    pub fn reference_area(&self) -> ReferenceArea {
        ReferenceArea::new(self.latitude, self.longitude, self.radius_nm)
    }

    /// Configured poll interval override, if any
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs.map(Duration::from_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let set = |v: &Option<String>| if v.is_some() { "set" } else { "not set" };

        let mut lines = vec![
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!("Source:             {}", self.source),
            format!(
                "Reference Point:    {:.4}, {:.4} ({} nm)",
                self.latitude, self.longitude, self.radius_nm
            ),
        ];

        match self.source {
            SourceKind::Decoder => lines.push(format!("Decoder URL:        {}", self.decoder_url)),
            SourceKind::OpenSky => lines.push(format!(
                "OpenSky Account:    {}",
                self.opensky_username.as_deref().unwrap_or("anonymous")
            )),
            SourceKind::Fr24 => {
                lines.push(format!("FR24 Token:         {}", set(&self.fr24_api_token)));
                lines.push(format!("FR24 Sandbox:       {}", self.fr24_sandbox));
                if let Some(credits) = self.fr24_credits {
                    lines.push(format!("FR24 Credits:       {}", credits));
                }
                lines.push(format!(
                    "FR24 Failed Calls:  {}",
                    if self.fr24_failed_calls_consume_credit {
                        "consume credit"
                    } else {
                        "free"
                    }
                ));
            }
            SourceKind::Mock => {}
        }

        lines.push(format!(
            "Poll Interval:      {}",
            match self.poll_interval_secs {
                Some(secs) => format!("{} seconds", secs),
                None => "source default".to_string(),
            }
        ));
        lines.push(format!("AirLabs Key:        {}", set(&self.airlabs_api_key)));
        lines.push(format!(
            "API Calls/Session:  {}",
            self.max_api_calls_per_session
        ));
        lines.push(format!(
            "Route Cache TTL:    {} seconds",
            self.route_cache_ttl_secs
        ));
        lines.push(format!(
            "Timeouts:           remote {}s, source {}s",
            self.remote_timeout_secs, self.source_timeout_secs
        ));

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        format!("{}/.flightboard/flightboard.toml", home_dir())
    }
}
