//! Aircraft lens
//!
//! Read-only diagnostics over the aircraft index ("look up by hex" and
//! "index statistics"), plus the seed operation used by the CLI.

use anyhow::Result;
use chrono::Utc;
use chrono_humanize::HumanTime;
use serde::Serialize;
use tabled::Tabled;

use super::utils::{or_unknown, render_one, truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};
use crate::database::AircraftRecord;
use crate::enrich::{AircraftIndex, IndexStats, SeedSummary, OPENSKY_AIRCRAFT_DB_URL};

/// One index entry for display
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct AircraftLookupResult {
    pub hex: String,
    #[tabled(display = "display_opt")]
    pub registration: Option<String>,
    #[tabled(display = "display_opt")]
    pub type_code: Option<String>,
    #[tabled(display = "display_opt")]
    pub model: Option<String>,
    #[tabled(display = "display_operator")]
    pub operator: Option<String>,
}

fn display_opt(value: &Option<String>) -> String {
    or_unknown(value.as_deref())
}

fn display_operator(value: &Option<String>) -> String {
    truncate_name(&or_unknown(value.as_deref()), DEFAULT_NAME_MAX_LEN)
}

impl From<AircraftRecord> for AircraftLookupResult {
    fn from(record: AircraftRecord) -> Self {
        let operator = record.operator_name().map(String::from);
        Self {
            hex: record.hex,
            registration: record.registration,
            type_code: record.type_code,
            model: record.model,
            operator,
        }
    }
}

/// Index statistics for display
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct AircraftIndexSummary {
    pub entries: u64,
    pub with_type: u64,
    pub with_registration: u64,
    #[tabled(display = "display_opt")]
    pub seed_source: Option<String>,
    #[tabled(display = "display_opt")]
    pub last_seeded: Option<String>,
}

impl From<IndexStats> for AircraftIndexSummary {
    fn from(stats: IndexStats) -> Self {
        let (seed_source, last_seeded) = match stats.last_seed {
            Some(meta) => (
                Some(meta.source),
                Some(format!(
                    "{} ({})",
                    meta.seeded_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    HumanTime::from(meta.seeded_at - Utc::now())
                )),
            ),
            None => (None, None),
        };
        Self {
            entries: stats.counts.total,
            with_type: stats.counts.with_type,
            with_registration: stats.counts.with_registration,
            seed_source,
            last_seeded,
        }
    }
}

pub struct AircraftLens<'a> {
    index: &'a AircraftIndex,
}

impl<'a> AircraftLens<'a> {
    pub fn new(index: &'a AircraftIndex) -> Self {
        Self { index }
    }

    /// Look up one aircraft by hex identifier
    pub fn lookup(&self, hex: &str) -> Result<Option<AircraftLookupResult>> {
        Ok(self.index.lookup(hex)?.map(AircraftLookupResult::from))
    }

    pub fn stats(&self) -> Result<AircraftIndexSummary> {
        Ok(self.index.stats()?.into())
    }

    pub fn needs_seed(&self) -> bool {
        self.index.is_empty().unwrap_or(true)
    }

    /// Rebuild the index from a CSV path or URL (default: OpenSky database)
    pub fn seed(&self, from: Option<&str>) -> Result<SeedSummary> {
        self.index.seed_from(from.unwrap_or(OPENSKY_AIRCRAFT_DB_URL))
    }

    pub fn format_lookup(
        &self,
        result: &AircraftLookupResult,
        format: OutputFormat,
    ) -> Result<String> {
        render_one(result, format)
    }

    pub fn format_stats(
        &self,
        summary: &AircraftIndexSummary,
        format: OutputFormat,
    ) -> Result<String> {
        render_one(summary, format)
    }
}
