//! Aircraft identity index
//!
//! Read-mostly store of airframe identity keyed by hex address. Reads are a
//! primary-key lookup; a seed swaps the whole table in one transaction.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::database::{AircraftCounts, AircraftIndexMeta, AircraftRecord, FlightboardDatabase};
use crate::enrich::import::{read_aircraft_csv, ParsedAircraft};
use crate::flight::{AircraftIdentity, IdentitySource};

/// Index size and last-seed details
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub counts: AircraftCounts,
    pub last_seed: Option<AircraftIndexMeta>,
}

/// Outcome of a successful seed
#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub source: String,
    pub imported: usize,
    pub skipped: usize,
}

pub struct AircraftIndex {
    db: Mutex<FlightboardDatabase>,
}

/// Normalize a hex address to the stored key form
pub fn normalize_hex(hex: &str) -> String {
    hex.trim().to_lowercase()
}

impl AircraftIndex {
    pub fn new(db: FlightboardDatabase) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the index stored in `data_dir`
    pub fn open(data_dir: &str) -> Result<Self> {
        Ok(Self::new(FlightboardDatabase::open_in_dir(data_dir)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(FlightboardDatabase::open_in_memory()?))
    }

    fn db(&self) -> Result<MutexGuard<'_, FlightboardDatabase>> {
        self.db
            .lock()
            .map_err(|_| anyhow!("Aircraft index lock poisoned"))
    }

    /// Raw index entry for `hex`
    pub fn lookup(&self, hex: &str) -> Result<Option<AircraftRecord>> {
        self.db()?.aircraft().lookup(&normalize_hex(hex))
    }

    /// Identity for `hex`, or `None` if the index has no entry
    ///
    /// An entry with every field empty is still a match; callers must not
    /// fall back to weaker tiers for hexes the index knows about.
    pub fn identity(&self, hex: &str) -> Result<Option<AircraftIdentity>> {
        Ok(self.lookup(hex)?.map(|record| AircraftIdentity {
            type_code: record.type_code.clone(),
            registration: record.registration.clone(),
            operator: record.operator_name().map(String::from),
            source: IdentitySource::Index,
        }))
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.db()?.aircraft().is_empty()
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let db = self.db()?;
        let repo = db.aircraft();
        Ok(IndexStats {
            counts: repo.counts()?,
            last_seed: repo.get_meta()?,
        })
    }

    /// Replace the index with already-parsed records
    pub fn seed_records(&self, records: &[AircraftRecord], source: &str) -> Result<usize> {
        self.db()?.aircraft().replace_all(records, source)
    }

    /// Import a CSV dataset from a path or URL and replace the index with it
    ///
    /// On any import error the existing index is left untouched.
    pub fn seed_from(&self, path_or_url: &str) -> Result<SeedSummary> {
        let ParsedAircraft { records, skipped } = read_aircraft_csv(path_or_url).map_err(|e| {
            warn!("Aircraft import from {} failed: {}", path_or_url, e);
            anyhow!("Failed to import aircraft data from {}: {}", path_or_url, e)
        })?;

        let imported = self.seed_records(&records, path_or_url)?;
        if skipped > 0 {
            info!("Skipped {} rows without a valid icao24", skipped);
        }

        Ok(SeedSummary {
            source: path_or_url.to_string(),
            imported,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_index() -> AircraftIndex {
        let index = AircraftIndex::open_in_memory().unwrap();
        index
            .seed_records(
                &[
                    AircraftRecord {
                        hex: "4ca87d".into(),
                        registration: Some("EI-DWF".into()),
                        type_code: Some("B738".into()),
                        operator: Some("Ryanair".into()),
                        ..Default::default()
                    },
                    AircraftRecord {
                        hex: "abcdef".into(),
                        ..Default::default()
                    },
                ],
                "test",
            )
            .unwrap();
        index
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let index = seeded_index();
        assert!(index.lookup("4CA87D").unwrap().is_some());
        assert!(index.lookup(" 4ca87d ").unwrap().is_some());
        assert!(index.lookup("000000").unwrap().is_none());
    }

    #[test]
    fn test_identity() {
        let index = seeded_index();
        let identity = index.identity("4ca87d").unwrap().unwrap();
        assert_eq!(identity.type_code.as_deref(), Some("B738"));
        assert_eq!(identity.registration.as_deref(), Some("EI-DWF"));
        assert_eq!(identity.operator.as_deref(), Some("Ryanair"));
        assert_eq!(identity.source, IdentitySource::Index);

        let bare = index.identity("abcdef").unwrap().unwrap();
        assert_eq!(bare.source, IdentitySource::Index);
        assert_eq!(bare.operator, None);
    }

    #[test]
    fn test_failed_seed_keeps_existing_index() {
        let index = seeded_index();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "hex,registration\nabcdef,G-ABCD\n").unwrap();

        assert!(index.seed_from(path.to_str().unwrap()).is_err());
        assert_eq!(index.stats().unwrap().counts.total, 2);
        assert!(index.lookup("4ca87d").unwrap().is_some());
    }

    #[test]
    fn test_seed_from_file_is_idempotent() {
        let index = AircraftIndex::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aircraft.csv");
        std::fs::write(
            &path,
            "icao24,registration,typecode,operator\n\
             4ca87d,EI-DWF,B738,Ryanair\n\
             400f01,G-EUPA,A319,British Airways\n",
        )
        .unwrap();
        let path = path.to_str().unwrap();

        let first = index.seed_from(path).unwrap();
        let before = index.lookup("400f01").unwrap();
        let second = index.seed_from(path).unwrap();
        let after = index.lookup("400f01").unwrap();

        assert_eq!(first.imported, 2);
        assert_eq!(second.imported, 2);
        assert_eq!(before, after);

        let stats = index.stats().unwrap();
        assert_eq!(stats.counts.total, 2);
        assert_eq!(stats.last_seed.unwrap().source, path);
    }
}
