//! Aircraft repository for the shared database
//!
//! Stores static airframe identity keyed by hex address. Data is replaced
//! wholesale by a seed; there are no partial updates.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A row of the aircraft index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftRecord {
    /// Lower-case hex address
    pub hex: String,
    pub registration: Option<String>,
    pub type_code: Option<String>,
    pub model: Option<String>,
    pub operator: Option<String>,
    pub operator_icao: Option<String>,
    pub owner: Option<String>,
}

impl AircraftRecord {
    /// Operator name, falling back to the registered owner
    pub fn operator_name(&self) -> Option<&str> {
        self.operator.as_deref().or(self.owner.as_deref())
    }
}

/// Metadata about the last seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AircraftIndexMeta {
    /// File path or URL the index was seeded from
    pub source: String,
    pub seeded_at: DateTime<Utc>,
    pub entry_count: u64,
}

/// Coverage counts for the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AircraftCounts {
    pub total: u64,
    pub with_type: u64,
    pub with_registration: u64,
}

/// Repository for aircraft index operations
pub struct AircraftRepository<'a> {
    conn: &'a Connection,
}

impl<'a> AircraftRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Check if the index has no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM aircraft", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count aircraft: {}", e))
    }

    /// Look up a single airframe by hex (primary-key lookup)
    pub fn lookup(&self, hex: &str) -> Result<Option<AircraftRecord>> {
        self.conn
            .query_row(
                "SELECT hex, registration, type_code, model, operator, operator_icao, owner
                 FROM aircraft WHERE hex = ?1",
                [hex],
                |row| {
                    Ok(AircraftRecord {
                        hex: row.get(0)?,
                        registration: row.get(1)?,
                        type_code: row.get(2)?,
                        model: row.get(3)?,
                        operator: row.get(4)?,
                        operator_icao: row.get(5)?,
                        owner: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(|e| anyhow!("Failed to look up aircraft {}: {}", hex, e))
    }

    /// Replace the entire index with `records` in one transaction
    ///
    /// Readers on other connections keep seeing the previous contents until
    /// the commit. Duplicate hex values resolve to the last occurrence, so
    /// seeding the same data twice yields the same index.
    pub fn replace_all(&self, records: &[AircraftRecord], source: &str) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        tx.execute("DELETE FROM aircraft", [])
            .map_err(|e| anyhow!("Failed to clear aircraft: {}", e))?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO aircraft
                 (hex, registration, type_code, model, operator, operator_icao, owner)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for record in records {
                stmt.execute(params![
                    record.hex,
                    record.registration,
                    record.type_code,
                    record.model,
                    record.operator,
                    record.operator_icao,
                    record.owner,
                ])?;
            }
        }

        let entry_count: u64 = tx
            .query_row("SELECT COUNT(*) FROM aircraft", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count aircraft: {}", e))?;

        tx.execute(
            "INSERT OR REPLACE INTO aircraft_meta (id, source, seeded_at, entry_count)
             VALUES (1, ?1, ?2, ?3)",
            params![source, Utc::now().timestamp(), entry_count],
        )
        .map_err(|e| anyhow!("Failed to update aircraft_meta: {}", e))?;

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit transaction: {}", e))?;

        info!("Aircraft index seeded: {} entries from {}", entry_count, source);

        Ok(entry_count as usize)
    }

    /// Metadata about the last seed, if any
    pub fn get_meta(&self) -> Result<Option<AircraftIndexMeta>> {
        self.conn
            .query_row(
                "SELECT source, seeded_at, entry_count FROM aircraft_meta WHERE id = 1",
                [],
                |row| {
                    let seeded_at: i64 = row.get(1)?;
                    Ok(AircraftIndexMeta {
                        source: row.get(0)?,
                        seeded_at: DateTime::from_timestamp(seeded_at, 0).unwrap_or_default(),
                        entry_count: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| anyhow!("Failed to get aircraft metadata: {}", e))
    }

    /// Coverage counts (total, with type code, with registration)
    pub fn counts(&self) -> Result<AircraftCounts> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COUNT(type_code), COUNT(registration) FROM aircraft",
                [],
                |row| {
                    Ok(AircraftCounts {
                        total: row.get(0)?,
                        with_type: row.get(1)?,
                        with_registration: row.get(2)?,
                    })
                },
            )
            .map_err(|e| anyhow!("Failed to count aircraft coverage: {}", e))
    }
}
