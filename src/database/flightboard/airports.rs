//! Airport repository for the shared database
//!
//! Airport codes resolved to names. Rows are keyed by the upper-case code
//! used in the lookup (IATA or ICAO), so a route's origin code finds its row
//! directly.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A resolved airport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirportRecord {
    /// Code the airport was looked up with, upper-case
    pub code: String,
    pub name: String,
    pub iata: Option<String>,
    pub icao: Option<String>,
    pub city: Option<String>,
    /// ISO 3166 alpha-2
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Repository for airport name operations
pub struct AirportRepository<'a> {
    conn: &'a Connection,
}

impl<'a> AirportRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM airports", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count airports: {}", e))
    }

    pub fn get(&self, code: &str) -> Result<Option<AirportRecord>> {
        self.conn
            .query_row(
                "SELECT code, name, iata, icao, city, country, latitude, longitude
                 FROM airports WHERE code = ?1",
                [code],
                |row| {
                    Ok(AirportRecord {
                        code: row.get(0)?,
                        name: row.get(1)?,
                        iata: row.get(2)?,
                        icao: row.get(3)?,
                        city: row.get(4)?,
                        country: row.get(5)?,
                        latitude: row.get(6)?,
                        longitude: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(|e| anyhow!("Failed to get airport {}: {}", code, e))
    }

    /// Insert or replace the airport stored under `record.code`
    pub fn upsert(&self, record: &AirportRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO airports
                 (code, name, iata, icao, city, country, latitude, longitude, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, strftime('%s', 'now'))",
                params![
                    record.code,
                    record.name,
                    record.iata,
                    record.icao,
                    record.city,
                    record.country,
                    record.latitude,
                    record.longitude
                ],
            )
            .map_err(|e| anyhow!("Failed to store airport {}: {}", record.code, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{DatabaseConn, SchemaManager};

    fn setup_test_db() -> DatabaseConn {
        let db = DatabaseConn::open_in_memory().unwrap();
        SchemaManager::new(&db.conn).initialize().unwrap();
        db
    }

    fn stansted() -> AirportRecord {
        AirportRecord {
            code: "STN".into(),
            name: "London Stansted Airport".into(),
            iata: Some("STN".into()),
            icao: Some("EGSS".into()),
            city: Some("London".into()),
            country: Some("GB".into()),
            latitude: Some(51.885),
            longitude: Some(0.235),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_test_db();
        let repo = AirportRepository::new(&db.conn);
        assert_eq!(repo.get("STN").unwrap(), None);

        repo.upsert(&stansted()).unwrap();
        assert_eq!(repo.get("STN").unwrap(), Some(stansted()));
        assert_eq!(repo.get("EGSS").unwrap(), None);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces() {
        let db = setup_test_db();
        let repo = AirportRepository::new(&db.conn);

        repo.upsert(&stansted()).unwrap();
        let renamed = AirportRecord {
            name: "Stansted".into(),
            city: None,
            ..stansted()
        };
        repo.upsert(&renamed).unwrap();

        assert_eq!(repo.get("STN").unwrap(), Some(renamed));
        assert_eq!(repo.count().unwrap(), 1);
    }
}
