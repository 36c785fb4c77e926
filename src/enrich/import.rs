//! Bulk import of the aircraft index
//!
//! Parses the OpenSky aircraft database CSV (or any CSV with the same
//! header names). Parsing is done in full before anything is written, so a
//! structurally broken file never touches the existing index.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use thiserror::Error;
use tracing::{debug, info};

use crate::database::AircraftRecord;

/// Public OpenSky aircraft metadata snapshot
pub const OPENSKY_AIRCRAFT_DB_URL: &str =
    "https://opensky-network.org/datasets/metadata/aircraft-database-complete-2024-06.csv";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed input at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("required column '{0}' not found in header")]
    MissingColumn(String),

    #[error("input contains no aircraft records")]
    Empty,

    #[error("failed to read input: {0}")]
    Io(String),
}

/// Result of parsing a dataset
#[derive(Debug, Default)]
pub struct ParsedAircraft {
    pub records: Vec<AircraftRecord>,
    /// Rows without a usable icao24 value
    pub skipped: usize,
}

/// Column positions resolved from the header row
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Self {
        let index = header
            .iter()
            .enumerate()
            .map(|(idx, name)| (clean(name).to_string(), idx))
            .collect();
        Self { index }
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn get(&self, row: &csv::StringRecord, name: &str) -> Option<String> {
        let idx = *self.index.get(name)?;
        let value = clean(row.get(idx)?);
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// Strip whitespace and any leftover quote characters around a field
fn clean(value: &str) -> &str {
    value
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim()
}

fn is_hex_address(value: &str) -> bool {
    !value.is_empty() && value.len() <= 6 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse an aircraft CSV from any reader
///
/// The quote character is detected from the first byte of the header:
/// older OpenSky dumps quote every field with `'`.
pub fn parse_aircraft_csv<R: Read>(reader: R) -> Result<ParsedAircraft, ImportError> {
    let mut reader = BufReader::new(reader);

    let first_byte = {
        let buf = reader
            .fill_buf()
            .map_err(|e| ImportError::Io(e.to_string()))?;
        let buf = buf.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(buf);
        buf.first().copied()
    };
    let Some(first_byte) = first_byte else {
        return Err(ImportError::Empty);
    };
    let quote = if first_byte == b'\'' { b'\'' } else { b'"' };

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quote(quote)
        .from_reader(reader);

    let header = csv_reader.headers().map_err(|e| ImportError::Malformed {
        line: 1,
        reason: e.to_string(),
    })?;
    let columns = Columns::from_header(header);

    if !columns.has("icao24") {
        return Err(ImportError::MissingColumn("icao24".to_string()));
    }

    let mut parsed = ParsedAircraft::default();
    let mut row = csv::StringRecord::new();

    loop {
        match csv_reader.read_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                return Err(match e.kind() {
                    csv::ErrorKind::Io(io) => ImportError::Io(io.to_string()),
                    _ => ImportError::Malformed {
                        line,
                        reason: e.to_string(),
                    },
                });
            }
        }

        let hex = columns
            .get(&row, "icao24")
            .map(|h| h.to_lowercase())
            .filter(|h| is_hex_address(h));

        let Some(hex) = hex else {
            parsed.skipped += 1;
            continue;
        };

        parsed.records.push(AircraftRecord {
            hex,
            registration: columns.get(&row, "registration"),
            type_code: columns.get(&row, "typecode").map(|t| t.to_uppercase()),
            model: columns.get(&row, "model"),
            operator: columns.get(&row, "operator"),
            operator_icao: columns.get(&row, "operatorIcao"),
            owner: columns.get(&row, "owner"),
        });
    }

    if parsed.records.is_empty() {
        return Err(ImportError::Empty);
    }

    debug!(
        "Parsed {} aircraft records, skipped {} rows",
        parsed.records.len(),
        parsed.skipped
    );
    Ok(parsed)
}

/// Read and parse an aircraft CSV from a local path or URL
///
/// Compressed inputs (`.gz`, `.bz2`) are handled by `oneio`.
pub fn read_aircraft_csv(path_or_url: &str) -> Result<ParsedAircraft, ImportError> {
    info!("Reading aircraft dataset from {}", path_or_url);
    let reader = oneio::get_reader(path_or_url).map_err(|e| ImportError::Io(e.to_string()))?;
    parse_aircraft_csv(reader)
}
