//! Output helpers shared by the lenses
//!
//! Every CLI command renders through [`OutputFormat`], so a table row type
//! only needs `Tabled + Serialize` to support all formats.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::flight::UNKNOWN;

/// Default maximum length for operator names in tables
pub const DEFAULT_NAME_MAX_LEN: usize = 24;

/// Output format for all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// One JSON object per line, for streaming
    JsonLine,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::Markdown)
    }

    /// Format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &[
            "table",
            "markdown",
            "json",
            "json-pretty",
            "json-line",
            "psv",
        ]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Render rows in the requested format
///
/// JSON formats serialize the rows themselves; table formats use the
/// `Tabled` view. An empty list renders as an empty table or `[]`.
pub fn render_rows<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) -> Result<String> {
    let json_err = |e: serde_json::Error| anyhow!("Failed to serialize to JSON: {}", e);

    Ok(match format {
        OutputFormat::Table => Table::new(rows).with(Style::rounded()).to_string(),
        OutputFormat::Markdown => Table::new(rows).with(Style::markdown()).to_string(),
        OutputFormat::Json => serde_json::to_string(rows).map_err(json_err)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(rows).map_err(json_err)?,
        OutputFormat::JsonLine => rows
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(json_err)?
            .join("\n"),
        OutputFormat::Psv => {
            let mut lines = vec![T::headers().join("|")];
            lines.extend(rows.iter().map(|row| row.fields().join("|")));
            lines.join("\n")
        }
    })
}

/// Render a single value; table formats fall back to a one-row table
pub fn render_one<T: Tabled + Serialize>(row: &T, format: OutputFormat) -> Result<String> {
    let json_err = |e: serde_json::Error| anyhow!("Failed to serialize to JSON: {}", e);

    match format {
        OutputFormat::Json | OutputFormat::JsonLine => serde_json::to_string(row).map_err(json_err),
        OutputFormat::JsonPretty => serde_json::to_string_pretty(row).map_err(json_err),
        OutputFormat::Table | OutputFormat::Markdown | OutputFormat::Psv => {
            render_rows(std::slice::from_ref(row), format)
        }
    }
}

/// Value for a table cell, `unknown` when missing
pub fn or_unknown(value: Option<&str>) -> String {
    value.unwrap_or(UNKNOWN).to_string()
}

/// Truncate a string to `max_len` characters, ending in "..." if cut
///
/// ```
/// use flightboard::lens::utils::truncate_name;
///
/// assert_eq!(truncate_name("RYANAIR", 20), "RYANAIR");
/// assert_eq!(truncate_name("BRITISH AIRWAYS WORLD CARGO", 20), "BRITISH AIRWAYS W...");
/// ```
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else {
        let truncated: String = name.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled, Serialize)]
    struct Row {
        hex: String,
        operator: String,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                hex: "4ca87d".into(),
                operator: "RYANAIR".into(),
            },
            Row {
                hex: "400f01".into(),
                operator: "BRITISH AIRWAYS".into(),
            },
        ]
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("Short", 20), "Short");
        assert_eq!(truncate_name("Hello", 3), "...");
        assert_eq!(truncate_name("日本航空インターナショナル", 8), "日本航空イ...");
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("md").unwrap(), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from_str("jsonl").unwrap(), OutputFormat::JsonLine);
        assert_eq!(OutputFormat::from_str("PSV").unwrap(), OutputFormat::Psv);
        assert!(OutputFormat::from_str("xml").is_err());
        for name in OutputFormat::all_names() {
            let format = OutputFormat::from_str(name).unwrap();
            assert_eq!(&format.to_string(), name);
        }
    }

    #[test]
    fn test_render_psv() {
        let out = render_rows(&rows(), OutputFormat::Psv).unwrap();
        assert_eq!(out, "hex|operator\n4ca87d|RYANAIR\n400f01|BRITISH AIRWAYS");
    }

    #[test]
    fn test_render_json_variants() {
        let json = render_rows(&rows(), OutputFormat::Json).unwrap();
        assert!(json.starts_with("[{\"hex\":\"4ca87d\""));

        let lines = render_rows(&rows(), OutputFormat::JsonLine).unwrap();
        assert_eq!(lines.lines().count(), 2);

        let one = render_one(&rows()[0], OutputFormat::Json).unwrap();
        assert_eq!(one, r#"{"hex":"4ca87d","operator":"RYANAIR"}"#);
    }

    #[test]
    fn test_render_tables() {
        let table = render_rows(&rows(), OutputFormat::Table).unwrap();
        assert!(table.contains("RYANAIR"));

        let markdown = render_rows(&rows(), OutputFormat::Markdown).unwrap();
        assert!(markdown.lines().next().unwrap().starts_with("| hex"));
    }

    #[test]
    fn test_or_unknown() {
        assert_eq!(or_unknown(None), "unknown");
        assert_eq!(or_unknown(Some("B738")), "B738");
    }
}
