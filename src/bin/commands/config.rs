use clap::Args;
use flightboard::lens::utils::OutputFormat;
use flightboard::FlightboardConfig;
use serde::Serialize;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also show database file details
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: String,
    #[serde(flatten)]
    settings: &'a FlightboardConfig,
    database: DatabaseInfo,
}

#[derive(Debug, Serialize)]
struct DatabaseInfo {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

pub fn run(config: &FlightboardConfig, args: ConfigArgs, output_format: OutputFormat) {
    let ConfigArgs { verbose } = args;

    let sqlite_path = config.sqlite_path();
    let exists = Path::new(&sqlite_path).exists();
    let size_bytes = if exists {
        std::fs::metadata(&sqlite_path).ok().map(|m| m.len())
    } else {
        None
    };

    let info = ConfigInfo {
        config_file: FlightboardConfig::config_file_path(),
        settings: config,
        database: DatabaseInfo {
            path: sqlite_path,
            exists,
            size_bytes,
        },
    };

    if output_format.is_json() {
        let text = if output_format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(&info)
        } else {
            serde_json::to_string(&info)
        };
        match text {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        }
        return;
    }

    println!("Config File:        {}", info.config_file);
    println!("{}", config.summary());

    if verbose {
        println!();
        println!(
            "Database File:      {}",
            if info.database.exists {
                "present"
            } else {
                "not created yet"
            }
        );
        if let Some(size) = info.database.size_bytes {
            println!("Database Size:      {}", format_size(size));
        }
    }
}

/// Format bytes as human-readable size
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
