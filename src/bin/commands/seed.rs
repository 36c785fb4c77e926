use std::time::Duration;

use clap::Args;
use flightboard::enrich::{AircraftIndex, OPENSKY_AIRCRAFT_DB_URL};
use flightboard::lens::aircraft::AircraftLens;
use flightboard::lens::utils::OutputFormat;
use flightboard::FlightboardConfig;
use serde_json::json;

use super::print_output;

/// Arguments for the Seed command
#[derive(Args)]
pub struct SeedArgs {
    /// CSV dataset to import (local path or URL), default: OpenSky aircraft database
    #[clap(long)]
    pub from: Option<String>,
}

pub fn run(config: &FlightboardConfig, args: SeedArgs, output_format: OutputFormat) {
    let SeedArgs { from } = args;

    let index = match AircraftIndex::open(&config.data_dir) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("ERROR: Failed to open aircraft index: {}", e);
            std::process::exit(1);
        }
    };
    let lens = AircraftLens::new(&index);

    let source = from.as_deref().unwrap_or(OPENSKY_AIRCRAFT_DB_URL);
    let pb = if output_format.is_json() {
        None
    } else {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_message(format!("Importing aircraft from {}", source));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let result = lens.seed(Some(source));
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    match result {
        Ok(summary) => {
            if output_format.is_json() {
                print_output(
                    serde_json::to_string(&json!(summary)).map_err(anyhow::Error::from),
                );
            } else {
                println!(
                    "Aircraft index seeded: {} entries imported, {} rows skipped",
                    summary.imported, summary.skipped
                );
            }
        }
        Err(e) => {
            eprintln!("ERROR: Seed failed, existing index kept: {}", e);
            std::process::exit(1);
        }
    }
}
