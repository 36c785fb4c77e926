use clap::Args;
use flightboard::enrich::AircraftIndex;
use flightboard::lens::aircraft::{AircraftLens, AircraftLookupResult};
use flightboard::lens::utils::{render_rows, OutputFormat};
use flightboard::FlightboardConfig;

use super::print_output;

/// Arguments for the Lookup command
#[derive(Args)]
pub struct LookupArgs {
    /// One or more hex identifiers, e.g. 4ca87d
    #[clap(required = true)]
    pub hexes: Vec<String>,
}

pub fn run(config: &FlightboardConfig, args: LookupArgs, output_format: OutputFormat) {
    let LookupArgs { hexes } = args;

    let index = match AircraftIndex::open(&config.data_dir) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("ERROR: Failed to open aircraft index: {}", e);
            std::process::exit(1);
        }
    };
    let lens = AircraftLens::new(&index);

    if lens.needs_seed() && !output_format.is_json() {
        eprintln!("Aircraft index is empty, run `flightboard seed` first");
    }

    let mut results: Vec<AircraftLookupResult> = Vec::new();
    for hex in &hexes {
        match lens.lookup(hex) {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {
                if !output_format.is_json() {
                    eprintln!("{}: not in the aircraft index", hex.trim());
                }
            }
            Err(e) => {
                eprintln!("ERROR: Lookup of {} failed: {}", hex, e);
                std::process::exit(1);
            }
        }
    }

    if results.is_empty() && !output_format.is_json() {
        return;
    }
    print_output(render_rows(&results, output_format));
}
