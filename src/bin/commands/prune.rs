use clap::Args;
use flightboard::lens::route::RouteLens;
use flightboard::lens::utils::OutputFormat;
use flightboard::FlightboardConfig;

use super::{open_resolver, print_output};

/// Arguments for the Prune command
#[derive(Args)]
pub struct PruneArgs {
    /// List expired routes without deleting them
    #[clap(long)]
    pub dry_run: bool,
}

pub fn run(config: &FlightboardConfig, args: PruneArgs, output_format: OutputFormat) {
    let PruneArgs { dry_run } = args;

    let resolver = open_resolver(config);
    let lens = RouteLens::new(&resolver);

    if dry_run {
        match lens.expired() {
            Ok(expired) => print_output(lens.format_routes(&expired, output_format)),
            Err(e) => {
                eprintln!("ERROR: Failed to list expired routes: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    match lens.prune() {
        Ok(removed) => {
            if output_format.is_json() {
                println!("{{\"removed\":{}}}", removed);
            } else {
                println!("Removed {} expired routes", removed);
            }
        }
        Err(e) => {
            eprintln!("ERROR: Failed to prune route cache: {}", e);
            std::process::exit(1);
        }
    }
}
