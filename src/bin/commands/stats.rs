use clap::Args;
use flightboard::lens::aircraft::AircraftLens;
use flightboard::lens::route::RouteLens;
use flightboard::lens::utils::OutputFormat;
use flightboard::FlightboardConfig;
use serde_json::json;

use super::{open_resolver, print_output};

/// Arguments for the Stats command
#[derive(Args)]
pub struct StatsArgs {
    /// Only show aircraft index statistics
    #[clap(long)]
    pub index_only: bool,
}

pub fn run(config: &FlightboardConfig, args: StatsArgs, output_format: OutputFormat) {
    let StatsArgs { index_only } = args;

    let resolver = open_resolver(config);
    let aircraft = AircraftLens::new(resolver.index());
    let routes = RouteLens::new(&resolver);

    let index_summary = match aircraft.stats() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: Failed to read aircraft index statistics: {}", e);
            std::process::exit(1);
        }
    };
    let route_summary = if index_only {
        None
    } else {
        match routes.stats() {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("ERROR: Failed to read route cache statistics: {}", e);
                std::process::exit(1);
            }
        }
    };

    if output_format.is_json() {
        let value = json!({
            "aircraft_index": index_summary,
            "route_cache": route_summary,
        });
        let text = if output_format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        print_output(text.map_err(anyhow::Error::from));
        return;
    }

    if output_format.is_table() {
        println!("Aircraft index:");
    }
    print_output(aircraft.format_stats(&index_summary, output_format));

    if let Some(summary) = route_summary {
        if output_format.is_table() {
            println!("\nRoute cache:");
        }
        print_output(routes.format_stats(&summary, output_format));
    }
}
