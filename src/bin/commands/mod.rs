pub mod config;
pub mod lookup;
pub mod prune;
pub mod route;
pub mod run;
pub mod seed;
pub mod stats;

use flightboard::{EnrichmentResolver, FlightboardConfig};

/// Build the enrichment chain or exit
///
/// Storage that cannot be opened is fatal for every command that needs it.
pub(crate) fn open_resolver(config: &FlightboardConfig) -> EnrichmentResolver {
    match EnrichmentResolver::from_config(config) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("ERROR: Failed to open data in {}: {}", config.data_dir, e);
            std::process::exit(1);
        }
    }
}

/// Print rendered output, or the rendering error
pub(crate) fn print_output(output: anyhow::Result<String>) {
    match output {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}
