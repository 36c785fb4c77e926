use clap::Args;
use flightboard::lens::route::RouteLens;
use flightboard::lens::utils::OutputFormat;
use flightboard::FlightboardConfig;

use super::{open_resolver, print_output};

/// Arguments for the Route command
#[derive(Args)]
pub struct RouteArgs {
    /// One or more callsigns, e.g. RYR4421
    #[clap(required = true)]
    pub callsigns: Vec<String>,

    /// Query the remote route service on a cache miss (uses API budget)
    #[clap(short, long)]
    pub resolve: bool,
}

pub fn run(config: &FlightboardConfig, args: RouteArgs, output_format: OutputFormat) {
    let RouteArgs { callsigns, resolve } = args;

    let resolver = open_resolver(config);
    let lens = RouteLens::new(&resolver);

    let mut results = Vec::with_capacity(callsigns.len());
    for callsign in &callsigns {
        if resolve {
            results.push(lens.resolve(callsign));
            continue;
        }
        match lens.get(callsign) {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("ERROR: Route cache lookup failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    print_output(lens.format_routes(&results, output_format));

    if resolve && !output_format.is_json() {
        let budget = resolver.budget().status();
        println!(
            "API calls used: {}/{}",
            budget.consumed, budget.ceiling
        );
    }
}
