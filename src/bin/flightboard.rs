use clap::{Parser, Subcommand};
use flightboard::lens::utils::OutputFormat;
use flightboard::FlightboardConfig;
use tracing::Level;

mod commands;

use commands::{
    config::ConfigArgs, lookup::LookupArgs, prune::PruneArgs, route::RouteArgs, run::RunArgs,
    seed::SeedArgs, stats::StatsArgs,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.flightboard/flightboard.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured source and print every fleet snapshot
    Run(RunArgs),

    /// Rebuild the aircraft index from a CSV dataset
    Seed(SeedArgs),

    /// Look up aircraft in the index by hex identifier
    Lookup(LookupArgs),

    /// Show or resolve the route of a callsign
    Route(RouteArgs),

    /// Aircraft index and route cache statistics
    Stats(StatsArgs),

    /// Delete cached routes older than the TTL
    Prune(PruneArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let config = match FlightboardConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let format = cli.format;
    match cli.command {
        Commands::Run(args) => commands::run::run(&config, args, format),
        Commands::Seed(args) => commands::seed::run(&config, args, format),
        Commands::Lookup(args) => commands::lookup::run(&config, args, format),
        Commands::Route(args) => commands::route::run(&config, args, format),
        Commands::Stats(args) => commands::stats::run(&config, args, format),
        Commands::Prune(args) => commands::prune::run(&config, args, format),
        Commands::Config(args) => commands::config::run(&config, args, format),
    }
}
