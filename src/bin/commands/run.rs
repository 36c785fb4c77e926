use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use flightboard::lens::fleet::FleetLens;
use flightboard::lens::utils::OutputFormat;
use flightboard::{DataSource, FlightboardConfig, PollerState, Scheduler, SourceKind};
use tokio::runtime::Runtime;
use tracing::info;

use super::{open_resolver, print_output};

/// How long to wait for an abandoned blocking fetch after the loop ends
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Arguments for the Run command
#[derive(Args)]
pub struct RunArgs {
    /// Override the configured source
    #[clap(short, long, value_enum)]
    pub source: Option<SourceKind>,

    /// Poll interval in seconds (default: the source's recommendation)
    #[clap(short, long)]
    pub interval: Option<u64>,

    /// Exit after this many published snapshots
    #[clap(long)]
    pub cycles: Option<u64>,
}

pub fn run(config: &FlightboardConfig, args: RunArgs, output_format: OutputFormat) {
    let RunArgs {
        source,
        interval,
        cycles,
    } = args;

    let mut config = config.clone();
    if let Some(kind) = source {
        config.source = kind;
    }

    let data_source = match DataSource::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    let resolver = Arc::new(open_resolver(&config));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("ERROR: Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let credits_exhausted = runtime.block_on(async move {
        let mut scheduler = Scheduler::new(data_source, resolver.clone())
            .with_area(config.reference_area());
        if let Some(secs) = interval.map(Duration::from_secs).or(config.poll_interval()) {
            scheduler = scheduler.with_interval(secs);
        }

        let mut snapshots = scheduler.subscribe();
        let states = scheduler.watch_state();
        let shutdown = scheduler.shutdown_token();
        let handle = scheduler.start();
        let lens = FleetLens::new();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, shutting down");
                    shutdown.cancel();
                    break;
                }
                changed = snapshots.changed() => {
                    // Sender dropped: the poller stopped on its own
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    print_output(lens.format_snapshot(&snapshot, output_format));
                    if cycles.is_some_and(|n| snapshot.cycle >= n) {
                        shutdown.cancel();
                        break;
                    }
                }
            }
        }

        if let Err(e) = handle.await {
            eprintln!("ERROR: poller task failed: {}", e);
        }

        let stats = resolver.stats();
        info!(
            "session: {} cache hits, {} remote routes found, {} not found, {} failed, {} airports named, {}/{} API calls used",
            stats.cache_hits,
            stats.remote_found,
            stats.remote_not_found,
            stats.remote_failed,
            stats.airports_found,
            stats.budget.consumed,
            stats.budget.ceiling
        );

        let stopped = *states.borrow() == PollerState::Stopped;
        stopped && !shutdown.is_cancelled()
    });

    shutdown_runtime(runtime);

    if credits_exhausted {
        eprintln!("Polling stopped: source credits exhausted");
        std::process::exit(2);
    }
}

/// Drop the runtime without waiting out a fetch still blocked on the network
fn shutdown_runtime(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}
