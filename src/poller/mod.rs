//! Poll loop
//!
//! Drives one [`PositionSource`] on its interval, normalizes the reports,
//! enriches them and publishes the result as a new [`FleetSnapshot`].
//!
//! The loop is a small state machine:
//!
//! ```text
//!            Tick                 FetchFailed
//!   Idle ───────────▶ Polling ─────────────────▶ Backoff
//!    ▲                 │   ▲                        │
//!    └─FetchSucceeded──┘   └──────DelayElapsed──────┘
//!
//!   any state ──Shutdown / CreditsExhausted──▶ Stopped
//! ```
//!
//! Snapshots are replaced whole through a `watch` channel, so readers see
//! either the previous snapshot or the new one. A failed poll publishes
//! nothing and the previous snapshot stays current.

mod normalize;

pub use normalize::{
    normalize, normalize_batch, within_area, MIN_AIRBORNE_ALTITUDE_FT, MIN_AIRBORNE_SPEED_KT,
};

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::enrich::EnrichmentResolver;
use crate::flight::FleetSnapshot;
use crate::sources::{PositionSource, ReferenceArea, SourceError};

/// Shortest accepted poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Longest delay between retries (5 minutes)
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Exponential backoff: 2^n seconds, capped at [`MAX_BACKOFF`]
pub fn calculate_backoff(consecutive_failures: u32) -> Duration {
    let secs = 2u64.saturating_pow(consecutive_failures.min(20));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollerState {
    /// Waiting for the next tick
    Idle,
    /// A fetch is in progress; `failures` counts the failures before it
    Polling { failures: u32 },
    /// Waiting `delay` before retrying
    Backoff { delay: Duration, failures: u32 },
    /// Terminal
    Stopped,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerState::Idle => write!(f, "idle"),
            PollerState::Polling { .. } => write!(f, "polling"),
            PollerState::Backoff { delay, failures } => {
                write!(f, "backoff ({}s after {} failures)", delay.as_secs(), failures)
            }
            PollerState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PollEvent<'a> {
    Tick,
    FetchSucceeded,
    FetchFailed(&'a SourceError),
    DelayElapsed,
    Shutdown,
}

impl PollerState {
    /// Next state after `event`
    ///
    /// `rate_limit_delay` is the source's wait after a rate-limit response
    /// without a retry hint. Events that do not apply to the current state
    /// leave it unchanged.
    pub fn next(self, event: PollEvent<'_>, rate_limit_delay: Duration) -> PollerState {
        use PollerState::*;

        match (self, event) {
            (Stopped, _) | (_, PollEvent::Shutdown) => Stopped,
            (Idle, PollEvent::Tick) => Polling { failures: 0 },
            (Polling { .. }, PollEvent::FetchSucceeded) => Idle,
            (Polling { failures }, PollEvent::FetchFailed(err)) => {
                let failures = failures.saturating_add(1);
                match err {
                    SourceError::CreditsExhausted => Stopped,
                    SourceError::RateLimited { retry_after } => Backoff {
                        delay: retry_after
                            .unwrap_or(rate_limit_delay)
                            .max(calculate_backoff(failures)),
                        failures,
                    },
                    SourceError::Unavailable { .. } => Backoff {
                        delay: calculate_backoff(failures),
                        failures,
                    },
                }
            }
            (Backoff { failures, .. }, PollEvent::DelayElapsed) => Polling { failures },
            (state, _) => state,
        }
    }
}

/// Drives a source and publishes snapshots
pub struct Scheduler<S: PositionSource + 'static> {
    source: Arc<S>,
    resolver: Arc<EnrichmentResolver>,
    interval: Duration,
    area: Option<ReferenceArea>,
    snapshot_tx: watch::Sender<Arc<FleetSnapshot>>,
    state_tx: watch::Sender<PollerState>,
    shutdown: CancellationToken,
}

impl<S: PositionSource + 'static> Scheduler<S> {
    /// Create a scheduler polling at the source's recommended interval
    pub fn new(source: S, resolver: Arc<EnrichmentResolver>) -> Self {
        let interval = source.recommended_poll_interval();
        let (snapshot_tx, _) = watch::channel(Arc::new(FleetSnapshot {
            source: source.name().to_string(),
            ..Default::default()
        }));
        let (state_tx, _) = watch::channel(PollerState::Idle);

        Self {
            source: Arc::new(source),
            resolver,
            interval,
            area: None,
            snapshot_tx,
            state_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the poll interval
    ///
    /// Rate-limited sources never poll faster than they recommend, and no
    /// source polls faster than [`MIN_POLL_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let floor = self.source.recommended_poll_interval();
        if self.source.is_rate_limited() && interval < floor {
            warn!(
                "{}: poll interval {}s is below the source limit, using {}s",
                self.source.name(),
                interval.as_secs(),
                floor.as_secs()
            );
            self.interval = floor;
        } else {
            self.interval = interval;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Only publish aircraft within `area`, nearest first
    ///
    /// Out-of-area reports are dropped before enrichment, so they never
    /// cost a remote lookup. Sources that do not honor the radius are only
    /// sorted.
    pub fn with_area(mut self, area: ReferenceArea) -> Self {
        self.area = Some(area);
        self
    }

    /// Receiver for published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<FleetSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Receiver for state changes
    pub fn watch_state(&self) -> watch::Receiver<PollerState> {
        self.state_tx.subscribe()
    }

    /// Token that stops the loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the loop as a task
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the loop until shutdown or a terminal source error
    pub async fn run(self) {
        let name = self.source.name().to_string();
        let rate_limit_delay = self.source.rate_limit_delay();
        info!(
            "{}: poller started, interval {}s",
            name,
            self.interval.as_secs()
        );

        let mut state = PollerState::Idle;
        let mut next_poll = Instant::now();
        let mut cycle: u64 = 0;

        loop {
            let event_state = match state {
                PollerState::Idle => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => state.next(PollEvent::Shutdown, rate_limit_delay),
                        _ = tokio::time::sleep_until(next_poll) => state.next(PollEvent::Tick, rate_limit_delay),
                    }
                }
                PollerState::Polling { .. } => {
                    next_poll = Instant::now() + self.interval;
                    tokio::select! {
                        // An in-flight fetch is abandoned, not interrupted
                        _ = self.shutdown.cancelled() => state.next(PollEvent::Shutdown, rate_limit_delay),
                        result = self.poll_once(cycle + 1) => match result {
                            Ok(snapshot) => {
                                cycle += 1;
                                self.snapshot_tx.send_replace(Arc::new(snapshot));
                                state.next(PollEvent::FetchSucceeded, rate_limit_delay)
                            }
                            Err(err) => {
                                let next = state.next(PollEvent::FetchFailed(&err), rate_limit_delay);
                                match &err {
                                    SourceError::CreditsExhausted => {
                                        error!("{}: credits exhausted, polling stopped", name)
                                    }
                                    _ => warn!("{}: poll failed: {}; {}", name, err, next),
                                }
                                next
                            }
                        },
                    }
                }
                PollerState::Backoff { delay, .. } => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => state.next(PollEvent::Shutdown, rate_limit_delay),
                        _ = tokio::time::sleep(delay) => state.next(PollEvent::DelayElapsed, rate_limit_delay),
                    }
                }
                PollerState::Stopped => break,
            };

            if event_state != state {
                debug!("{}: {} -> {}", name, state, event_state);
                state = event_state;
                self.state_tx.send_replace(state);
            }
        }

        info!("{}: poller stopped after {} cycles", name, cycle);
    }

    /// Fetch, normalize and enrich one batch off the async runtime
    async fn poll_once(&self, cycle: u64) -> Result<FleetSnapshot, SourceError> {
        let source = self.source.clone();
        let resolver = self.resolver.clone();
        let area = self.area;

        tokio::task::spawn_blocking(move || {
            let reports = source.fetch()?;
            let received = reports.len();
            let mut positions = normalize_batch(reports);
            if let Some(area) = area {
                let area = if source.honors_radius() {
                    area
                } else {
                    area.unbounded()
                };
                positions = within_area(positions, &area);
            }
            let kept = positions.len();
            let flights = resolver.enrich_batch(positions);

            let budget = resolver.budget().status();
            info!(
                "{}: cycle {}: {} flights ({} reports dropped), remote budget {}/{}",
                source.name(),
                cycle,
                kept,
                received - kept,
                budget.consumed,
                budget.ceiling
            );

            Ok(FleetSnapshot {
                source: source.name().to_string(),
                cycle,
                polled_at: Some(Utc::now()),
                flights,
            })
        })
        .await
        .map_err(|e| SourceError::unavailable(format!("poll task failed: {}", e)))?
    }
}
