//! Route lens
//!
//! Diagnostics over the route cache: show a cached route, resolve one
//! through the full chain (cache then remote), prune expired entries and
//! report cache and budget statistics.

use anyhow::Result;
use chrono::Utc;
use chrono_humanize::HumanTime;
use serde::Serialize;
use tabled::Tabled;

use super::utils::{or_unknown, render_one, render_rows, OutputFormat};
use crate::database::RouteRecord;
use crate::enrich::{normalize_callsign, EnrichmentResolver};
use crate::flight::Route;

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RouteLookupResult {
    pub callsign: String,
    #[tabled(display = "display_opt")]
    pub origin: Option<String>,
    #[tabled(display = "display_opt")]
    pub destination: Option<String>,
    #[tabled(display = "display_opt")]
    pub origin_name: Option<String>,
    #[tabled(display = "display_opt")]
    pub destination_name: Option<String>,
    #[tabled(display = "display_opt")]
    pub resolved: Option<String>,
}

fn display_opt(value: &Option<String>) -> String {
    or_unknown(value.as_deref())
}

impl RouteLookupResult {
    fn new(callsign: &str, route: Option<Route>) -> Self {
        let callsign = normalize_callsign(callsign);
        match route {
            Some(route) => Self {
                callsign,
                origin: route.origin,
                destination: route.destination,
                origin_name: route.origin_name,
                destination_name: route.destination_name,
                resolved: Some(HumanTime::from(route.resolved_at - Utc::now()).to_string()),
            },
            None => Self {
                callsign,
                origin: None,
                destination: None,
                origin_name: None,
                destination_name: None,
                resolved: None,
            },
        }
    }

    pub fn is_found(&self) -> bool {
        self.resolved.is_some()
    }
}

impl From<RouteRecord> for RouteLookupResult {
    fn from(record: RouteRecord) -> Self {
        Self::new(&record.callsign, Some(record.route))
    }
}

/// Cache and session budget statistics
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RouteCacheSummary {
    pub cached_routes: u64,
    pub fresh_routes: u64,
    pub expired_routes: u64,
    pub cached_airports: u64,
    pub ttl_secs: u64,
    pub api_calls: u32,
    pub api_budget: u32,
}

pub struct RouteLens<'a> {
    resolver: &'a EnrichmentResolver,
}

impl<'a> RouteLens<'a> {
    pub fn new(resolver: &'a EnrichmentResolver) -> Self {
        Self { resolver }
    }

    /// Cached route for a callsign, without any remote call
    pub fn get(&self, callsign: &str) -> Result<RouteLookupResult> {
        let route = self.resolver.cache().get(callsign)?;
        Ok(RouteLookupResult::new(callsign, route))
    }

    /// Route for a callsign through the cache and, on a miss, the remote
    /// lookup (consumes budget)
    pub fn resolve(&self, callsign: &str) -> RouteLookupResult {
        RouteLookupResult::new(callsign, self.resolver.resolve_route_for(callsign))
    }

    /// Cached entries past their TTL
    pub fn expired(&self) -> Result<Vec<RouteLookupResult>> {
        Ok(self
            .resolver
            .cache()
            .expired()?
            .into_iter()
            .map(RouteLookupResult::from)
            .collect())
    }

    /// Delete expired entries, returning how many were removed
    pub fn prune(&self) -> Result<usize> {
        self.resolver.cache().prune_expired()
    }

    pub fn stats(&self) -> Result<RouteCacheSummary> {
        let cache = self.resolver.cache().stats()?;
        let budget = self.resolver.budget().status();
        Ok(RouteCacheSummary {
            cached_routes: cache.total,
            fresh_routes: cache.fresh,
            expired_routes: cache.expired(),
            cached_airports: cache.airports,
            ttl_secs: self.resolver.cache().ttl().num_seconds().max(0) as u64,
            api_calls: budget.consumed,
            api_budget: budget.ceiling,
        })
    }

    pub fn format_route(&self, result: &RouteLookupResult, format: OutputFormat) -> Result<String> {
        render_one(result, format)
    }

    pub fn format_routes(
        &self,
        results: &[RouteLookupResult],
        format: OutputFormat,
    ) -> Result<String> {
        render_rows(results, format)
    }

    pub fn format_stats(&self, summary: &RouteCacheSummary, format: OutputFormat) -> Result<String> {
        render_one(summary, format)
    }
}
