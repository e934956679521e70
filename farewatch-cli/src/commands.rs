use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Months, NaiveDate};
use colored::Colorize;
use fare_pipeline::{
    ChangeEvent, DateWindow, FsSnapshotStore, LogNotifier, RunContext, RunSummary, format_money,
    load_snapshot, notify_all, run_pipeline,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wingo_client::WingoClient;
use wingo_client::models::{Airport, Route, route_pairs};

use crate::config::AppConfig;

const ROUTES_CACHE_FILE: &str = "routes.json";
const FLIGHTS_DIR: &str = "flights";

pub struct RunOptions {
    pub months: u32,
    pub start_months: u32,
    pub data_dir: Option<PathBuf>,
    pub routes_dir: Option<PathBuf>,
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub events_json: bool,
}

/// Runs commands against one configured client.
pub struct CommandExecutor {
    config: AppConfig,
    client: Arc<WingoClient>,
    token: CancellationToken,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, token: CancellationToken) -> anyhow::Result<Self> {
        let client = WingoClient::new(&config.client).context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            client: Arc::new(client),
            token,
        })
    }

    pub async fn run(&self, options: RunOptions) -> anyhow::Result<()> {
        let data_dir = self.config.data_dir(options.data_dir.as_deref());
        let routes_dir = options.routes_dir.clone().unwrap_or_else(|| data_dir.clone());

        let start = today()
            .checked_add_months(Months::new(options.start_months))
            .context("Start date out of range")?;
        let window = DateWindow::months_from(start, options.months).context("End date out of range")?;

        let listing = self.route_listing(&routes_dir).await?;
        let routes = filter_routes(route_pairs(&listing), &options.origins, &options.destinations);
        if routes.is_empty() {
            warn!("No routes match the requested origins and destinations");
            return Ok(());
        }

        let store = Arc::new(FsSnapshotStore::new(data_dir.join(FLIGHTS_DIR)));
        let previous = load_snapshot(store.as_ref(), Some(&window))
            .await
            .with_context(|| format!("Failed to load previous snapshot from {}", store.root().display()))?;

        let ctx = RunContext::new(
            self.client.clone(),
            store,
            self.config.pipeline.clone(),
            self.token.clone(),
        );
        let outcome = run_pipeline(&ctx, &routes, window, &previous).await?;

        notify_all(&LogNotifier, &outcome.events).await;
        if options.events_json {
            for event in &outcome.events {
                println!("{}", serde_json::to_string(event)?);
            }
        } else {
            print_events(&outcome.events);
        }
        print_summary(&outcome.summary);
        Ok(())
    }

    pub async fn routes(&self, routes_dir: Option<&Path>) -> anyhow::Result<()> {
        let routes_dir = routes_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.data_dir(None));
        let listing = self.route_listing(&routes_dir).await?;

        for airport in &listing {
            let destinations: Vec<_> = airport.routes.iter().map(|d| d.code.as_str()).collect();
            println!(
                "{} {:<30} → {}",
                airport.code.bold(),
                airport.name,
                destinations.join(", ")
            );
        }
        println!("\n{} routes", route_pairs(&listing).len());
        Ok(())
    }

    pub async fn schedule(&self, origin: &str, destination: &str, months: u32) -> anyhow::Result<()> {
        let start = today();
        let end = start
            .checked_add_months(Months::new(months))
            .context("End date out of range")?;

        let schedule = self
            .client
            .flight_schedule(origin, destination, start, end, &self.token)
            .await
            .with_context(|| format!("Failed to fetch schedule for {origin}-{destination}"))?;

        for flight in &schedule.flight_information {
            println!(
                "{:>6}  {} → {}  {} - {}  ({} to {})",
                flight.normalized_flight_number().bold(),
                flight.origin,
                flight.destination,
                flight.departure_time,
                flight.arrival_time,
                flight.effective_date,
                flight.discontinue_date
            );
        }
        info!(flights = schedule.flight_information.len(), "Schedule fetched");
        Ok(())
    }

    async fn route_listing(&self, routes_dir: &Path) -> anyhow::Result<Vec<Airport>> {
        let cache = routes_dir.join(ROUTES_CACHE_FILE);
        self.client
            .routes_with_cache(&cache, &self.token)
            .await
            .with_context(|| format!("Failed to load route listing (cache {})", cache.display()))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Keep routes whose origin and destination are in the given lists; an empty
/// list matches everything.
pub fn filter_routes(routes: Vec<Route>, origins: &[String], destinations: &[String]) -> Vec<Route> {
    let matches = |wanted: &[String], code: &str| {
        wanted.is_empty() || wanted.iter().any(|w| w.eq_ignore_ascii_case(code))
    };
    routes
        .into_iter()
        .filter(|route| matches(origins, &route.origin) && matches(destinations, &route.destination))
        .collect()
}

fn print_events(events: &[ChangeEvent]) {
    for event in events {
        let key = event.key();
        let flight = format!(
            "{}-{} {} #{}",
            key.origin, key.destination, key.date, key.flight_number
        );
        let line = match event {
            ChangeEvent::NewFlight { price, .. } => {
                format!("{} {flight} {}", "NEW".green().bold(), format_money(*price))
            }
            ChangeEvent::PriceChanged {
                old_price,
                new_price,
                ..
            } => {
                let tag = if event.is_increase() {
                    "UP".red().bold()
                } else {
                    "DOWN".green().bold()
                };
                format!(
                    "{tag} {flight} {} → {}",
                    format_money(*old_price),
                    format_money(*new_price)
                )
            }
            ChangeEvent::Unavailable { last_price, .. } => {
                format!(
                    "{} {flight} (was {})",
                    "GONE".yellow().bold(),
                    format_money(*last_price)
                )
            }
        };
        println!("{line}");
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "\n{} {} routes, {} windows ({} failed), {} flights ({} failed), {} archive failures, {} events, {} requests in {:.1}s",
        "Summary:".bold(),
        summary.routes,
        summary.windows,
        summary.windows_failed,
        summary.flights_resolved,
        summary.flights_failed,
        summary.archive_failures,
        summary.events,
        summary.requests,
        summary.elapsed.as_secs_f64()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_filter_matches_case_insensitively() {
        let routes = vec![
            Route::new("BOG", "HAV"),
            Route::new("BOG", "CUN"),
            Route::new("MDE", "HAV"),
        ];

        let filtered = filter_routes(routes.clone(), &["bog".to_owned()], &[]);
        assert_eq!(filtered, vec![Route::new("BOG", "HAV"), Route::new("BOG", "CUN")]);

        let filtered = filter_routes(routes.clone(), &[], &["HAV".to_owned()]);
        assert_eq!(filtered, vec![Route::new("BOG", "HAV"), Route::new("MDE", "HAV")]);

        assert_eq!(filter_routes(routes.clone(), &[], &[]), routes);
    }
}
