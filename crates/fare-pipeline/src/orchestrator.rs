//! Wiring of the stages into one run.
//!
//! ```text
//! window_tasks ─▶ [availability] ─▶ [price] ─▶ [archive] ─▶ actual
//!                                                            │
//!                                          previous ─▶ diff ◀┘
//! ```
//!
//! Every pool is spawned before the generator starts feeding. Each pool holds
//! the only senders of the next channel, so a stage closes as soon as the one
//! before it has drained. The diff runs only after the archive pool exits.
//! Previous flights are only compared when this run re-checked them: their
//! route window resolved and their own fee quote succeeded.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wingo_client::FetchError;
use wingo_client::models::Route;

use crate::archiver::{SharedSnapshot, archive};
use crate::availability::{PriceTask, resolve_window};
use crate::context::{RunContext, RunStats, RunSummary};
use crate::diff::{ChangeEvent, diff};
use crate::error::{PipelineError, Result};
use crate::price_resolver::resolve_price;
use crate::snapshot::{FlightKey, ResolvedFlight, Snapshot};
use crate::window::{DateWindow, WindowTask, window_tasks};
use crate::worker_pool::WorkerPool;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub actual: Snapshot,
    pub events: Vec<ChangeEvent>,
    pub summary: RunSummary,
}

/// Fetch, price and archive every flight of `routes` within `window`, then
/// compare the result with `previous`.
///
/// Failures of a single route window, flight or archive write are logged,
/// counted in the summary and skipped. Only invalid configuration,
/// cancellation and crashed workers fail the run.
pub async fn run_pipeline(
    ctx: &RunContext,
    routes: &[Route],
    window: DateWindow,
    previous: &Snapshot,
) -> Result<RunOutcome> {
    ctx.config.validate()?;
    if window.is_empty() {
        return Err(PipelineError::config(format!("run window {window} is empty")));
    }

    let started = Instant::now();
    let capacity = ctx.config.channel_capacity;
    let actual = SharedSnapshot::default();

    info!(
        routes = routes.len(),
        window = %window,
        previous = previous.len(),
        "Starting pipeline run"
    );

    let (window_tx, window_rx) = mpsc::channel::<WindowTask>(capacity);
    let (price_tx, price_rx) = mpsc::channel::<PriceTask>(capacity);
    let (archive_tx, archive_rx) = mpsc::channel::<ResolvedFlight>(capacity);

    let archive_pool = WorkerPool::spawn(
        "archive",
        ctx.config.archive_workers,
        archive_rx,
        ctx.token.clone(),
        {
            let ctx = ctx.clone();
            let actual = actual.clone();
            move |flight: ResolvedFlight| {
                let ctx = ctx.clone();
                let actual = actual.clone();
                async move { archive(&ctx, &actual, flight).await }
            }
        },
    );

    let price_pool = WorkerPool::spawn(
        "price",
        ctx.config.price_workers,
        price_rx,
        ctx.token.clone(),
        {
            let ctx = ctx.clone();
            move |task: PriceTask| {
                let ctx = ctx.clone();
                let archive_tx = archive_tx.clone();
                async move { price_flight(&ctx, task, &archive_tx).await }
            }
        },
    );

    let availability_pool = WorkerPool::spawn(
        "availability",
        ctx.config.availability_workers,
        window_rx,
        ctx.token.clone(),
        {
            let ctx = ctx.clone();
            move |task: WindowTask| {
                let ctx = ctx.clone();
                let price_tx = price_tx.clone();
                async move { expand_window(&ctx, task, &price_tx).await }
            }
        },
    );

    for task in window_tasks(routes, window) {
        let sent = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => false,
            sent = window_tx.send(task) => sent.is_ok(),
        };
        if !sent {
            break;
        }
    }
    drop(window_tx);

    availability_pool.join().await?;
    price_pool.join().await?;
    archive_pool.join().await?;

    if ctx.is_cancelled() {
        warn!("Pipeline run cancelled before completion");
        return Err(PipelineError::Cancelled);
    }

    let actual = actual.take();
    let checked = ctx.coverage.scope(previous);
    if checked.len() < previous.len() {
        debug!(
            previous = previous.len(),
            checked = checked.len(),
            "Previous flights outside the fetched units are left untouched"
        );
    }
    let events = diff(&checked, &actual);

    if ctx.config.prune_unavailable {
        prune_unavailable(ctx, &events).await;
    }

    let summary = ctx.summary(routes.len(), events.len(), started.elapsed());
    info!(
        routes = summary.routes,
        windows = summary.windows,
        windows_failed = summary.windows_failed,
        flights_resolved = summary.flights_resolved,
        flights_failed = summary.flights_failed,
        archive_failures = summary.archive_failures,
        events = summary.events,
        requests = summary.requests,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Pipeline run finished"
    );

    Ok(RunOutcome {
        actual,
        events,
        summary,
    })
}

async fn expand_window(ctx: &RunContext, task: WindowTask, price_tx: &mpsc::Sender<PriceTask>) {
    RunStats::incr(&ctx.stats.windows);

    let tasks = match resolve_window(ctx, &task).await {
        Ok(tasks) => tasks,
        Err(FetchError::Cancelled) => {
            debug!(route = %task.route, window = %task.window, "Availability fetch cancelled");
            return;
        }
        Err(e) => {
            RunStats::incr(&ctx.stats.windows_failed);
            warn!(route = %task.route, window = %task.window, error = %e, "Failed to fetch availability");
            return;
        }
    };

    debug!(route = %task.route, window = %task.window, flights = tasks.len(), "Availability resolved");
    ctx.coverage.window_resolved(task.route.clone(), task.window);
    for price_task in tasks {
        if price_tx.send(price_task).await.is_err() {
            // Downstream is gone, the run is being torn down.
            return;
        }
    }
}

async fn price_flight(
    ctx: &RunContext,
    task: PriceTask,
    archive_tx: &mpsc::Sender<ResolvedFlight>,
) {
    let key = FlightKey::new(
        &task.origin,
        &task.destination,
        task.date,
        &task.flight.flight_number,
    );

    match resolve_price(ctx, task).await {
        Ok(flight) => {
            if archive_tx.send(flight).await.is_ok() {
                RunStats::incr(&ctx.stats.flights_resolved);
            } else {
                warn!(key = %key, "Archive stage closed, dropping resolved flight");
            }
        }
        Err(FetchError::Cancelled) => {
            debug!(key = %key, "Fee quote cancelled");
        }
        Err(e) => {
            RunStats::incr(&ctx.stats.flights_failed);
            warn!(key = %key, error = %e, "Failed to quote fees");
            ctx.coverage.flight_failed(key);
        }
    }
}

async fn prune_unavailable(ctx: &RunContext, events: &[ChangeEvent]) {
    for event in events {
        if let ChangeEvent::Unavailable { key, .. } = event
            && let Err(e) = ctx.store.delete(&key.storage_path()).await
        {
            warn!(key = %key, error = %e, "Failed to remove stale record");
        }
    }
}
