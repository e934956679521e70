//! Stage 1: monthly availability per route window.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};
use wingo_client::FetchError;
use wingo_client::date::parse_date;
use wingo_client::models::{DailyFlights, Flight, FlightsInformation};
use wingo_client::pricing::base_fare;

use crate::context::RunContext;
use crate::window::WindowTask;

/// One flight waiting for its fee quote.
#[derive(Debug, Clone)]
pub struct PriceTask {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub flight: Flight,
    /// Session token of the availability call, required for fee quotes.
    pub session_token: Arc<str>,
}

/// Fetch the availability of one route window and turn every offered flight
/// into a [`PriceTask`].
pub async fn resolve_window(
    ctx: &RunContext,
    task: &WindowTask,
) -> Result<Vec<PriceTask>, FetchError> {
    let WindowTask { route, window } = task;
    let info = ctx
        .source
        .monthly_availability(
            &route.origin,
            &route.destination,
            window.start,
            window.days(),
            &ctx.token,
        )
        .await?;

    Ok(price_tasks(task, info))
}

/// Flights of `info` that are offered and dated inside the task's window.
pub fn price_tasks(task: &WindowTask, info: FlightsInformation) -> Vec<PriceTask> {
    let WindowTask { route, window } = task;
    let session_token: Arc<str> = Arc::from(info.token);
    let mut tasks = Vec::new();

    for day in info.outbound {
        let Some(date) = day_date(&day) else {
            warn!(route = %route, raw = %day.date, "Skipping availability day with unparseable date");
            continue;
        };
        if !window.contains(date) {
            debug!(route = %route, %date, window = %window, "Skipping day outside requested window");
            continue;
        }

        for flight in day.info.flights {
            // Zero-priced entries are placeholders for flights not on sale.
            if base_fare(&flight) == 0.0 {
                debug!(
                    route = %route,
                    %date,
                    flight_number = %flight.flight_number,
                    "Skipping flight without fare"
                );
                continue;
            }

            tasks.push(PriceTask {
                origin: route.origin.clone(),
                destination: route.destination.clone(),
                date,
                flight,
                session_token: Arc::clone(&session_token),
            });
        }
    }

    tasks
}

fn day_date(day: &DailyFlights) -> Option<NaiveDate> {
    parse_date(&day.date)
        .or_else(|_| parse_date(&day.info.date))
        .ok()
}
