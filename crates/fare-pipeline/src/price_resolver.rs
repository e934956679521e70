//! Stage 2: fee quote and all-in price per flight.

use tracing::debug;
use wingo_client::FetchError;
use wingo_client::date::format_date;
use wingo_client::models::{FlightService, Route, Service, ServiceQuote};

use crate::availability::PriceTask;
use crate::context::RunContext;
use crate::snapshot::ResolvedFlight;

/// Quote the fees of one flight and attach them to it.
///
/// With the fee cache enabled, the first quote of a route is reused for every
/// later flight of the same route.
pub async fn resolve_price(ctx: &RunContext, task: PriceTask) -> Result<ResolvedFlight, FetchError> {
    let route = Route::new(&task.origin, &task.destination);

    let services = match ctx.fee_cache().and_then(|cache| cache.get(&route)) {
        Some(services) => {
            debug!(route = %route, flight_number = %task.flight.flight_number, "Fee quote served from cache");
            services
        }
        None => {
            let services = quote_services(ctx, &task).await?;
            if let Some(cache) = ctx.fee_cache() {
                cache.insert(route, services.clone());
            }
            services
        }
    };

    Ok(ResolvedFlight {
        origin: task.origin,
        destination: task.destination,
        date: task.date,
        flight: task.flight,
        services,
    })
}

async fn quote_services(ctx: &RunContext, task: &PriceTask) -> Result<Vec<Service>, FetchError> {
    let request = [FlightService {
        departure: format_date(task.date),
        from: task.origin.clone(),
        to: task.destination.clone(),
        flight_id: task.flight.logical_flight_id,
    }];

    let quotes = ctx
        .source
        .service_quotes(&request, &task.session_token, &ctx.token)
        .await?;

    Ok(services_for(quotes, task.flight.logical_flight_id))
}

/// Services of the quote matching `flight_id`, falling back to the first one.
fn services_for(quotes: Vec<ServiceQuote>, flight_id: i64) -> Vec<Service> {
    let mut quotes = quotes.into_iter();
    let Some(first) = quotes.next() else {
        return Vec::new();
    };
    if first.flight_id == flight_id {
        return first.services;
    }
    quotes
        .find(|quote| quote.flight_id == flight_id)
        .unwrap_or(first)
        .services
}
