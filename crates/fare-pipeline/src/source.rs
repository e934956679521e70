//! The upstream calls the pipeline depends on.
//!
//! Stages talk to a [`FareSource`] rather than to [`WingoClient`] directly so a
//! run can be driven by a scripted source in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use wingo_client::models::{FlightService, FlightsInformation, ServiceQuote};
use wingo_client::{FetchError, WingoClient};

#[async_trait]
pub trait FareSource: Send + Sync {
    /// Flights of one route for `days_after` days from `start_date`.
    async fn monthly_availability(
        &self,
        origin: &str,
        destination: &str,
        start_date: NaiveDate,
        days_after: u32,
        token: &CancellationToken,
    ) -> Result<FlightsInformation, FetchError>;

    /// Fee quotes for the given flights.
    async fn service_quotes(
        &self,
        flights: &[FlightService],
        session_token: &str,
        token: &CancellationToken,
    ) -> Result<Vec<ServiceQuote>, FetchError>;

    /// Upstream calls issued so far.
    fn request_count(&self) -> u64;
}

#[async_trait]
impl FareSource for WingoClient {
    async fn monthly_availability(
        &self,
        origin: &str,
        destination: &str,
        start_date: NaiveDate,
        days_after: u32,
        token: &CancellationToken,
    ) -> Result<FlightsInformation, FetchError> {
        WingoClient::monthly_availability(self, origin, destination, start_date, days_after, token)
            .await
    }

    async fn service_quotes(
        &self,
        flights: &[FlightService],
        session_token: &str,
        token: &CancellationToken,
    ) -> Result<Vec<ServiceQuote>, FetchError> {
        self.retrieve_service_quotes(flights, session_token, token)
            .await
    }

    fn request_count(&self) -> u64 {
        WingoClient::request_count(self)
    }
}
