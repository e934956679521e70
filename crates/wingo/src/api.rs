use std::path::Path;

use chrono::{Days, NaiveDate};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{ClientConfig, Endpoints};
use crate::date::format_date;
use crate::fetch::{FetchClient, FetchRequest};
use crate::models::{
    Airport, ApiResponse, FlightService, FlightsInformation, ScheduleInformation, ServiceQuote,
    ServiceQuoteRequest,
};
use crate::FetchError;

/// Carrier code of the modelled airline.
pub const CARRIER_CODE: &str = "P5";

const MONTHLY_AVAILABILITY_PATH: &str = "getInformationFlightsMonthly";
const SERVICE_QUOTES_PATH: &str = "retrieveServiceQuotes";
const COMPLETE_ROUTE_PATH: &str = "completeroute/es";
const SCHEDULE_PATH: &str = "scheduleinformation";

/// Typed calls against the booking APIs.
#[derive(Debug)]
pub struct WingoClient {
    fetch: FetchClient,
    endpoints: Endpoints,
    currency: String,
}

impl WingoClient {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        Ok(Self::with_fetch_client(FetchClient::new(config)?, config))
    }

    pub fn with_fetch_client(fetch: FetchClient, config: &ClientConfig) -> Self {
        Self {
            fetch,
            endpoints: config.endpoints.clone(),
            currency: config.currency.clone(),
        }
    }

    pub fn fetch_client(&self) -> &FetchClient {
        &self.fetch
    }

    /// Number of upstream calls issued through this client.
    pub fn request_count(&self) -> u64 {
        self.fetch.request_count()
    }

    /// Availability of `origin`→`destination` for `days_after` days from `start_date`.
    pub async fn monthly_availability(
        &self,
        origin: &str,
        destination: &str,
        start_date: NaiveDate,
        days_after: u32,
        token: &CancellationToken,
    ) -> Result<FlightsInformation, FetchError> {
        let end_date = start_date
            .checked_add_days(Days::new(u64::from(days_after)))
            .ok_or_else(|| FetchError::invalid_date(format!("{start_date} + {days_after} days")))?;

        let days_after = days_after.to_string();
        let start_date = format_date(start_date);
        let end_date = format_date(end_date);

        // The upstream rejects requests missing its legacy return-leg and
        // session parameters, even though it ignores their values.
        let parameters: [(&str, &str); 22] = [
            ("origin", origin),
            ("originStartDate", &start_date),
            ("originEndDate", &end_date),
            ("originDaysBefore", "0"),
            ("originDaysAfter", &days_after),
            ("destination", destination),
            ("destinationStartDate", "Fecha inválida"),
            ("destinationEndDate", "Fecha inválida"),
            ("destinationDaysBefore", "0"),
            ("destinationDaysAfter", "NaN"),
            ("currency", &self.currency),
            ("adultNumber", "1"),
            ("childNumber", "0"),
            ("infantNumber", "0"),
            ("flightType", "1"),
            ("securityToken", ""),
            ("iataNumber", ""),
            ("userAgent", "IBE"),
            ("promoCode", ""),
            ("currentCurrency", "undefined"),
            ("multiCurrency", "false"),
            ("languageId", "1"),
        ];

        let url = self.routes_url(MONTHLY_AVAILABILITY_PATH, &parameters)?;
        let response: ApiResponse<FlightsInformation> =
            self.fetch.fetch_json(&FetchRequest::get(url), token).await?;
        Ok(response.response)
    }

    /// Service-fee quotes for `flights`, using the session token of an availability call.
    pub async fn retrieve_service_quotes(
        &self,
        flights: &[FlightService],
        session_token: &str,
        token: &CancellationToken,
    ) -> Result<Vec<ServiceQuote>, FetchError> {
        let body = ServiceQuoteRequest {
            currency: &self.currency,
            flights,
            token: session_token,
            module: "2",
            multicurrency: false,
            language_id: 1,
        };
        let request =
            FetchRequest::post_json(self.endpoints.ancillaries(SERVICE_QUOTES_PATH), &body)?;

        let response: ApiResponse<Vec<ServiceQuote>> =
            self.fetch.fetch_json(&request, token).await?;
        Ok(response.response)
    }

    /// The carrier's complete route listing.
    pub async fn routes(&self, token: &CancellationToken) -> Result<Vec<Airport>, FetchError> {
        let request = FetchRequest::get(self.endpoints.routes(COMPLETE_ROUTE_PATH));
        let response: ApiResponse<Vec<Airport>> = self.fetch.fetch_json(&request, token).await?;
        Ok(response.response)
    }

    /// The route listing through the conditional cache stored at `cache_path`.
    pub async fn routes_with_cache(
        &self,
        cache_path: &Path,
        token: &CancellationToken,
    ) -> Result<Vec<Airport>, FetchError> {
        let request = FetchRequest::get(self.endpoints.routes(COMPLETE_ROUTE_PATH));
        let response: ApiResponse<Vec<Airport>> = self
            .fetch
            .fetch_json_cached(&request, cache_path, token)
            .await?;
        Ok(response.response)
    }

    /// Scheduled flights of `origin`→`destination` between two dates.
    pub async fn flight_schedule(
        &self,
        origin: &str,
        destination: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        token: &CancellationToken,
    ) -> Result<ScheduleInformation, FetchError> {
        let start_date = format_date(start_date);
        let end_date = format_date(end_date);
        let parameters: [(&str, &str); 8] = [
            ("carrierCode", CARRIER_CODE),
            ("searchType", ""),
            ("origin", origin),
            ("destination", destination),
            ("startDate", &start_date),
            ("endDate", &end_date),
            ("flightNumber", "0"),
            ("includedCancelled", "false"),
        ];

        let url = self.routes_url(SCHEDULE_PATH, &parameters)?;
        let response: ApiResponse<ScheduleInformation> =
            self.fetch.fetch_json(&FetchRequest::get(url), token).await?;
        Ok(response.response)
    }

    fn routes_url(&self, path: &str, parameters: &[(&str, &str)]) -> Result<String, FetchError> {
        let base = self.endpoints.routes(path);
        let url = Url::parse_with_params(&base, parameters)
            .map_err(|e| FetchError::request_build(&base, e.to_string()))?;
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RetryPolicy;
    use axum::Router;
    use axum::extract::Query;
    use axum::routing::{get, post};
    use axum::Json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> WingoClient {
        WingoClient::new(&ClientConfig {
            retry: RetryPolicy::immediate(2),
            endpoints: Endpoints::single(base),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn monthly_availability_sends_window_and_legacy_parameters() {
        let app = Router::new().route(
            "/getInformationFlightsMonthly",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["origin"], "BOG");
                assert_eq!(params["destination"], "HAV");
                assert_eq!(params["originStartDate"], "2022-04-01");
                assert_eq!(params["originEndDate"], "2022-05-01");
                assert_eq!(params["originDaysAfter"], "30");
                assert_eq!(params["destinationStartDate"], "Fecha inválida");
                assert_eq!(params["destinationDaysAfter"], "NaN");
                assert_eq!(params["currentCurrency"], "undefined");
                assert_eq!(params["securityToken"], "");
                Json(serde_json::json!({
                    "response": {"token": "session", "vueloIda": []}
                }))
            }),
        );
        let base = serve(app).await;

        let info = client(&base)
            .monthly_availability(
                "BOG",
                "HAV",
                NaiveDate::from_ymd_opt(2022, 4, 1).unwrap(),
                30,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(info.token, "session");
        assert!(info.outbound.is_empty());
    }

    #[tokio::test]
    async fn service_quotes_post_session_token() {
        let app = Router::new().route(
            "/retrieveServiceQuotes",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["token"], "session");
                assert_eq!(body["currency"], "COP");
                assert_eq!(body["module"], "2");
                assert_eq!(body["flights"][0]["flightId"], 991);
                Json(serde_json::json!({
                    "response": [{
                        "flightId": 991,
                        "services": [{"codeType": "BFEE", "amount": 1000, "taxes": [{"taxAmount": 190}]}]
                    }]
                }))
            }),
        );
        let base = serve(app).await;

        let flights = [FlightService {
            departure: "2022-04-14".to_owned(),
            from: "BOG".to_owned(),
            to: "HAV".to_owned(),
            flight_id: 991,
        }];
        let quotes = client(&base)
            .retrieve_service_quotes(&flights, "session", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].services[0].code_type, "BFEE");
        assert_eq!(quotes[0].services[0].taxes[0].tax_amount, 190.0);
    }

    #[tokio::test]
    async fn schedule_uses_carrier_code() {
        let app = Router::new().route(
            "/scheduleinformation",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["carrierCode"], "P5");
                assert_eq!(params["startDate"], "2022-04-01");
                assert_eq!(params["endDate"], "2022-10-01");
                Json(serde_json::json!({
                    "response": {"flightInformation": [{
                        "flightNumber": "P5-7013",
                        "origin": "BOG",
                        "destination": "HAV",
                        "effectiveDate": "2022-04-14T00:00:00.000+0000"
                    }]}
                }))
            }),
        );
        let base = serve(app).await;

        let schedule = client(&base)
            .flight_schedule(
                "BOG",
                "HAV",
                NaiveDate::from_ymd_opt(2022, 4, 1).unwrap(),
                NaiveDate::from_ymd_opt(2022, 10, 1).unwrap(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(schedule.flight_information[0].flight_number, "P5-7013");
    }
}
