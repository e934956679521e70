//! Wire models of the upstream booking APIs.
//!
//! Only the fields needed for pricing, keying and archiving are modelled;
//! everything else in the payloads is ignored on decode.

use serde::{Deserialize, Serialize};

/// Envelope every upstream endpoint wraps its payload in.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    pub response: T,
}

/// Monthly availability for one origin/destination pair.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlightsInformation {
    pub exchange_rate: f64,
    /// Session token required by the fee-quote endpoint.
    pub token: String,
    #[serde(rename = "vueloIda")]
    pub outbound: Vec<DailyFlights>,
}

/// Flights departing on one day.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DailyFlights {
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "infoVuelo")]
    pub info: DailyFlightList,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DailyFlightList {
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "vuelos")]
    pub flights: Vec<Flight>,
}

/// A flight offered on a specific departure date, with its fare options.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Flight {
    pub flight_number: String,
    #[serde(rename = "logicalFlightID")]
    pub logical_flight_id: i64,
    pub carrier_code: String,
    pub aircraft_description: String,
    pub departure_date: String,
    pub arrival_date: String,
    pub duration_hours: i64,
    pub duration_mins: i64,
    pub info_fares: Vec<FareOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FareOption {
    pub is_international: bool,
    pub fare_adult: Fare,
    pub fare_child: Fare,
    pub fare_infant: Fare,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fare {
    #[serde(rename = "fareID")]
    pub fare_id: i64,
    pub passenger_type: i64,
    pub fare_amount: f64,
    pub base_fare_amount: f64,
    pub promotion_amount: f64,
    pub seats_available: i64,
    pub applicable_taxes: Vec<FareTax>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FareTax {
    pub tax_id: i64,
    pub tax_amount: f64,
}

/// Flight reference sent to the fee-quote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightService {
    pub departure: String,
    pub from: String,
    pub to: String,
    pub flight_id: i64,
}

/// Body of a fee-quote request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceQuoteRequest<'a> {
    pub currency: &'a str,
    pub flights: &'a [FlightService],
    pub token: &'a str,
    pub module: &'a str,
    pub multicurrency: bool,
    pub language_id: i64,
}

/// Service fees quoted for one flight.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceQuote {
    pub from: String,
    pub to: String,
    pub departure_date: String,
    pub flight_id: i64,
    pub services: Vec<Service>,
}

/// One fee line item, mandatory or optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Service {
    pub code_type: String,
    pub amount: f64,
    pub amount_original: f64,
    pub description: String,
    #[serde(rename = "avalaibleQuantity")]
    pub available_quantity: i64,
    pub taxes: Vec<ServiceTax>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceTax {
    pub tax_code: String,
    pub tax_description: String,
    pub tax_amount: f64,
    pub tax_currency_code: String,
}

/// An airport of the carrier's network together with its reachable destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Airport {
    pub code: String,
    pub name: String,
    pub routes: Vec<Destination>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Destination {
    pub code: String,
    pub name: String,
}

/// An ordered origin/destination pair on the carrier's network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.origin, self.destination)
    }
}

/// Expand a route listing into every origin/destination pair.
pub fn route_pairs(airports: &[Airport]) -> Vec<Route> {
    airports
        .iter()
        .flat_map(|airport| {
            airport
                .routes
                .iter()
                .map(move |destination| Route::new(&airport.code, &destination.code))
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleInformation {
    pub flight_information: Vec<ScheduledFlight>,
}

/// A flight from the schedule feed. Its number carries the carrier prefix
/// (`P5-7013`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduledFlight {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub effective_date: String,
    pub discontinue_date: String,
    pub departure_time: String,
    pub arrival_time: String,
}

impl ScheduledFlight {
    /// Flight number without the carrier prefix, as price-quote feeds report it.
    pub fn normalized_flight_number(&self) -> &str {
        normalize_flight_number(&self.flight_number)
    }
}

/// Strip a carrier-code prefix from a flight number (`P5-7013` → `7013`).
///
/// Schedule feeds prefix the carrier, price-quote feeds do not.
pub fn normalize_flight_number(raw: &str) -> &str {
    raw.split_once('-').map_or(raw, |(_, number)| number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_monthly_availability_payload() {
        let payload = r#"{
            "response": {
                "exchangeRate": 1,
                "token": "tok-1",
                "airportInfo": {"toTerminal": "", "fromTerminal": ""},
                "vueloIda": [{
                    "fecha": "2022-04-14",
                    "applicableTaxes": [],
                    "infoVuelo": {
                        "fecha": "2022-04-14",
                        "vuelos": [{
                            "flightNumber": "7013",
                            "logicalFlightID": 991,
                            "carrierCode": "P5",
                            "departureDate": "2022-04-14T06:00:00",
                            "arrivalDate": "2022-04-14T09:10:00",
                            "durationHours": 3,
                            "durationMins": 10,
                            "infoFares": [{
                                "isInternational": true,
                                "fareAdult": {
                                    "fareID": 5,
                                    "fareAmount": 300000,
                                    "applicableTaxes": [{"taxId": 1, "taxAmount": 50000.5}]
                                }
                            }]
                        }]
                    }
                }]
            }
        }"#;

        let decoded: ApiResponse<FlightsInformation> = serde_json::from_str(payload).unwrap();
        let info = decoded.response;
        assert_eq!(info.token, "tok-1");
        assert_eq!(info.outbound.len(), 1);

        let flight = &info.outbound[0].info.flights[0];
        assert_eq!(flight.flight_number, "7013");
        assert_eq!(flight.logical_flight_id, 991);
        assert_eq!(flight.info_fares[0].fare_adult.fare_amount, 300000.0);
        assert_eq!(
            flight.info_fares[0].fare_adult.applicable_taxes[0].tax_amount,
            50000.5
        );
    }

    #[test]
    fn quote_request_uses_upstream_field_names() {
        let flights = [FlightService {
            departure: "2022-04-14".to_owned(),
            from: "BOG".to_owned(),
            to: "HAV".to_owned(),
            flight_id: 991,
        }];
        let body = ServiceQuoteRequest {
            currency: "COP",
            flights: &flights,
            token: "tok",
            module: "2",
            multicurrency: false,
            language_id: 1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["languageId"], 1);
        assert_eq!(json["flights"][0]["flightId"], 991);
        assert_eq!(json["multicurrency"], false);
    }

    #[test]
    fn route_listing_expands_to_pairs() {
        let airports = vec![
            Airport {
                code: "BOG".to_owned(),
                name: "Bogota".to_owned(),
                routes: vec![
                    Destination {
                        code: "HAV".to_owned(),
                        name: "La Habana".to_owned(),
                    },
                    Destination {
                        code: "CUN".to_owned(),
                        name: "Cancun".to_owned(),
                    },
                ],
            },
            Airport {
                code: "MDE".to_owned(),
                name: "Medellin".to_owned(),
                routes: vec![],
            },
        ];

        assert_eq!(
            route_pairs(&airports),
            vec![Route::new("BOG", "HAV"), Route::new("BOG", "CUN")]
        );
    }

    #[test]
    fn schedule_flight_numbers_drop_carrier_prefix() {
        let payload = r#"{"response": {"flightInformation": [
            {"flightNumber": "P5-7013", "origin": "BOG", "destination": "HAV"},
            {"flightNumber": "7015", "origin": "BOG", "destination": "HAV"}
        ]}}"#;

        let decoded: ApiResponse<ScheduleInformation> = serde_json::from_str(payload).unwrap();
        let numbers: Vec<_> = decoded
            .response
            .flight_information
            .iter()
            .map(ScheduledFlight::normalized_flight_number)
            .collect();
        assert_eq!(numbers, vec!["7013", "7015"]);
    }
}
