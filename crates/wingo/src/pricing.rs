//! All-in price arithmetic. Pure functions of a flight and its fee list.

use crate::models::{Flight, Service};

/// Service code of the mandatory administrative fee.
pub const ADMIN_FEE_CODE: &str = "BFEE";

/// Adult fare of the first fare option plus its applicable taxes.
///
/// Zero when the flight carries no fare options; the availability feed uses
/// such entries as "not actually offered" placeholders.
pub fn base_fare(flight: &Flight) -> f64 {
    flight.info_fares.first().map_or(0.0, |option| {
        let fare = &option.fare_adult;
        let taxes: f64 = fare.applicable_taxes.iter().map(|tax| tax.tax_amount).sum();
        fare.fare_amount + taxes
    })
}

/// Amount plus taxes of the admin fee line item, or zero when absent.
pub fn admin_fee(services: &[Service]) -> f64 {
    services
        .iter()
        .find(|service| service.code_type == ADMIN_FEE_CODE)
        .map_or(0.0, |service| {
            let taxes: f64 = service.taxes.iter().map(|tax| tax.tax_amount).sum();
            service.amount + taxes
        })
}

/// Base fare + fare taxes + admin fee + admin fee taxes.
pub fn calculate_price(flight: &Flight, services: &[Service]) -> f64 {
    base_fare(flight) + admin_fee(services)
}
