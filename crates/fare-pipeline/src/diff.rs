//! Snapshot comparison.
//!
//! Flights are matched by [`FlightKey`]; iteration order of either snapshot
//! is irrelevant. Prices are compared exactly: upstream amounts are already
//! quantized to currency units.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::snapshot::{FlightKey, ResolvedFlight, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Increased,
    Decreased,
}

impl fmt::Display for PriceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increased => f.write_str("increased"),
            Self::Decreased => f.write_str("decreased"),
        }
    }
}

/// How one flight differs between the previous and the actual snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    NewFlight {
        key: FlightKey,
        price: f64,
    },
    PriceChanged {
        key: FlightKey,
        old_price: f64,
        new_price: f64,
    },
    Unavailable {
        key: FlightKey,
        last_price: f64,
    },
}

impl ChangeEvent {
    pub fn key(&self) -> &FlightKey {
        match self {
            Self::NewFlight { key, .. }
            | Self::PriceChanged { key, .. }
            | Self::Unavailable { key, .. } => key,
        }
    }

    pub fn origin(&self) -> &str {
        &self.key().origin
    }

    pub fn destination(&self) -> &str {
        &self.key().destination
    }

    pub fn date(&self) -> NaiveDate {
        self.key().date
    }

    /// Direction of a price change; `None` for other events.
    pub fn direction(&self) -> Option<PriceDirection> {
        match self {
            Self::PriceChanged {
                old_price,
                new_price,
                ..
            } => Some(if new_price > old_price {
                PriceDirection::Increased
            } else {
                PriceDirection::Decreased
            }),
            _ => None,
        }
    }

    pub fn is_increase(&self) -> bool {
        self.direction() == Some(PriceDirection::Increased)
    }
}

/// Compare two snapshots and describe every flight that changed.
///
/// Neither snapshot is modified. Events for flights of `actual` come first,
/// then the ones that disappeared, each group in key order.
pub fn diff(previous: &Snapshot, actual: &Snapshot) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (key, flight) in actual.iter() {
        if let Some(event) = compare(key, previous.get(key), flight) {
            events.push(event);
        }
    }

    events.extend(
        previous
            .iter()
            .filter(|(key, _)| !actual.contains(key))
            .map(|(key, flight)| ChangeEvent::Unavailable {
                key: key.clone(),
                last_price: flight.price(),
            }),
    );

    events
}

fn compare(
    key: &FlightKey,
    previous: Option<&ResolvedFlight>,
    actual: &ResolvedFlight,
) -> Option<ChangeEvent> {
    let new_price = actual.price();
    let Some(previous) = previous else {
        return Some(ChangeEvent::NewFlight {
            key: key.clone(),
            price: new_price,
        });
    };

    let old_price = previous.price();
    if old_price == new_price {
        return None;
    }

    Some(ChangeEvent::PriceChanged {
        key: key.clone(),
        old_price,
        new_price,
    })
}
