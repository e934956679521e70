//! Resolved flights and the snapshot that holds them.
//!
//! A snapshot is a flat map keyed by `(origin, destination, date, flight
//! number)`. Iteration order is the key order, which the diff never relies on.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use wingo_client::date::{format_date, parse_date};
use wingo_client::models::{Flight, Service, normalize_flight_number};
use wingo_client::pricing::calculate_price;

use crate::error::StorageError;

/// Identity of one flight across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightKey {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub flight_number: String,
}

impl FlightKey {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        date: NaiveDate,
        flight_number: &str,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            date,
            flight_number: normalize_flight_number(flight_number).to_owned(),
        }
    }

    /// `{origin}/{destination}/{date}/{flightNumber}`, the durable store key.
    pub fn storage_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.origin,
            self.destination,
            format_date(self.date),
            self.flight_number
        )
    }

    pub fn from_storage_path(path: &str) -> Result<Self, StorageError> {
        let invalid = || StorageError::InvalidKey(path.to_owned());

        let mut parts = path.split('/');
        let (Some(origin), Some(destination), Some(date), Some(flight_number), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(invalid());
        };

        if [origin, destination, flight_number].iter().any(|part| part.is_empty()) {
            return Err(invalid());
        }
        let date = parse_date(date).map_err(|_| invalid())?;

        Ok(Self::new(origin, destination, date, flight_number))
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}/{}/{}",
            self.origin,
            self.destination,
            format_date(self.date),
            self.flight_number
        )
    }
}

/// A flight with its fee quote: the canonical archived unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFlight {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub flight: Flight,
    pub services: Vec<Service>,
}

impl ResolvedFlight {
    pub fn key(&self) -> FlightKey {
        FlightKey::new(
            &self.origin,
            &self.destination,
            self.date,
            &self.flight.flight_number,
        )
    }

    /// All-in price, reproducible from the flight and its fees alone.
    pub fn price(&self) -> f64 {
        calculate_price(&self.flight, &self.services)
    }

    pub fn to_record(&self) -> ArchivedFlight {
        ArchivedFlight {
            flight: self.flight.clone(),
            services: self.services.clone(),
        }
    }

    pub fn from_record(key: &FlightKey, record: ArchivedFlight) -> Self {
        Self {
            origin: key.origin.clone(),
            destination: key.destination.clone(),
            date: key.date,
            flight: record.flight,
            services: record.services,
        }
    }
}

/// On-disk layout of one archived flight; the route and date live in its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedFlight {
    #[serde(flatten)]
    pub flight: Flight,
    #[serde(default)]
    pub services: Vec<Service>,
}

/// Every resolved flight known for a set of routes and dates at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    flights: BTreeMap<FlightKey, ResolvedFlight>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a flight, returning the one it replaced under the same key.
    pub fn insert(&mut self, flight: ResolvedFlight) -> Option<ResolvedFlight> {
        self.flights.insert(flight.key(), flight)
    }

    pub fn get(&self, key: &FlightKey) -> Option<&ResolvedFlight> {
        self.flights.get(key)
    }

    pub fn contains(&self, key: &FlightKey) -> bool {
        self.flights.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlightKey, &ResolvedFlight)> {
        self.flights.iter()
    }

    pub fn flights(&self) -> impl Iterator<Item = &ResolvedFlight> {
        self.flights.values()
    }

    /// All flights of one origin/destination pair.
    pub fn route<'a>(
        &'a self,
        origin: &'a str,
        destination: &'a str,
    ) -> impl Iterator<Item = &'a ResolvedFlight> + 'a {
        let start = FlightKey {
            origin: origin.to_owned(),
            destination: destination.to_owned(),
            date: NaiveDate::MIN,
            flight_number: String::new(),
        };
        self.flights
            .range(start..)
            .take_while(move |(key, _)| key.origin == origin && key.destination == destination)
            .map(|(_, flight)| flight)
    }
}

impl FromIterator<ResolvedFlight> for Snapshot {
    fn from_iter<I: IntoIterator<Item = ResolvedFlight>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for flight in iter {
            snapshot.insert(flight);
        }
        snapshot
    }
}

impl IntoIterator for Snapshot {
    type Item = ResolvedFlight;
    type IntoIter = std::collections::btree_map::IntoValues<FlightKey, ResolvedFlight>;

    fn into_iter(self) -> Self::IntoIter {
        self.flights.into_values()
    }
}
