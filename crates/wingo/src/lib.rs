//! # Wingo Client
//!
//! Resilient HTTP access to the Wingo booking APIs.
//!
//! ## Features
//!
//! - [`FetchClient`]: bounded retry with exponential backoff, per-request
//!   timeout, a request counter, and a conditional-request file cache keyed
//!   by weak ETags
//! - [`WingoClient`]: typed calls for monthly availability, service-fee
//!   quotes, the route listing and the flight schedule
//! - [`pricing`]: the all-in price of a flight as a pure function of its
//!   fares and fees
//!
//! ## License
//!
//! MIT OR Apache-2.0

pub mod api;
pub mod config;
pub mod date;
mod error;
pub mod etag;
pub mod fetch;
pub mod models;
pub mod pricing;
pub mod retry;

pub use api::{CARRIER_CODE, WingoClient};
pub use config::{ClientConfig, Endpoints, ProxyConfig};
pub use error::FetchError;
pub use etag::weak_etag;
pub use fetch::{FetchClient, FetchRequest};
pub use retry::{RetryAction, RetryPolicy, retry_with_backoff};
