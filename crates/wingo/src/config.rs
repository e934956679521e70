use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:90.0) Gecko/20100101 Firefox/90.0";

pub const DEFAULT_ROUTES_API: &str = "https://routes-api.wingo.com/v1";
pub const DEFAULT_ANCILLARIES_API: &str = "https://ancillaries-api.wingo.com/v1";
pub const BOOKING_ORIGIN: &str = "https://booking.wingo.com";

/// Base URLs of the upstream services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Availability, route listing and schedule service.
    pub routes_api: String,
    /// Service-fee quote service.
    pub ancillaries_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            routes_api: DEFAULT_ROUTES_API.to_owned(),
            ancillaries_api: DEFAULT_ANCILLARIES_API.to_owned(),
        }
    }
}

impl Endpoints {
    /// Point both services at the same base URL, e.g. a local mock server.
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            routes_api: base.clone(),
            ancillaries_api: base,
        }
    }

    pub(crate) fn routes(&self, path: &str) -> String {
        join(&self.routes_api, path)
    }

    pub(crate) fn ancillaries(&self, path: &str) -> String {
        join(&self.ancillaries_api, path)
    }
}

fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `socks5://127.0.0.1:9050` or `http://proxy:8080`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Configurable options for the upstream client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for a single HTTP request, independent of the retry loop.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,

    /// Retry and backoff policy applied to every call.
    pub retry: RetryPolicy,

    pub endpoints: Endpoints,

    /// Currency requested for fares and fees.
    pub currency: String,

    pub user_agent: String,

    /// Headers added to every request, on top of the browser-like defaults.
    pub headers: BTreeMap<String, String>,

    pub proxy: Option<ProxyConfig>,

    /// The booking hosts have served broken certificate chains; opt in to
    /// skipping verification when that happens.
    pub danger_accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            endpoints: Endpoints::default(),
            currency: "COP".to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: BTreeMap::new(),
            proxy: None,
            danger_accept_invalid_certs: false,
        }
    }
}

impl ClientConfig {
    /// Default headers merged with the configured ones; configured headers win.
    pub fn header_map(&self) -> HeaderMap {
        let mut headers = Self::get_default_headers();

        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Ignoring invalid configured header"),
            }
        }

        headers
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ORIGIN,
            HeaderValue::from_static(BOOKING_ORIGIN),
        );

        default_headers.insert(
            reqwest::header::REFERER,
            HeaderValue::from_static("https://booking.wingo.com/"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );

        default_headers
    }
}

/// Serialize a `Duration` as integer milliseconds.
pub mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
