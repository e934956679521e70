// Resilient fetch client: the only network-facing primitive.
//
// Every call goes through `retry_with_backoff`; the conditional-cache variant
// adds an `If-None-Match` built from the cached body's weak ETag.

use std::path::Path;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, IF_NONE_MATCH};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::config::{ClientConfig, ProxyConfig};
use crate::etag::weak_etag;
use crate::retry::{RetryAction, RetryPolicy, retry_with_backoff};
use crate::FetchError;

/// One upstream request, replayable across retry attempts.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Bytes>,
    pub headers: HeaderMap,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// A POST carrying `payload` encoded as JSON.
    pub fn post_json<T: Serialize + ?Sized>(
        url: impl Into<String>,
        payload: &T,
    ) -> Result<Self, FetchError> {
        let url = url.into();
        let body = serde_json::to_vec(payload)
            .map_err(|e| FetchError::request_build(&url, format!("could not encode json: {e}")))?;

        let mut request = Self::new(Method::POST, url);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Some(Bytes::from(body));
        Ok(request)
    }
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

fn build_proxy(config: &ProxyConfig) -> Result<reqwest::Proxy, FetchError> {
    let mut proxy = reqwest::Proxy::all(&config.url)
        .map_err(|e| FetchError::request_build(&config.url, format!("invalid proxy URL: {e}")))?;
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        proxy = proxy.basic_auth(username, password);
    }
    Ok(proxy)
}

/// HTTP client with bounded retry, per-request timeout and a request counter.
#[derive(Debug)]
pub struct FetchClient {
    http_client: Client,
    retry: RetryPolicy,
    headers: HeaderMap,
    request_count: AtomicU64,
}

impl FetchClient {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        install_rustls_provider();

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs);

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(build_proxy(proxy)?);
        }

        let http_client = builder
            .build()
            .map_err(|e| FetchError::request_build("http client", e.to_string()))?;

        Ok(Self::with_client(http_client, config))
    }

    /// Wrap an already configured `reqwest::Client`.
    pub fn with_client(http_client: Client, config: &ClientConfig) -> Self {
        Self {
            http_client,
            retry: config.retry.clone(),
            headers: config.header_map(),
            request_count: AtomicU64::new(0),
        }
    }

    /// Number of fetch calls issued so far (retries of one call count once).
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send `request` with retries and hand the successful response to `read`.
    ///
    /// The body is read inside the attempt, so a connection dropped mid-body
    /// is retried like any other transport failure. `accept_not_modified`
    /// lets a 304 count as success; only the conditional-cache path sets it.
    async fn send<T, F, Fut>(
        &self,
        request: &FetchRequest,
        token: &CancellationToken,
        accept_not_modified: bool,
        read: F,
    ) -> Result<T, FetchError>
    where
        F: Fn(Response) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        debug!(method = %request.method, url = %request.url, "Fetching");

        let url = Url::parse(&request.url)
            .map_err(|e| FetchError::request_build(&request.url, e.to_string()))?;
        let read = &read;

        retry_with_backoff(&self.retry, token, |attempt| {
            let mut builder = self
                .http_client
                .request(request.method.clone(), url.clone())
                .headers(self.headers.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            async move {
                trace!(attempt, url = %request.url, "Sending request");
                let response = match builder.send().await {
                    Ok(response) => response,
                    Err(e) if e.is_builder() => {
                        return RetryAction::Fail(FetchError::request_build(
                            &request.url,
                            e.to_string(),
                        ));
                    }
                    Err(e) => return RetryAction::Retry(FetchError::from(e)),
                };

                let status = response.status();
                if status.is_success() || (accept_not_modified && status == StatusCode::NOT_MODIFIED)
                {
                    match read(response).await {
                        Ok(value) => RetryAction::Success(value),
                        Err(e) if e.is_retryable() => RetryAction::Retry(e),
                        Err(e) => RetryAction::Fail(e),
                    }
                } else {
                    RetryAction::Retry(FetchError::upstream_status(
                        status,
                        request.method.clone(),
                        &request.url,
                    ))
                }
            }
        })
        .await
    }

    /// Fetch the raw response body.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        token: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        self.send(request, token, false, |response: Response| async move {
            response.bytes().await.map_err(FetchError::from)
        })
        .await
    }

    /// Fetch and decode a JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: &FetchRequest,
        token: &CancellationToken,
    ) -> Result<T, FetchError> {
        let body = self.fetch(request, token).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::decode(&request.url, e))
    }

    /// Fetch a JSON body through the file cache at `cache_path`.
    ///
    /// When a cached body exists its weak ETag is sent as `If-None-Match`; a
    /// 304 answer decodes the cached bytes verbatim. Any other answer is
    /// written over the cache as it streams in.
    pub async fn fetch_json_cached<T: DeserializeOwned>(
        &self,
        request: &FetchRequest,
        cache_path: &Path,
        token: &CancellationToken,
    ) -> Result<T, FetchError> {
        let cached = match tokio::fs::read(cache_path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(FetchError::cache(cache_path, e)),
        };

        let mut request = request.clone();
        if let Some(content) = &cached {
            let etag = weak_etag(content);
            let value = HeaderValue::from_str(&etag)
                .map_err(|e| FetchError::request_build(&request.url, e.to_string()))?;
            request.headers.insert(IF_NONE_MATCH, value);
        }

        let fresh = self
            .send(&request, token, cached.is_some(), |response: Response| async move {
                if response.status() == StatusCode::NOT_MODIFIED {
                    return Ok(None);
                }
                stream_to_cache(response, cache_path).await.map(Some)
            })
            .await?;

        let body = match (fresh, cached) {
            (Some(body), _) => body,
            (None, Some(content)) => {
                debug!(path = %cache_path.display(), "Upstream not modified, using cached body");
                content
            }
            (None, None) => {
                return Err(FetchError::upstream_status(
                    StatusCode::NOT_MODIFIED,
                    request.method.clone(),
                    &request.url,
                ));
            }
        };
        serde_json::from_slice(&body).map_err(|e| FetchError::decode(&request.url, e))
    }
}

async fn stream_to_cache(response: Response, cache_path: &Path) -> Result<Vec<u8>, FetchError> {
    if let Some(parent) = cache_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FetchError::cache(cache_path, e))?;
    }

    let mut file = tokio::fs::File::create(cache_path)
        .await
        .map_err(|e| FetchError::cache(cache_path, e))?;

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| FetchError::cache(cache_path, e))?;
        body.extend_from_slice(&chunk);
    }
    file.flush()
        .await
        .map_err(|e| FetchError::cache(cache_path, e))?;

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use axum::Router;
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{HeaderMap as AxumHeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Hits(Arc<AtomicUsize>);

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(max_attempts: u32, base: &str) -> FetchClient {
        let config = ClientConfig {
            retry: RetryPolicy::immediate(max_attempts),
            endpoints: Endpoints::single(base),
            ..ClientConfig::default()
        };
        FetchClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn always_failing_endpoint_is_tried_exactly_max_attempts() {
        let hits = Hits::default();
        let app = Router::new()
            .route(
                "/broken",
                get(|State(hits): State<Hits>| async move {
                    hits.0.fetch_add(1, Ordering::SeqCst);
                    AxumStatus::INTERNAL_SERVER_ERROR
                }),
            )
            .with_state(hits.clone());
        let base = serve(app).await;

        let client = client(3, &base);
        let token = CancellationToken::new();
        let result = client
            .fetch(&FetchRequest::get(format!("{base}/broken")), &token)
            .await;

        match result {
            Err(FetchError::UpstreamStatus { status, .. }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("expected UpstreamStatus, got {other:?}"),
        }
        assert_eq!(hits.0.load(Ordering::SeqCst), 3);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let hits = Hits::default();
        let app = Router::new()
            .route(
                "/flaky",
                get(|State(hits): State<Hits>| async move {
                    if hits.0.fetch_add(1, Ordering::SeqCst) < 2 {
                        (AxumStatus::SERVICE_UNAVAILABLE, "{}")
                    } else {
                        (AxumStatus::OK, r#"{"value": 7}"#)
                    }
                }),
            )
            .with_state(hits.clone());
        let base = serve(app).await;

        #[derive(serde::Deserialize)]
        struct Payload {
            value: u32,
        }

        let client = client(5, &base);
        let payload: Payload = client
            .fetch_json(
                &FetchRequest::get(format!("{base}/flaky")),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(payload.value, 7);
        assert_eq!(hits.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn body_cut_off_after_success_status_is_retried() {
        let hits = Hits::default();
        let app = Router::new()
            .route(
                "/truncated",
                get(|State(hits): State<Hits>| async move {
                    let chunks: Vec<Result<Bytes, std::io::Error>> =
                        if hits.0.fetch_add(1, Ordering::SeqCst) == 0 {
                            vec![
                                Ok(Bytes::from_static(b"{\"val")),
                                Err(std::io::Error::other("connection reset")),
                            ]
                        } else {
                            vec![Ok(Bytes::from_static(br#"{"value": 7}"#))]
                        };
                    Body::from_stream(futures::stream::iter(chunks))
                }),
            )
            .with_state(hits.clone());
        let base = serve(app).await;

        let client = client(3, &base);
        let value: serde_json::Value = client
            .fetch_json(
                &FetchRequest::get(format!("{base}/truncated")),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["value"], 7);
        assert_eq!(hits.0.load(Ordering::SeqCst), 2);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error_without_retry() {
        let hits = Hits::default();
        let app = Router::new()
            .route(
                "/garbage",
                post(|State(hits): State<Hits>, body: String| async move {
                    hits.0.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(body, r#"{"token":"t"}"#);
                    "not json"
                }),
            )
            .with_state(hits.clone());
        let base = serve(app).await;

        let client = client(5, &base);
        let request =
            FetchRequest::post_json(format!("{base}/garbage"), &serde_json::json!({"token": "t"}))
                .unwrap();
        let result: Result<serde_json::Value, _> =
            client.fetch_json(&request, &CancellationToken::new()).await;

        assert!(matches!(result, Err(FetchError::Decode { .. })));
        assert_eq!(hits.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_url_fails_without_network() {
        let client = client(3, "http://127.0.0.1:1");
        let result = client
            .fetch(&FetchRequest::get("not a url"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FetchError::RequestBuild { .. })));
    }

    const ROUTES_BODY: &str = r#"{"response":[{"code":"BOG","name":"Bogota","routes":[]}]}"#;

    async fn conditional(State(hits): State<Hits>, headers: AxumHeaderMap) -> (AxumStatus, String) {
        hits.0.fetch_add(1, Ordering::SeqCst);
        let expected = weak_etag(ROUTES_BODY.as_bytes());
        match headers.get("if-none-match") {
            Some(tag) if tag.to_str().unwrap() == expected => {
                (AxumStatus::NOT_MODIFIED, String::new())
            }
            _ => (AxumStatus::OK, ROUTES_BODY.to_owned()),
        }
    }

    #[tokio::test]
    async fn conditional_cache_writes_then_reuses_body() {
        let hits = Hits::default();
        let app = Router::new()
            .route("/routes", get(conditional))
            .with_state(hits.clone());
        let base = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("routes.json");
        let client = client(2, &base);
        let request = FetchRequest::get(format!("{base}/routes"));
        let token = CancellationToken::new();

        let first: serde_json::Value = client
            .fetch_json_cached(&request, &cache_path, &token)
            .await
            .unwrap();
        assert_eq!(first["response"][0]["code"], "BOG");
        assert_eq!(std::fs::read_to_string(&cache_path).unwrap(), ROUTES_BODY);

        let second: serde_json::Value = client
            .fetch_json_cached(&request, &cache_path, &token)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(hits.0.load(Ordering::SeqCst), 2);
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn stale_cache_is_overwritten() {
        let hits = Hits::default();
        let app = Router::new()
            .route("/routes", get(conditional))
            .with_state(hits.clone());
        let base = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("routes.json");
        std::fs::write(&cache_path, r#"{"response":[]}"#).unwrap();

        let client = client(2, &base);
        let value: serde_json::Value = client
            .fetch_json_cached(
                &FetchRequest::get(format!("{base}/routes")),
                &cache_path,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["response"][0]["name"], "Bogota");
        assert_eq!(std::fs::read_to_string(&cache_path).unwrap(), ROUTES_BODY);
    }
}
