//! HTTP client service with integrated retry + circuit breaker protection.
//!
//! `HttpClientService` is the single HTTP transport used by both the
//! extraction client (`gazette-extraction`) and the search-index client
//! (`gazette-search`) — one place that owns connection pooling, the retry
//! policy, and the circuit breaker, so both collaborators share the same
//! reliability behavior.
//!
//! # Example
//!
//! ```rust,no_run
//! use gazette_reliability::{HttpClientService, HttpConfig, FetchOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = HttpClientService::new(HttpConfig::default())?;
//! let response = service.get("https://example.com", FetchOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use reqwest::{Client, ClientBuilder, Method, Response as ReqwestResponse, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use gazette_utils::circuit_breaker::{self as circuit, CircuitBreaker, Config as CircuitConfig};
use gazette_utils::retry::RetryPolicy;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub pool_idle_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    pub circuit_failure_threshold: u32,
    pub circuit_cooldown_ms: u64,
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 10,
            user_agent: format!("gazette-pipeline/{}", env!("CARGO_PKG_VERSION")),
            circuit_failure_threshold: 5,
            circuit_cooldown_ms: 30_000,
            max_retries: 3,
            initial_backoff_ms: 1_000,
        }
    }
}

/// `HttpConfig` tuned for the text-extraction service: `connect=30s,
/// read=300s`, 3 retries with `2^attempt` second backoff.
pub fn extractor_http_config() -> HttpConfig {
    HttpConfig {
        timeout_ms: 300_000,
        connect_timeout_ms: 30_000,
        max_retries: 3,
        initial_backoff_ms: 1_000,
        user_agent: format!("gazette-pipeline-extractor/{}", env!("CARGO_PKG_VERSION")),
        ..HttpConfig::default()
    }
}

/// `HttpConfig` tuned for the search engine: `60s` request timeout, 3
/// retries starting at 1s.
pub fn search_http_config() -> HttpConfig {
    HttpConfig {
        timeout_ms: 60_000,
        connect_timeout_ms: 10_000,
        max_retries: 3,
        initial_backoff_ms: 1_000,
        user_agent: format!("gazette-pipeline-search/{}", env!("CARGO_PKG_VERSION")),
        ..HttpConfig::default()
    }
}

/// Options for an individual request.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
    pub max_retries: Option<usize>,
    pub headers: Vec<(String, String)>,
    pub follow_redirects: bool,
    pub bypass_circuit_breaker: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_retries: None,
            headers: vec![],
            follow_redirects: true,
            bypass_circuit_breaker: false,
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn add_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    pub fn bypass_circuit_breaker(mut self) -> Self {
        self.bypass_circuit_breaker = true;
        self
    }
}

/// HTTP client with integrated retry + circuit breaker.
pub struct HttpClientService {
    client: Client,
    circuit_breaker: Arc<CircuitBreaker>,
    retry_policy: RetryPolicy,
    config: HttpConfig,
}

impl HttpClientService {
    pub fn new(config: HttpConfig) -> Result<Self> {
        info!(timeout_ms = config.timeout_ms, "creating http client service");

        let client = ClientBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .use_rustls_tls()
            .build()
            .context("failed to build HTTP client")?;

        let circuit_config = CircuitConfig {
            failure_threshold: config.circuit_failure_threshold,
            open_cooldown_ms: config.circuit_cooldown_ms,
            half_open_max_in_flight: 3,
        };
        let circuit_breaker = CircuitBreaker::new(circuit_config, Arc::new(circuit::RealClock));

        let retry_policy = RetryPolicy::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.initial_backoff_ms * 2u64.pow(config.max_retries.max(1) as u32 - 1),
            2.0,
        );

        Ok(Self {
            client,
            circuit_breaker,
            retry_policy,
            config,
        })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(HttpConfig::default())
    }

    pub async fn get(&self, url: &str, options: FetchOptions) -> Result<ReqwestResponse> {
        self.request(Method::GET, url, None, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        options: FetchOptions,
    ) -> Result<ReqwestResponse> {
        self.request(Method::POST, url, Some(body), options).await
    }

    pub async fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        options: FetchOptions,
    ) -> Result<ReqwestResponse> {
        self.request(Method::PUT, url, Some(body), options).await
    }

    pub async fn delete(&self, url: &str, options: FetchOptions) -> Result<ReqwestResponse> {
        self.request(Method::DELETE, url, None, options).await
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        options: FetchOptions,
    ) -> Result<ReqwestResponse> {
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries);
        let timeout = options
            .timeout
            .unwrap_or(Duration::from_millis(self.config.timeout_ms));

        let retry_policy = if options.max_retries.is_some() {
            RetryPolicy::new(
                max_retries,
                self.config.initial_backoff_ms,
                self.config.initial_backoff_ms * 2u64.pow(max_retries.max(1) as u32 - 1),
                2.0,
            )
        } else {
            self.retry_policy.clone()
        };

        debug!(method = %method, url = %url, max_retries, "dispatching request");

        retry_policy
            .execute(|| async {
                if !options.bypass_circuit_breaker {
                    match self.circuit_breaker.try_acquire() {
                        Ok(_permit) => {}
                        Err(msg) => {
                            error!(reason = msg, "circuit breaker open");
                            return Err(anyhow::anyhow!("circuit breaker open: {msg}"));
                        }
                    }
                }

                let mut request_builder = self.client.request(method.clone(), url).timeout(timeout);
                for (key, value) in &options.headers {
                    request_builder = request_builder.header(key, value);
                }
                if let Some(ref body_data) = body {
                    request_builder = request_builder.body(body_data.clone());
                }

                let response = request_builder.send().await.context("HTTP request failed")?;
                let status = response.status();

                if status.is_success() || status.is_redirection() {
                    if !options.bypass_circuit_breaker {
                        self.circuit_breaker.on_success();
                    }
                    Ok(response)
                } else {
                    if !options.bypass_circuit_breaker {
                        self.circuit_breaker.on_failure();
                    }

                    if status.is_client_error()
                        && status != StatusCode::REQUEST_TIMEOUT
                        && status != StatusCode::TOO_MANY_REQUESTS
                    {
                        warn!(%status, "client error, not retrying");
                        return Err(anyhow::anyhow!("client error: {status}"));
                    }

                    Err(anyhow::anyhow!("HTTP error: {status}"))
                }
            })
            .await
    }

    pub fn circuit_state(&self) -> circuit::State {
        self.circuit_breaker.state()
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_general_purpose_settings() {
        let config = HttpConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 1_000);
    }

    #[test]
    fn extractor_config_uses_tika_timeouts() {
        let config = extractor_http_config();
        assert_eq!(config.connect_timeout_ms, 30_000);
        assert_eq!(config.timeout_ms, 300_000);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn search_config_uses_60s_request_timeout() {
        let config = search_http_config();
        assert_eq!(config.timeout_ms, 60_000);
    }

    #[test]
    fn fetch_options_builder() {
        let options = FetchOptions::default()
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(5)
            .add_header("Content-Type", "application/pdf")
            .no_redirects();

        assert_eq!(options.timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.max_retries, Some(5));
        assert_eq!(options.headers.len(), 1);
        assert!(!options.follow_redirects);
    }

    #[test]
    fn client_service_can_be_constructed() {
        assert!(HttpClientService::new_default().is_ok());
    }
}
