//! # Gazette Reliability
//!
//! HTTP transport with integrated retry + circuit breaker, shared by the
//! extraction-service client (`gazette-extraction`) and the search-engine
//! client (`gazette-search`).
//!
//! ```rust,ignore
//! use gazette_reliability::{HttpClientService, HttpConfig, FetchOptions};
//!
//! let service = HttpClientService::new(HttpConfig::default())?;
//! let response = service.get("https://example.com", FetchOptions::default()).await?;
//! ```
//!
//! The canonical circuit breaker lives in `gazette_utils` to avoid a
//! circular dependency between this crate and its consumers; it is
//! re-exported here for convenience.

pub mod http_client;

pub use gazette_utils::circuit_breaker::{CircuitBreaker, Clock, Config as CircuitConfig, RealClock, State};
pub use http_client::{extractor_http_config, search_http_config, FetchOptions, HttpClientService, HttpConfig};
