//! Shared low-level utilities used across the gazette pipeline crates.
//!
//! - **Retry**: exponential-backoff retry policy shared by the extraction
//!   and search-index clients.
//! - **Circuit Breaker**: lock-free circuit breaker guarding the
//!   extraction service and search engine.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, Clock, Config as CircuitConfig, RealClock, State};
pub use retry::RetryPolicy;
