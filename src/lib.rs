//! Sturdy HTTP
//!
//! A resilient request layer over a blackbox HTTP transport, providing:
//!
//! - **Retry policies**: exponential, linear, constant, jittered, Fibonacci,
//!   capped, and wall-clock duration-bounded backoff
//! - **Rate-limit handling**: automatic 429 waits honoring `Retry-After`,
//!   clamped by a configurable maximum, plus an optional proactive
//!   token-bucket limiter
//! - **Response caching**: TTL-based caching of idempotent GETs
//! - **Batched dispatch**: bounded-width concurrent execution preserving
//!   input order
//! - **Per-endpoint metrics**: URL-pattern tagging with counts, latencies,
//!   errors, and status histograms
//! - **Pluggable authentication**: Bearer, Basic, API-key, and generic
//!   token schemes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sturdy_http::prelude::*;
//!
//! # async fn example() -> sturdy_http::Result<()> {
//! let session = Session::builder()
//!     .rule(RouteRule::new(
//!         r"/api/v1/",
//!         "api",
//!         Some(RetryPolicy::exponential(3, Duration::from_secs(1), 2.0)),
//!     )?)
//!     .cache(ResponseCache::memory())
//!     .build()?;
//!
//! let response = session.get("https://example.com/api/v1/users").await?;
//! let users: serde_json::Value = response.json()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Global suppressions for lints that apply broadly across the codebase:
// - module_name_repetitions: common pattern in Rust libraries
// - missing_errors_doc: not every Result-returning function documents errors
// - must_use_candidate: not all return values need #[must_use]
// - cast_precision_loss: latency/delay math moves between integers and f64
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

// Re-exports of external dependencies used in the public API
pub use bytes;
pub use reqwest;
pub use reqwest::{Method, StatusCode};
pub use serde_json;

// Core modules
pub mod auth;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod rate_limiter;
pub mod request;
pub mod response;
pub mod retry;
pub mod session;
pub mod transport;

// Re-exports of core types for convenience
pub use auth::AuthScheme;
pub use batch::{BatchExecutor, RequestGroup};
pub use cache::ResponseCache;
pub use config::{ProxyConfig, SessionConfig, SessionConfigBuilder};
pub use error::{Error, NetworkError, Result};
pub use metrics::{
    MetricsDelta, MetricsRegistry, MetricsSummary, RouteMetrics, RouteRule, UNKNOWN_TAG,
};
pub use rate_limiter::RateLimiter;
pub use request::{Body, RequestBuilder, RequestDescriptor};
pub use response::Response;
pub use retry::{Backoff, RetryClock, RetryPolicy, UNBOUNDED_ATTEMPTS};
pub use session::{Session, SessionBuilder, parse_retry_after};
pub use transport::{HttpTransport, Transport};

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```rust
/// use sturdy_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::AuthScheme;
    pub use crate::batch::{BatchExecutor, RequestGroup};
    pub use crate::cache::ResponseCache;
    pub use crate::config::{ProxyConfig, SessionConfig};
    pub use crate::error::{Error, NetworkError, Result};
    pub use crate::logging::{LogConfig, LogFormat, LogLevel, init_logging, try_init_logging};
    pub use crate::metrics::{MetricsRegistry, RouteMetrics, RouteRule, UNKNOWN_TAG};
    pub use crate::rate_limiter::RateLimiter;
    pub use crate::request::{Body, RequestDescriptor};
    pub use crate::response::Response;
    pub use crate::retry::{Backoff, RetryPolicy};
    pub use crate::session::Session;
    pub use crate::transport::{HttpTransport, Transport};
    pub use reqwest::{Method, StatusCode};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "sturdy-http");
    }
}
