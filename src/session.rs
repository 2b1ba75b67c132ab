//! Session orchestration.
//!
//! [`Session`] is the long-lived aggregate root tying the pieces together:
//! on each call it consults the response cache, matches the URL against the
//! route rule table, runs the retry/rate-limit decision loop around the
//! transport, and records per-tag metrics.
//!
//! # Observability
//!
//! The request path is traced with the `tracing` crate:
//! - request initiation with URL and method
//! - retry attempts with delay and cause
//! - rate-limit waits with the clamped duration
//! - unparseable Retry-After headers (warning, recovered with a default)
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
//!         r"/users",
//!         "users",
//!         Some(RetryPolicy::exponential(3, Duration::from_secs(1), 2.0)),
//!     )?)
//!     .cache(ResponseCache::memory())
//!     .auth(AuthScheme::bearer("token"))
//!     .build()?;
//!
//! let response = session.get("https://api.example.com/users").await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, warn};

use crate::auth::AuthScheme;
use crate::cache::ResponseCache;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::metrics::{MetricsDelta, MetricsRegistry, MetricsSummary, RouteMetrics, RouteRule};
use crate::rate_limiter::RateLimiter;
use crate::request::RequestDescriptor;
use crate::response::Response;
use crate::retry::{RetryClock, RetryPolicy};
use crate::transport::{HttpTransport, Transport};

/// Wait used when a 429 carries no usable Retry-After advice.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Parses a Retry-After header value into a wait duration.
///
/// The value is either a non-negative decimal number of seconds or an
/// HTTP-date. Numeric parsing is tried first; a date in the past yields a
/// zero wait, never a negative one. An unparseable value logs a warning and
/// falls back to a 1 second default; this function never fails.
pub fn parse_retry_after(value: &str) -> Duration {
    let value = value.trim();

    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        }
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let delta = date.signed_duration_since(chrono::Utc::now());
        let secs = (delta.num_milliseconds() as f64 / 1000.0).max(0.0);
        return Duration::from_secs_f64(secs);
    }

    warn!(value, "Unparseable Retry-After header, using default wait");
    DEFAULT_RETRY_AFTER
}

/// Returns `true` when no wall-clock limit applies or it has not expired.
fn clock_allows(clock: Option<&RetryClock>) -> bool {
    clock.map_or(true, RetryClock::should_retry)
}

/// Resilient request session.
///
/// Owns the rule table, the metrics buckets, the cache, the default headers,
/// and configuration. All request methods take `&self`; a session wrapped in
/// an [`Arc`] is shared concurrently by [`BatchExecutor`](crate::batch::BatchExecutor)
/// workers.
#[derive(Debug)]
pub struct Session {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    registry: MetricsRegistry,
    cache: ResponseCache,
    limiter: Option<RateLimiter>,
    default_headers: RwLock<HeaderMap>,
    auth_header: Mutex<Option<HeaderName>>,
}

impl Session {
    /// Starts building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Performs one logical request.
    ///
    /// In order: cache probe for GETs, timeout defaulting, route resolution
    /// and request counting, the retry loop (when the matched rule carries a
    /// policy) or a single attempt with rate-limit-only handling, metrics
    /// recording, and cache population for successful (200) GETs.
    ///
    /// # Errors
    ///
    /// Returns the last observed failure once no retry budget remains:
    /// [`Error::Http`] for a non-2xx/3xx status, [`Error::Network`] for a
    /// transport failure. A 429 on the final attempt is returned as a normal
    /// response, not an error.
    #[instrument(
        name = "session_request",
        skip(self, request),
        fields(method = %request.method(), url = %request.url())
    )]
    pub async fn request(&self, request: RequestDescriptor) -> Result<Response> {
        let cache_key = if request.method() == Method::GET && self.cache.is_enabled() {
            let key = request.cache_key();
            if let Some(hit) = self.cache.get(&key) {
                debug!(key = %key, "Cache hit");
                return Ok(hit);
            }
            Some(key)
        } else {
            None
        };

        let effective = {
            let defaults = self
                .default_headers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            request
                .with_default_headers(&defaults)
                .with_default_timeout(self.config.timeout)
        };

        let (tag, policy) = self.registry.resolve(effective.url());
        self.registry.record_request(tag);

        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let started = Instant::now();
        let result = match policy {
            Some(policy) => self.run_with_policy(&effective, policy).await,
            None => self.run_single(&effective).await,
        };
        let latency = started.elapsed().as_secs_f64();

        match &result {
            Ok(response) => {
                self.registry
                    .record_outcome(tag, latency, Some(response.status().as_u16()), false);
            }
            Err(e) => {
                self.registry
                    .record_outcome(tag, latency, e.status().map(|s| s.as_u16()), true);
            }
        }

        if let (Some(key), Ok(response)) = (&cache_key, &result) {
            if response.status() == StatusCode::OK {
                self.cache
                    .set(key.clone(), response.clone(), self.config.cache_ttl);
            }
        }

        result
    }

    /// Retry loop for requests whose matched rule carries a policy.
    ///
    /// Attempt indices are zero-based and feed the policy's delay curve
    /// directly. Duration-bounded policies get a fresh [`RetryClock`] per
    /// logical request, consulted before every subsequent attempt.
    async fn run_with_policy(
        &self,
        request: &RequestDescriptor,
        policy: &RetryPolicy,
    ) -> Result<Response> {
        let clock = policy.deadline().map(RetryClock::start);
        let attempts = policy.attempts();
        let mut attempt: u32 = 0;

        loop {
            let outcome = self.transport.send(request).await;
            let budget_left = attempt.saturating_add(1) < attempts;

            match outcome {
                Ok(response)
                    if response.status() == StatusCode::TOO_MANY_REQUESTS
                        && self.config.handle_rate_limits =>
                {
                    let wait = self.rate_limit_wait(&response, policy.calculate_delay(attempt));
                    warn!(
                        attempt,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited, waiting"
                    );
                    sleep(wait).await;
                    if budget_left && clock_allows(clock.as_ref()) {
                        attempt += 1;
                        continue;
                    }
                    // A 429 on the final attempt is a normal, observable
                    // outcome, not an error.
                    return Ok(response);
                }
                Ok(response) if response.is_success() => {
                    debug!(attempt, status = response.status().as_u16(), "Request succeeded");
                    return Ok(response);
                }
                Ok(response) => {
                    let err = Error::http(response.status(), response.text());
                    if !budget_left || !clock_allows(clock.as_ref()) {
                        return Err(err);
                    }
                    let delay = policy.calculate_delay(attempt);
                    warn!(
                        attempt,
                        status = response.status().as_u16(),
                        delay_secs = delay.as_secs_f64(),
                        "Attempt failed, retrying after delay"
                    );
                    sleep(delay).await;
                    if !clock_allows(clock.as_ref()) {
                        return Err(err);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if !budget_left || !clock_allows(clock.as_ref()) {
                        return Err(e);
                    }
                    let delay = policy.calculate_delay(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_secs = delay.as_secs_f64(),
                        "Transport error, retrying after delay"
                    );
                    sleep(delay).await;
                    if !clock_allows(clock.as_ref()) {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Single attempt with rate-limit-only handling, used when the matched
    /// rule carries no policy: send once; on a 429 (handling enabled), wait
    /// the clamped Retry-After and send exactly one more time.
    async fn run_single(&self, request: &RequestDescriptor) -> Result<Response> {
        let response = self.transport.send(request).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS && self.config.handle_rate_limits {
            let advised = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map_or(DEFAULT_RETRY_AFTER, parse_retry_after);
            let wait = advised.min(self.config.rate_limit_max_wait);
            warn!(wait_secs = wait.as_secs_f64(), "Rate limited, re-sending once");
            sleep(wait).await;

            let retried = self.transport.send(request).await?;
            if retried.is_success() || retried.status() == StatusCode::TOO_MANY_REQUESTS {
                return Ok(retried);
            }
            return Err(Error::http(retried.status(), retried.text()));
        }

        if response.is_success() {
            Ok(response)
        } else {
            Err(Error::http(response.status(), response.text()))
        }
    }

    /// Computes the wait for a 429 under a policy: the minimum of the parsed
    /// Retry-After (when present), the policy delay for this attempt, and
    /// the configured maximum wait.
    fn rate_limit_wait(&self, response: &Response, policy_delay: Duration) -> Duration {
        let max_wait = self.config.rate_limit_max_wait;
        match response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
        {
            Some(value) => parse_retry_after(value).min(policy_delay).min(max_wait),
            None => policy_delay.min(max_wait),
        }
    }

    /// Applies an authentication scheme to the session's default headers.
    ///
    /// The header installed by a previously applied scheme is removed first,
    /// so re-applying a different scheme overwrites rather than accumulates.
    pub fn authenticate(&self, scheme: &AuthScheme) -> Result<()> {
        let mut headers = self
            .default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut applied = self
            .auth_header
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(prev) = applied.take() {
            headers.remove(&prev);
        }
        let name = scheme.apply(&mut headers)?;
        *applied = Some(name);
        Ok(())
    }

    /// Executes a GET request.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(RequestDescriptor::get(url)).await
    }

    /// Executes a POST request with a JSON body.
    pub async fn post(&self, url: &str, body: Value) -> Result<Response> {
        self.request(
            RequestDescriptor::builder(Method::POST, url)
                .json(body)
                .build()?,
        )
        .await
    }

    /// Executes a PUT request with a JSON body.
    pub async fn put(&self, url: &str, body: Value) -> Result<Response> {
        self.request(
            RequestDescriptor::builder(Method::PUT, url)
                .json(body)
                .build()?,
        )
        .await
    }

    /// Executes a PATCH request with a JSON body.
    pub async fn patch(&self, url: &str, body: Value) -> Result<Response> {
        self.request(
            RequestDescriptor::builder(Method::PATCH, url)
                .json(body)
                .build()?,
        )
        .await
    }

    /// Executes a DELETE request.
    pub async fn delete(&self, url: &str) -> Result<Response> {
        self.request(RequestDescriptor::builder(Method::DELETE, url).build()?)
            .await
    }

    /// Executes a HEAD request.
    pub async fn head(&self, url: &str) -> Result<Response> {
        self.request(RequestDescriptor::builder(Method::HEAD, url).build()?)
            .await
    }

    /// Per-tag metric summaries.
    pub fn metrics_summary(&self) -> HashMap<String, MetricsSummary> {
        self.registry.summary()
    }

    /// Deep copy of the current metric buckets, for later comparison.
    pub fn metrics_snapshot(&self) -> HashMap<String, RouteMetrics> {
        self.registry.snapshot()
    }

    /// Per-tag request/error deltas versus an earlier snapshot; tags with
    /// zero delta are omitted.
    pub fn compare_metrics(
        &self,
        snapshot: &HashMap<String, RouteMetrics>,
    ) -> HashMap<String, MetricsDelta> {
        self.registry.compare(snapshot)
    }

    /// The session's response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A copy of the current default headers.
    pub fn default_headers(&self) -> HeaderMap {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Builder for [`Session`].
#[derive(Debug)]
pub struct SessionBuilder {
    config: SessionConfig,
    rules: Vec<RouteRule>,
    cache: ResponseCache,
    transport: Option<Arc<dyn Transport>>,
    limiter: Option<RateLimiter>,
    auth: Option<AuthScheme>,
    headers: Vec<(String, String)>,
}

impl SessionBuilder {
    /// Creates a builder with default configuration, no rules, and caching
    /// disabled.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            rules: Vec::new(),
            cache: ResponseCache::disabled(),
            transport: None,
            limiter: None,
            auth: None,
            headers: Vec::new(),
        }
    }

    /// Sets the session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a route rule; rules are evaluated in registration order.
    pub fn rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the response cache.
    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    /// Substitutes the transport. When unset, a [`HttpTransport`] is built
    /// from the session configuration.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Installs a proactive rate limiter consulted before each request.
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Applies an authentication scheme at build time.
    pub fn auth(mut self, scheme: AuthScheme) -> Self {
        self.auth = Some(scheme);
        self
    }

    /// Adds a default header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builds the session.
    ///
    /// # Errors
    ///
    /// Returns an error if a default header or the auth credential is
    /// invalid, or the bundled transport cannot be built.
    pub fn build(self) -> Result<Session> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };

        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::invalid_request(format!("Invalid header name: {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::invalid_request(format!("Invalid header value for {name}")))?;
            default_headers.insert(name, value);
        }

        let auth_header = match &self.auth {
            Some(scheme) => Some(scheme.apply(&mut default_headers)?),
            None => None,
        };

        Ok(Session {
            transport,
            config: self.config,
            registry: MetricsRegistry::new(self.rules),
            cache: self.cache,
            limiter: self.limiter,
            default_headers: RwLock::new(default_headers),
            auth_header: Mutex::new(auth_header),
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
