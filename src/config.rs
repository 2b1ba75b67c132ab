//! Session configuration types.

use std::time::Duration;

/// Configuration for a [`Session`](crate::session::Session).
///
/// Covers per-request defaults (timeout, user agent), rate-limit handling,
/// response caching, and batch dispatch width. Construct via
/// [`SessionConfig::default`] or the [`builder`](SessionConfig::builder).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default per-request timeout, applied when a descriptor carries none.
    pub timeout: Duration,
    /// TCP connection timeout for the bundled transport.
    pub connect_timeout: Duration,
    /// Default User-Agent header value.
    pub user_agent: String,
    /// Whether 429 responses trigger automatic waiting and re-sending.
    pub handle_rate_limits: bool,
    /// Upper bound on any single rate-limit wait, clamping both
    /// server-advised (Retry-After) and policy-computed delays.
    pub rate_limit_max_wait: Duration,
    /// Time-to-live for cached GET responses.
    pub cache_ttl: Duration,
    /// Worker pool width for [`BatchExecutor`](crate::batch::BatchExecutor).
    pub batch_width: usize,
    /// Optional proxy configuration for the bundled transport.
    pub proxy: Option<ProxyConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("sturdy-http/{}", env!("CARGO_PKG_VERSION")),
            handle_rate_limits: true,
            rate_limit_max_wait: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(300),
            batch_width: 4,
            proxy: None,
        }
    }
}

impl SessionConfig {
    /// Creates a builder initialized with the default configuration.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Creates a builder initialized with the default configuration.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Sets the default per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the TCP connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the default User-Agent header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enables or disables automatic 429 handling.
    pub fn handle_rate_limits(mut self, enabled: bool) -> Self {
        self.config.handle_rate_limits = enabled;
        self
    }

    /// Sets the upper bound on any single rate-limit wait.
    pub fn rate_limit_max_wait(mut self, max_wait: Duration) -> Self {
        self.config.rate_limit_max_wait = max_wait;
        self
    }

    /// Sets the TTL for cached GET responses.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Sets the batch worker pool width.
    pub fn batch_width(mut self, width: usize) -> Self {
        self.config.batch_width = width.max(1);
        self
    }

    /// Sets the proxy configuration for the bundled transport.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// Proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL (e.g., "http://127.0.0.1:8080").
    pub url: String,
    /// Optional username for authentication.
    pub username: Option<String>,
    /// Optional password for authentication.
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Create a new proxy configuration with just a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Set credentials for the proxy.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}
