//! HTTP transport abstraction.
//!
//! The session performs every attempt through the [`Transport`] trait, which
//! turns a [`RequestDescriptor`] into a [`Response`] or a transport-level
//! error. HTTP failure statuses are NOT transport errors: the transport
//! returns the response as observed and the session branches on its status.
//!
//! [`HttpTransport`] is the bundled `reqwest`-backed implementation. Tests
//! substitute their own [`Transport`] to script status sequences and headers.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::request::{Body, RequestDescriptor};
use crate::response::Response;

/// A blackbox HTTP sender.
///
/// Implementations must be shareable across batch workers.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Performs a single HTTP exchange.
    ///
    /// Returns `Ok` for any response the server produced, whatever its
    /// status; `Err` only for transport-level failures (connection,
    /// timeout, protocol).
    async fn send(&self, request: &RequestDescriptor) -> Result<Response>;
}

/// `reqwest`-backed [`Transport`].
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the transport from session configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the underlying
    /// client cannot be built.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent);

        if let Some(proxy_config) = &config.proxy {
            let mut proxy = reqwest::Proxy::all(&proxy_config.url)
                .map_err(|e| Error::network(format!("Invalid proxy URL: {e}")))?;

            if let (Some(username), Some(password)) =
                (&proxy_config.username, &proxy_config.password)
            {
                proxy = proxy.basic_auth(username, password);
            }
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .headers(request.headers().clone());

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }

        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }

        match request.body() {
            Some(Body::Raw(bytes)) => builder = builder.body(bytes.clone()),
            Some(Body::Json(value)) => builder = builder.json(value),
            None => {}
        }

        let response = builder.send().await.map_err(|e| {
            error!(
                method = %request.method(),
                url = %request.url(),
                error = %e,
                "HTTP request send failed"
            );
            Error::from(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("Failed to read response body: {e}")))?;

        debug!(
            status = status.as_u16(),
            body_length = body.len(),
            "HTTP response received"
        );

        Ok(Response::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let config = SessionConfig::default();
        assert!(HttpTransport::new(&config).is_ok());
    }

    #[test]
    fn test_transport_with_proxy() {
        use crate::config::ProxyConfig;

        let config = SessionConfig {
            proxy: Some(ProxyConfig::new("http://localhost:8080")),
            ..Default::default()
        };
        assert!(HttpTransport::new(&config).is_ok());
    }

    #[test]
    fn test_transport_rejects_bad_proxy_url() {
        use crate::config::ProxyConfig;

        let config = SessionConfig {
            proxy: Some(ProxyConfig::new("not a url")),
            ..Default::default()
        };
        assert!(HttpTransport::new(&config).is_err());
    }
}
