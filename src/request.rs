//! Request descriptors.
//!
//! A [`RequestDescriptor`] captures everything needed to perform one logical
//! request: method, URL, ordered query parameters, headers, an optional body,
//! and an optional per-call timeout. Descriptors are immutable once built and
//! are consumed once per attempt by the transport.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::error::{Error, Result};

/// Request payload: either opaque bytes or a structured JSON document.
///
/// The two forms are mutually exclusive by construction.
#[derive(Debug, Clone)]
pub enum Body {
    /// Raw bytes sent verbatim.
    Raw(Bytes),
    /// JSON document serialized by the transport.
    Json(Value),
}

/// An immutable description of one logical HTTP request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Body>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Starts building a request with the given method and URL.
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Shorthand for a GET request with no query, headers, or body.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query parameters in registration order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Per-call timeout, if set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns a copy with the timeout defaulted to `fallback` when absent.
    pub(crate) fn with_default_timeout(&self, fallback: Duration) -> Self {
        let mut copy = self.clone();
        copy.timeout = Some(copy.timeout.unwrap_or(fallback));
        copy
    }

    /// Returns a copy whose headers start from `defaults`, with the
    /// descriptor's own headers taking precedence on conflicts.
    pub(crate) fn with_default_headers(&self, defaults: &HeaderMap) -> Self {
        let mut copy = self.clone();
        let mut merged = defaults.clone();
        for (name, value) in &self.headers {
            merged.insert(name.clone(), value.clone());
        }
        copy.headers = merged;
        copy
    }

    /// Deterministic cache key: method, URL, and the query parameter set
    /// sorted by key, so parameter order never affects cache hits.
    pub fn cache_key(&self) -> String {
        let mut pairs: Vec<&(String, String)> = self.query.iter().collect();
        pairs.sort();
        let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}|{}|{}", self.method, self.url, query.join("&"))
    }
}

/// Builder for [`RequestDescriptor`].
///
/// Header names and values are validated at [`build`](RequestBuilder::build)
/// time; all other setters are infallible.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    raw_headers: Vec<(String, String)>,
    body: Option<Body>,
    timeout: Option<Duration>,
}

impl RequestBuilder {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            raw_headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Appends a query parameter, preserving insertion order.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header. Names are matched case-insensitively at send time.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.raw_headers.push((name.into(), value.into()));
        self
    }

    /// Sets a raw byte body, replacing any previously set body.
    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Raw(body.into()));
        self
    }

    /// Sets a JSON body, replacing any previously set body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    /// Sets a per-call timeout, overriding the session default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates headers and produces the immutable descriptor.
    pub fn build(self) -> Result<RequestDescriptor> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.raw_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::invalid_request(format!("Invalid header name: {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::invalid_request(format!("Invalid header value for {name}")))?;
            headers.insert(name, value);
        }

        Ok(RequestDescriptor {
            method: self.method,
            url: self.url,
            query: self.query,
            headers,
            body: self.body,
            timeout: self.timeout,
        })
    }
}
