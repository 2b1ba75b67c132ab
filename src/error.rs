//! Error handling for the resilient request layer.
//!
//! Design principles, in order:
//!
//! 1. **Errors are values**: HTTP failure statuses are carried as data
//!    (`Error::Http` with the observed [`StatusCode`]); callers and the retry
//!    loop branch on status values, never on downcast exception types.
//! 2. **Type safety**: strongly-typed variants via `thiserror`, with
//!    `#[non_exhaustive]` enums for forward compatibility.
//! 3. **Performance**: `Cow<'static, str>` messages avoid allocation for
//!    static strings; oversized HTTP bodies are truncated before they are
//!    embedded in an error.
//! 4. **Thread safety**: all error types are `Send + Sync + 'static`.
//!
//! # Error hierarchy
//!
//! ```text
//! Error
//! ├── Http           - non-2xx/3xx response surfaced after retry exhaustion
//! ├── Network        - transport layer failures (via NetworkError)
//! ├── InvalidRequest - malformed descriptor, header, or pattern
//! ├── Decode         - response body deserialization failures
//! └── Task           - batch worker task failures
//! ```

use std::borrow::Cow;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for all operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length for error messages to prevent memory bloat from large HTTP responses.
const MAX_ERROR_MESSAGE_LEN: usize = 1024;

/// Truncates a string to a maximum length, adding "... (truncated)" if needed.
fn truncate_message(mut msg: String) -> String {
    if msg.len() > MAX_ERROR_MESSAGE_LEN {
        msg.truncate(MAX_ERROR_MESSAGE_LEN);
        msg.push_str("... (truncated)");
    }
    msg
}

/// Transport layer errors, hiding implementation details.
///
/// Wraps all network-related failures without exposing third-party library
/// types (like `reqwest::Error`) in the public API, so the transport
/// implementation can change without breaking callers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NetworkError {
    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// A connection could not be established or was lost mid-request.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request failed for another transport-level reason.
    #[error("Request failed: {0}")]
    RequestFailed(String),
}

impl NetworkError {
    /// Returns `true` if this failure may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetworkError::Timeout | NetworkError::ConnectionFailed(_)
        )
    }
}

/// Main error type for the resilient request layer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A non-2xx/3xx HTTP response, surfaced as an error once no retry
    /// budget remains (or immediately when no policy is active).
    #[error("HTTP {status}: {body}")]
    Http {
        /// The observed response status.
        status: StatusCode,
        /// Response body, truncated to a bounded length.
        body: String,
    },

    /// Transport layer failure.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The request descriptor, a header value, or a route pattern was invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    /// The response body could not be deserialized.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A batch worker task failed to complete.
    #[error("Task failed: {0}")]
    Task(String),
}

impl Error {
    /// Creates an HTTP status error, truncating an oversized body.
    pub fn http(status: StatusCode, body: impl Into<String>) -> Self {
        Error::Http {
            status,
            body: truncate_message(body.into()),
        }
    }

    /// Creates a network error from a message.
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(NetworkError::RequestFailed(msg.into()))
    }

    /// Creates a timeout error.
    pub fn timeout() -> Self {
        Error::Network(NetworkError::Timeout)
    }

    /// Creates an invalid-request error.
    ///
    /// Accepts both static strings (zero allocation) and owned strings.
    pub fn invalid_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Error::InvalidRequest(msg.into())
    }

    /// Returns the HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the operation that produced this error may succeed
    /// on retry: transport timeouts, connection failures, server errors
    /// (5xx), and rate limiting (429).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_retryable(),
            Error::Http { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Network(NetworkError::Timeout)
        } else if e.is_connect() {
            Error::Network(NetworkError::ConnectionFailed(e.to_string()))
        } else {
            Error::Network(NetworkError::RequestFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = Error::http(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.to_string(), "HTTP 500 Internal Server Error: boom");
    }

    #[test]
    fn test_http_error_truncates_body() {
        let big = "x".repeat(4096);
        let err = Error::http(StatusCode::BAD_GATEWAY, big);
        if let Error::Http { body, .. } = &err {
            assert!(body.len() < 2048);
            assert!(body.ends_with("... (truncated)"));
        } else {
            panic!("expected Http variant");
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::timeout().is_retryable());
        assert!(Error::Network(NetworkError::ConnectionFailed("refused".into())).is_retryable());
        assert!(Error::http(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(Error::http(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());

        assert!(!Error::http(StatusCode::BAD_REQUEST, "").is_retryable());
        assert!(!Error::invalid_request("bad header").is_retryable());
    }

    #[test]
    fn test_status_accessor() {
        let err = Error::http(StatusCode::NOT_FOUND, "missing");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(Error::timeout().status(), None);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<Error>();
        assert_send_sync::<NetworkError>();
    }
}
