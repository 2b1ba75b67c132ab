//! Authentication schemes.
//!
//! Each scheme produces exactly one request header for a session:
//!
//! - Bearer: `Authorization: Bearer <token>`
//! - Basic: `Authorization: Basic <base64(user:pass)>`
//! - API key: `<header_name>: <api_key>`
//! - Token: `Authorization: <scheme> <token>`
//!
//! Schemes are stateless values. Applying a scheme to a session replaces the
//! header installed by any previously applied scheme rather than
//! accumulating; see [`Session::authenticate`](crate::session::Session::authenticate).

use base64::{Engine as _, engine::general_purpose};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// A credential-producing authentication scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthScheme {
    /// OAuth-style bearer token.
    Bearer {
        /// The bearer token.
        token: String,
    },
    /// HTTP Basic authentication.
    Basic {
        /// Account username.
        username: String,
        /// Account password.
        password: String,
    },
    /// API key delivered in a configurable header.
    ApiKey {
        /// Header name carrying the key (e.g. `X-Api-Key`).
        header: String,
        /// The key value.
        key: String,
    },
    /// Generic token scheme: `Authorization: <scheme> <token>`.
    Token {
        /// Scheme label placed before the token.
        scheme: String,
        /// The token value.
        token: String,
    },
}

impl AuthScheme {
    /// Bearer token scheme.
    pub fn bearer(token: impl Into<String>) -> Self {
        AuthScheme::Bearer {
            token: token.into(),
        }
    }

    /// Basic auth scheme.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthScheme::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// API key scheme with a custom header name.
    pub fn api_key(header: impl Into<String>, key: impl Into<String>) -> Self {
        AuthScheme::ApiKey {
            header: header.into(),
            key: key.into(),
        }
    }

    /// Generic token scheme.
    pub fn token(scheme: impl Into<String>, token: impl Into<String>) -> Self {
        AuthScheme::Token {
            scheme: scheme.into(),
            token: token.into(),
        }
    }

    /// The header this scheme installs.
    pub fn header_name(&self) -> Result<HeaderName> {
        match self {
            AuthScheme::ApiKey { header, .. } => HeaderName::from_bytes(header.as_bytes())
                .map_err(|_| Error::invalid_request(format!("Invalid auth header name: {header}"))),
            _ => Ok(AUTHORIZATION),
        }
    }

    /// The header value this scheme produces.
    pub fn header_value(&self) -> Result<HeaderValue> {
        let value = match self {
            AuthScheme::Bearer { token } => format!("Bearer {token}"),
            AuthScheme::Basic { username, password } => {
                let encoded = general_purpose::STANDARD.encode(format!("{username}:{password}"));
                format!("Basic {encoded}")
            }
            AuthScheme::ApiKey { key, .. } => key.clone(),
            AuthScheme::Token { scheme, token } => format!("{scheme} {token}"),
        };

        HeaderValue::from_str(&value)
            .map_err(|_| Error::invalid_request("Auth credential contains invalid header bytes"))
    }

    /// Installs this scheme's header into `headers`, overwriting any existing
    /// value under the same name. Returns the installed header name so the
    /// caller can remove it when a different scheme is applied later.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<HeaderName> {
        let name = self.header_name()?;
        let value = self.header_value()?;
        headers.insert(name.clone(), value);
        Ok(name)
    }
}
