//! Error types for the HTTP client.
//!
//! # Design
//! Only transport-level failures are errors here. A 404 or 500 is a
//! successful exchange and comes back as an `HttpResponse`; callers inspect
//! the status themselves. Every `reqwest::Error` is funneled through
//! [`classify`] so nothing transport-library-specific leaks past the client.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Url;

/// Errors returned by `HttpClient` and its configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The target is not an absolute `http`/`https` URL.
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A per-call header name or value cannot be sent on the wire.
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// DNS resolution, TCP connect, or TLS handshake failed.
    #[error("connection to {url} failed: {cause}")]
    ConnectionFailed { url: String, cause: String },

    /// The configured deadline elapsed before the exchange completed.
    #[error("request to {url} timed out after {}", human(.timeout))]
    Timeout { url: String, timeout: Duration },

    /// The redirect chain was longer than `max_redirects`.
    #[error("request to {url} exceeded the limit of {max} redirects")]
    TooManyRedirects { url: String, max: usize },

    /// Streaming the request or response failed mid-transfer.
    #[error("I/O error talking to {url}: {cause}")]
    IoError { url: String, cause: String },

    /// The caller cancelled the request before it completed.
    #[error("request to {url} was cancelled")]
    Cancelled { url: String },

    /// The client configuration is invalid.
    #[error("invalid client configuration: {0}")]
    ConfigurationError(String),
}

impl ClientError {
    /// The URL this failure relates to, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            ClientError::InvalidUrl { url, .. }
            | ClientError::ConnectionFailed { url, .. }
            | ClientError::Timeout { url, .. }
            | ClientError::TooManyRedirects { url, .. }
            | ClientError::IoError { url, .. }
            | ClientError::Cancelled { url } => Some(url),
            ClientError::InvalidHeader { .. } | ClientError::ConfigurationError(_) => None,
        }
    }
}

fn human(duration: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*duration)
}

/// Limits that shape the error message when a request fails.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub timeout: Duration,
    pub max_redirects: usize,
}

/// Returned from the redirect policy once the hop count passes the limit.
#[derive(Debug, thiserror::Error)]
#[error("redirect limit of {0} exceeded")]
pub(crate) struct RedirectLimitExceeded(pub usize);

/// Map a `reqwest::Error` to the matching `ClientError` variant.
///
/// Order matters: a connect timeout reports both `is_timeout` and
/// `is_connect`, and must surface as `Timeout`.
pub(crate) fn classify(url: &Url, err: reqwest::Error, limits: Limits) -> ClientError {
    let url = url.to_string();
    if err.is_timeout() {
        return ClientError::Timeout {
            url,
            timeout: limits.timeout,
        };
    }
    if err.is_redirect() {
        return ClientError::TooManyRedirects {
            url,
            max: limits.max_redirects,
        };
    }
    let cause = describe(&err);
    if err.is_connect() {
        ClientError::ConnectionFailed { url, cause }
    } else if err.is_builder() {
        ClientError::InvalidUrl { url, reason: cause }
    } else {
        ClientError::IoError { url, cause }
    }
}

/// Render an error and its `source()` chain as one line.
pub(crate) fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
