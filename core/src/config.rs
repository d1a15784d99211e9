//! Client configuration.
//!
//! Every field has an independent default, so callers only spell out what
//! they change:
//!
//! ```
//! use std::time::Duration;
//! use privacy_http::ClientConfig;
//!
//! let config = ClientConfig {
//!     timeout: Duration::from_secs(10),
//!     ..ClientConfig::default()
//! };
//! assert_eq!(config.max_redirects, 5);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Deserializer};

use crate::error::ClientError;
use crate::http::parse_header;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Options for `HttpClient::new`.
///
/// Durations deserialize from humantime strings such as `"30s"` or
/// `"1500ms"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Deadline for the whole exchange: connect, send, redirects, body.
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,

    /// Separate bound on establishing a connection. `None` leaves only
    /// `timeout` in effect.
    #[serde(deserialize_with = "optional_duration")]
    pub connect_timeout: Option<Duration>,

    pub max_redirects: usize,

    /// Sent with every request unless a per-call header of the same name
    /// overrides it.
    pub default_headers: BTreeMap<String, String>,

    pub user_agent: Option<String>,

    pub pool_max_idle_per_host: usize,

    #[serde(deserialize_with = "duration")]
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            default_headers: BTreeMap::new(),
            user_agent: None,
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    /// Read a configuration from a JSON object. Missing fields keep their
    /// defaults; unknown fields are an error.
    pub fn from_json_str(raw: &str) -> Result<Self, ClientError> {
        serde_json::from_str(raw).map_err(|e| ClientError::ConfigurationError(e.to_string()))
    }

    /// Check invariants and return the parsed default headers.
    pub fn validate(&self) -> Result<HeaderMap, ClientError> {
        if self.timeout.is_zero() {
            return Err(invalid("timeout must be greater than zero"));
        }
        if self.connect_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("connect_timeout must be greater than zero"));
        }
        if let Some(agent) = &self.user_agent {
            HeaderValue::from_str(agent)
                .map_err(|e| invalid(format!("user_agent is not a valid header value: {e}")))?;
        }

        let mut headers = HeaderMap::with_capacity(self.default_headers.len());
        for (name, value) in &self.default_headers {
            let (parsed, value) = parse_header(name, value)
                .map_err(|reason| invalid(format!("default header `{name}`: {reason}")))?;
            if headers.contains_key(&parsed) {
                return Err(invalid(format!(
                    "default header `{name}` is repeated (names are case-insensitive)"
                )));
            }
            headers.insert(parsed, value);
        }
        Ok(headers)
    }
}

fn invalid(reason: impl Into<String>) -> ClientError {
    ClientError::ConfigurationError(reason.into())
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn optional_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => humantime::parse_duration(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpClient;

    #[test]
    fn defaults_are_finite() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 5);
        assert!(config.default_headers.is_empty());
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ClientConfig {
            timeout: Duration::ZERO,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClientError::ConfigurationError(_))
        ));
    }

    #[test]
    fn zero_connect_timeout_is_rejected() {
        let config = ClientConfig {
            connect_timeout: Some(Duration::ZERO),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClientError::ConfigurationError(_))
        ));
    }

    #[test]
    fn bad_default_header_is_rejected() {
        let config = ClientConfig {
            default_headers: BTreeMap::from([("bad name".to_string(), "v".to_string())]),
            ..ClientConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bad name"), "{err}");
    }

    #[test]
    fn default_headers_differing_only_in_case_are_rejected() {
        let config = ClientConfig::from_json_str(
            r#"{"default_headers":{"Accept":"a","accept":"b"}}"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));
        assert!(err.to_string().contains("accept"), "{err}");
        assert!(HttpClient::new(config).is_err());
    }

    #[test]
    fn bad_user_agent_is_rejected() {
        let config = ClientConfig {
            user_agent: Some("agent\r\n".to_string()),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_headers_are_parsed() {
        let config = ClientConfig {
            default_headers: BTreeMap::from([("X-Api-Version".to_string(), "2".to_string())]),
            ..ClientConfig::default()
        };
        let headers = config.validate().unwrap();
        assert_eq!(headers.get("x-api-version").unwrap(), "2");
    }

    #[test]
    fn from_json_reads_humantime_durations() {
        let config = ClientConfig::from_json_str(
            r#"{"timeout":"1500ms","connect_timeout":"2s","max_redirects":2,
                "default_headers":{"accept":"application/json"}}"#,
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.default_headers["accept"], "application/json");
        assert_eq!(config.pool_max_idle_per_host, 10);
    }

    #[test]
    fn from_json_empty_object_is_default() {
        assert_eq!(ClientConfig::from_json_str("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let err = ClientConfig::from_json_str(r#"{"retries":3}"#).unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));
    }

    #[test]
    fn from_json_rejects_negative_duration() {
        let err = ClientConfig::from_json_str(r#"{"timeout":"-5s"}"#).unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));
    }
}
