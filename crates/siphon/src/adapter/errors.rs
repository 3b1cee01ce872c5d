use std::time::Duration;

use thiserror::Error;

use crate::entity::platform::Platform;
use crate::http::HttpError;

/// Errors raised while fetching pages from an upstream platform.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS or timeout failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Upstream asked us to slow down (HTTP 429 or quota exhausted).
    #[error("Rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// Credentials missing, invalid or insufficient.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The source no longer exists upstream.
    #[error("Not found upstream: {resource}")]
    NotFound { resource: String },

    /// Any other non-success status.
    #[error("Upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Malformed upstream response: {message}")]
    Malformed { message: String },

    /// The adapter cannot run with the current settings (missing API key,
    /// source identifier the adapter cannot address).
    #[error("Adapter misconfigured: {message}")]
    Configuration { message: String },
}

impl FetchError {
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, url: &str, body: &str) -> Self {
        let message: String = body.lines().next().unwrap_or_default().chars().take(200).collect();
        match status {
            401 | 403 => Self::Auth {
                message: if message.is_empty() {
                    format!("HTTP {status} from {url}")
                } else {
                    message
                },
            },
            404 | 410 => Self::NotFound {
                resource: url.to_string(),
            },
            429 => Self::RateLimited { retry_after: None },
            _ => Self::Status { status, message },
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408,
            Self::Auth { .. }
            | Self::NotFound { .. }
            | Self::Malformed { .. }
            | Self::Configuration { .. } => false,
        }
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Errors raised while turning a URL into a source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No registered adapter recognizes the URL.
    #[error("No adapter recognizes '{url}'")]
    Unrecognized { url: String },

    /// An adapter recognizes the host but the URL does not address a source.
    #[error("{platform} URL '{url}' does not identify a source: {reason}")]
    Unsupported {
        platform: Platform,
        url: String,
        reason: String,
    },
}

impl ResolveError {
    pub fn unsupported(platform: Platform, url: &url::Url, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            platform,
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single payload that could not be mapped to a canonical item.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct NormalizationError {
    pub reason: String,
}

impl NormalizationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// A required field is absent or empty.
    pub fn missing(field: &str) -> Self {
        Self::new(format!("missing required field '{field}'"))
    }

    /// A field is present but unusable.
    pub fn invalid(field: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(format!("invalid field '{field}': {detail}"))
    }
}

/// Registry lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No adapter registered for platform {0}")]
    UnknownPlatform(Platform),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_and_retryability() {
        let err = FetchError::from_status(429, "u", "");
        assert!(matches!(err, FetchError::RateLimited { .. }));
        assert!(err.is_retryable());

        let err = FetchError::from_status(503, "u", "unavailable\nmore");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Upstream returned HTTP 503: unavailable");

        for status in [401, 403] {
            let err = FetchError::from_status(status, "https://api", "");
            assert!(matches!(err, FetchError::Auth { .. }));
            assert!(!err.is_retryable());
        }

        let err = FetchError::from_status(404, "https://api/x", "");
        assert!(
            matches!(err, FetchError::NotFound { ref resource } if resource == "https://api/x")
        );
        assert!(!err.is_retryable());

        assert!(!FetchError::from_status(400, "u", "bad").is_retryable());
        assert!(FetchError::from_status(408, "u", "").is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable_network_errors() {
        let err: FetchError = HttpError::Transport("reset".into()).into();
        assert!(matches!(err, FetchError::Network { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn decode_and_configuration_errors_are_permanent() {
        assert!(!FetchError::malformed("bad json").is_retryable());
        assert!(!FetchError::configuration("no api key").is_retryable());
    }

    #[test]
    fn normalization_error_messages() {
        assert_eq!(
            NormalizationError::missing("guid").to_string(),
            "missing required field 'guid'"
        );
        assert_eq!(
            NormalizationError::invalid("pubDate", "not a date").to_string(),
            "invalid field 'pubDate': not a date"
        );
    }
}
