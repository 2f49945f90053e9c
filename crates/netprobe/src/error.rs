//! Error types for network probing.
//!
//! Probe errors are per-attempt data: the validator records them in the
//! attempt's `ProbeResult` and moves on to the next candidate.

use std::fmt;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Categories of probe errors, for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// DNS failure, refused connection, reset.
    Network,
    /// No response within the request timeout.
    Timeout,
    /// The server answered, but not in a usable way.
    Protocol,
    /// The URL itself is malformed.
    InvalidInput,
}

impl ErrorCategory {
    /// Whether the same request might succeed later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network path unreachable",
            Self::Timeout => "Request timed out",
            Self::Protocol => "Unexpected HTTP behavior",
            Self::InvalidInput => "Invalid URL",
        }
    }

    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the container is running and attached to the expected network",
            Self::Timeout => "The service may still be starting; raise [probe] timeout_secs or retry",
            Self::Protocol => "Inspect the redirect chain with `stackpilot diagnose <url>`",
            Self::InvalidInput => "Fix the candidate URL in the [services] section of the config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors for a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The URL could not be parsed or joined.
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL or redirect location.
        url: String,
        /// Parser message.
        message: String,
    },

    /// DNS failure or the connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// HTTP-level failure reported by the client.
    #[error("HTTP error: {message}")]
    Http {
        /// Error message.
        message: String,
        /// Status code if available.
        status: Option<u16>,
    },

    /// The redirect chain exceeded the hop limit.
    #[error("too many redirects (limit {limit})")]
    TooManyRedirects {
        /// Hop limit that was exceeded.
        limit: usize,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl ProbeError {
    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl { .. } => ErrorCategory::InvalidInput,
            Self::Connection(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Http { .. } | Self::TooManyRedirects { .. } | Self::Body(_) => {
                ErrorCategory::Protocol
            }
        }
    }
}

impl From<ureq::Error> for ProbeError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(t) => Self::Timeout(t.to_string()),
            ureq::Error::HostNotFound => Self::Connection("host not found".to_string()),
            ureq::Error::ConnectionFailed => Self::Connection("connection refused".to_string()),
            ureq::Error::Io(e) => Self::Connection(e.to_string()),
            ureq::Error::BadUri(message) => Self::InvalidUrl {
                url: String::new(),
                message,
            },
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            ProbeError::Connection("refused".into()).category(),
            ErrorCategory::Network
        );
        assert!(ProbeError::Timeout("10s".into()).category().is_retryable());
        assert!(!ProbeError::TooManyRedirects { limit: 10 }.category().is_retryable());
        assert_eq!(
            ProbeError::invalid_url("http://", "empty host").category(),
            ErrorCategory::InvalidInput
        );
    }

    #[test]
    fn messages() {
        assert_eq!(
            ProbeError::TooManyRedirects { limit: 3 }.to_string(),
            "too many redirects (limit 3)"
        );
        assert_eq!(
            ProbeError::invalid_url("nope", "relative URL without a base").to_string(),
            "invalid URL 'nope': relative URL without a base"
        );
    }

    #[test]
    fn ureq_status_maps_to_http() {
        let err = ProbeError::from(ureq::Error::StatusCode(502));
        assert_eq!(
            err,
            ProbeError::Http {
                message: "HTTP 502".into(),
                status: Some(502)
            }
        );
        assert_eq!(
            ProbeError::from(ureq::Error::ConnectionFailed).category(),
            ErrorCategory::Network
        );
    }
}
