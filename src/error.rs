//! Error types shared by discovery, lookup, and analysis.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message reported when every discovery strategy came up empty.
pub const NO_DEPENDENCIES_MESSAGE: &str =
    "could not find any dependencies and all strategies to find them failed";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A single discovery strategy could not make sense of the project.
    #[error("{strategy}: {message}")]
    DiscoveryFailed { strategy: String, message: String },

    #[error("{}", NO_DEPENDENCIES_MESSAGE)]
    NoDependenciesFound,

    /// Transport level failure talking to a provider, including timeouts.
    #[error("{provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The provider answered but the answer was unusable. `status` carries
    /// the HTTP status when the failure was a non-success response.
    #[error("{provider} query failed: {message}")]
    ProviderQueryFailed {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Fieldless tag for matching on [`Error`] without caring about messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DiscoveryFailed,
    NoDependenciesFound,
    ProviderUnavailable,
    ProviderQueryFailed,
    InvalidInput,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DiscoveryFailed { .. } => ErrorKind::DiscoveryFailed,
            Error::NoDependenciesFound => ErrorKind::NoDependenciesFound,
            Error::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Error::ProviderQueryFailed { .. } => ErrorKind::ProviderQueryFailed,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn discovery(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn query_failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderQueryFailed {
            provider: provider.into(),
            message: message.into(),
            status: None,
        }
    }

    /// A non-success HTTP response. 401/403 read as authentication
    /// failures, 429 as rate limiting.
    pub fn http_status(provider: impl Into<String>, status: u16, body: &str) -> Self {
        let reason = match status {
            401 | 403 => "authentication failed",
            429 => "rate limited",
            _ => "unexpected response",
        };
        let mut message = format!("HTTP {status}: {reason}");
        let body = body.trim();
        if !body.is_empty() {
            message.push_str(": ");
            message.extend(body.chars().take(200));
        }
        Self::ProviderQueryFailed {
            provider: provider.into(),
            message,
            status: Some(status),
        }
    }

    /// Classifies a reqwest error for `provider`.
    ///
    /// Connection problems and timeouts are transport failures; decoding and
    /// status errors mean the provider did answer.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_status() {
            Self::query_failed(provider, err.to_string())
        } else {
            Self::unavailable(provider, err.to_string())
        }
    }

    /// Whether retrying the same request could plausibly succeed: transport
    /// failures, rate limiting, and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ProviderUnavailable { .. } => true,
            Error::ProviderQueryFailed {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_dependencies_message_is_exact() {
        assert_eq!(
            Error::NoDependenciesFound.to_string(),
            "could not find any dependencies and all strategies to find them failed"
        );
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            Error::discovery("node_modules", "missing").kind(),
            ErrorKind::DiscoveryFailed
        );
        assert_eq!(
            Error::unavailable("OSS Index", "connection refused").kind(),
            ErrorKind::ProviderUnavailable
        );
        assert_eq!(
            Error::query_failed("npm", "HTTP 401").kind(),
            ErrorKind::ProviderQueryFailed
        );
        assert_eq!(
            Error::InvalidInput("no strategies".into()).kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(Error::unavailable("npm", "reset").is_transient());
        assert!(Error::http_status("npm", 429, "").is_transient());
        assert!(Error::http_status("npm", 503, "").is_transient());
        assert!(!Error::http_status("npm", 401, "").is_transient());
        assert!(!Error::query_failed("npm", "bad json").is_transient());
    }

    #[test]
    fn test_http_status_message() {
        let err = Error::http_status("OSS Index", 401, "  Unauthorized ");
        assert_eq!(
            err.to_string(),
            "OSS Index query failed: HTTP 401: authentication failed: Unauthorized"
        );
        assert_eq!(err.kind(), ErrorKind::ProviderQueryFailed);
    }
}
