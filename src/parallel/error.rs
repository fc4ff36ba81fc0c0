//! Error types for the Parallel HTTP client.

use thiserror::Error;

/// Broad category of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection refused, DNS failure, timeout
    Network,
    /// HTTP 429
    RateLimited,
    /// Other 4xx (bad request, invalid key, quota)
    ClientError,
    /// HTTP 404 for a run lookup
    NotFound,
    /// 5xx
    ServerError,
    /// Body did not match the expected shape
    Parse,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimited => "rate_limited",
            Self::ClientError => "client_error",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::Parse => "parse",
        }
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> ProviderErrorKind {
    match status {
        404 => ProviderErrorKind::NotFound,
        429 => ProviderErrorKind::RateLimited,
        400..=499 => ProviderErrorKind::ClientError,
        _ => ProviderErrorKind::ServerError,
    }
}

/// A failed exchange with the Parallel API.
#[derive(Debug, Clone, Error)]
#[error("{}{}: {}", .kind.as_str(), http_suffix(.status), .message)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Network,
            status: None,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Parse,
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: classify_http_status(status),
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {}", e))
        } else {
            Self::network(format!("Request failed: {}", e))
        }
    }
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_http_status() {
        assert_eq!(classify_http_status(404), ProviderErrorKind::NotFound);
        assert_eq!(classify_http_status(429), ProviderErrorKind::RateLimited);
        assert_eq!(classify_http_status(401), ProviderErrorKind::ClientError);
        assert_eq!(classify_http_status(422), ProviderErrorKind::ClientError);
        assert_eq!(classify_http_status(503), ProviderErrorKind::ServerError);
    }

    #[test]
    fn test_display_includes_status() {
        let err = ProviderError::http(402, "quota exceeded");
        assert_eq!(err.to_string(), "client_error (HTTP 402): quota exceeded");
        let err = ProviderError::network("Connection failed");
        assert_eq!(err.to_string(), "network: Connection failed");
    }

    #[test]
    fn test_is_std_error() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(ProviderError::http(503, "unavailable"));
        assert_eq!(err.to_string(), "server_error (HTTP 503): unavailable");
        assert!(err.source().is_none());
    }
}
