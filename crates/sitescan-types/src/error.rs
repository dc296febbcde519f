use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for fetch and run outcomes.
///
/// A per-URL error is recorded on the page record and the crawl proceeds;
/// only a seed-level error terminates a run as `Failed`. `BudgetExhausted`
/// and `Cancelled` are normal terminal conditions, not failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum FetchError {
    #[error("DNS resolution failed")]
    Dns,
    #[error("request timed out")]
    Timeout,
    #[error("TLS handshake or certificate validation failed")]
    Tls,
    #[error("client error: HTTP {0}")]
    Http4xx(u16),
    #[error("server error: HTTP {0}")]
    Http5xx(u16),
    #[error("response body could not be parsed")]
    ParseError,
    #[error("redirect chain exceeded the limit")]
    TooManyRedirects,
    #[error("crawl budget exhausted")]
    BudgetExhausted,
    #[error("operation cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Errors worth retrying with backoff. `Http4xx` is terminal per URL.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::Http5xx(_) | FetchError::Dns
        )
    }

    /// Whether the error suggests the page is gated behind script execution
    /// (e.g. a challenge interstitial answering with 403/503 to plain HTTP).
    pub fn suggests_js_gate(&self) -> bool {
        matches!(self, FetchError::Http4xx(403) | FetchError::Http4xx(429) | FetchError::Http5xx(503))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_matches_taxonomy() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Http5xx(502).is_retryable());
        assert!(FetchError::Dns.is_retryable());
        assert!(!FetchError::Http4xx(404).is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }

    #[test]
    fn serialized_form_is_tagged() {
        let json = serde_json::to_value(FetchError::Http4xx(404)).expect("serializes");
        assert_eq!(json["kind"], "Http4xx");
        assert_eq!(json["detail"], 404);
    }
}
