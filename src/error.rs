// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy for web search operations
//!
//! Every failure surfaced by this crate is a `WebSearchError` with a fixed
//! string code, a human-readable message, and an optional remediation hint.
//! Transport failures from reqwest are mapped into the taxonomy by
//! `classify_transport_error` / `classify_status`.

use thiserror::Error;

/// Errors that can occur during search or answer operations
#[derive(Debug, Error)]
pub enum WebSearchError {
    /// Request parameters failed validation
    #[error("Invalid parameters: {message}")]
    InvalidParameters {
        /// What was wrong with the parameters
        message: String,
        /// How to fix the request
        hint: Option<String>,
    },

    /// Upstream API returned an error response
    #[error("Search API error: {message}")]
    ApiError {
        /// Error message from the API or transport
        message: String,
        /// HTTP status code if one was received
        status: Option<u16>,
        /// How to remediate
        hint: Option<String>,
        /// Raw error payload if one was received
        details: Option<serde_json::Value>,
    },

    /// Transport-level failure (DNS resolution, connect, socket)
    #[error("Network error: {message}")]
    NetworkError {
        /// Underlying transport error message
        message: String,
    },

    /// Local sliding-window request budget exhausted
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Refusal description
        message: String,
        /// Milliseconds until a request will be accepted
        retry_after_ms: Option<u64>,
    },

    /// Provider-side quota exhausted
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        /// Quota error message from the provider
        message: String,
    },

    /// URL or response rejected by the security filter
    #[error("Security error: {message}")]
    SecurityError {
        /// What the filter rejected and why
        message: String,
    },

    /// Operation exceeded its deadline
    #[error("Timeout after {timeout_ms}ms")]
    TimeoutError {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Upstream body could not be parsed into the expected shape
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Parse or shape-mismatch description
        message: String,
    },

    /// Cache subsystem failure
    #[error("Cache error: {message}")]
    CacheError {
        /// What went wrong inside the cache
        message: String,
    },
}

impl WebSearchError {
    /// Fixed string code for this error, stable across messages
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameters { .. } => "INVALID_PARAMETERS",
            Self::ApiError { .. } => "API_ERROR",
            Self::NetworkError { .. } => "NETWORK_ERROR",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::SecurityError { .. } => "SECURITY_ERROR",
            Self::TimeoutError { .. } => "TIMEOUT_ERROR",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::CacheError { .. } => "CACHE_ERROR",
        }
    }

    /// Remediation hint, if one was attached
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InvalidParameters { hint, .. } | Self::ApiError { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Shorthand for a parameter validation failure
    pub fn invalid_parameters(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Map a reqwest transport error into the taxonomy
///
/// Classification order: connect/DNS failures, then timeouts, then any HTTP
/// status carried on the error, then a "quota" substring in the message,
/// then a generic API error with the original message.
pub fn classify_transport_error(err: &reqwest::Error, timeout_ms: u64) -> WebSearchError {
    if err.is_connect() {
        return WebSearchError::NetworkError {
            message: err.to_string(),
        };
    }

    if err.is_timeout() {
        return WebSearchError::TimeoutError { timeout_ms };
    }

    if let Some(status) = err.status() {
        return classify_status(status.as_u16(), &err.to_string());
    }

    let message = err.to_string();
    if message.to_lowercase().contains("quota") {
        return WebSearchError::QuotaExceeded { message };
    }

    WebSearchError::ApiError {
        message,
        status: None,
        hint: None,
        details: None,
    }
}

/// Map an HTTP error status (plus response body) into the taxonomy
pub fn classify_status(status: u16, body: &str) -> WebSearchError {
    match status {
        400 => WebSearchError::InvalidParameters {
            message: format!("Upstream rejected request parameters: {}", truncate(body, 200)),
            hint: Some("Check query syntax and filter values".to_string()),
        },
        401 | 403 => WebSearchError::ApiError {
            message: format!("Authentication failed (HTTP {})", status),
            status: Some(status),
            hint: Some("Verify the API key is set and valid".to_string()),
            details: None,
        },
        429 => WebSearchError::RateLimitExceeded {
            message: "Upstream rate limit hit (HTTP 429)".to_string(),
            retry_after_ms: None,
        },
        500 | 502 | 503 | 504 => WebSearchError::ApiError {
            message: format!("Upstream service unavailable (HTTP {})", status),
            status: Some(status),
            hint: Some("Retry later".to_string()),
            details: None,
        },
        _ => {
            if body.to_lowercase().contains("quota") {
                WebSearchError::QuotaExceeded {
                    message: truncate(body, 200).to_string(),
                }
            } else {
                WebSearchError::ApiError {
                    message: format!("HTTP {}: {}", status, truncate(body, 200)),
                    status: Some(status),
                    hint: None,
                    details: None,
                }
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = WebSearchError::TimeoutError { timeout_ms: 50 };
        assert_eq!(err.code(), "TIMEOUT_ERROR");

        let err = WebSearchError::SecurityError {
            message: "blocked".to_string(),
        };
        assert_eq!(err.code(), "SECURITY_ERROR");

        let err = WebSearchError::CacheError {
            message: "poisoned".to_string(),
        };
        assert_eq!(err.code(), "CACHE_ERROR");
    }

    #[test]
    fn test_status_429_is_rate_limit() {
        let err = classify_status(429, "");
        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
    }

    #[test]
    fn test_status_400_is_invalid_parameters() {
        let err = classify_status(400, "bad query");
        assert_eq!(err.code(), "INVALID_PARAMETERS");
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_status_auth_and_unavailable() {
        assert_eq!(classify_status(401, "").code(), "API_ERROR");
        assert_eq!(classify_status(403, "").code(), "API_ERROR");
        for status in [500u16, 502, 503, 504] {
            let err = classify_status(status, "");
            assert_eq!(err.code(), "API_ERROR");
            assert!(err.to_string().contains("unavailable"));
        }
    }

    #[test]
    fn test_quota_substring_in_body() {
        let err = classify_status(402, "monthly quota exhausted");
        assert_eq!(err.code(), "QUOTA_EXCEEDED");
    }

    #[test]
    fn test_other_status_carries_status_and_reason() {
        let err = classify_status(418, "teapot");
        assert_eq!(err.code(), "API_ERROR");
        let msg = err.to_string();
        assert!(msg.contains("418"));
        assert!(msg.contains("teapot"));
    }

    #[test]
    fn test_error_display() {
        let err = WebSearchError::TimeoutError { timeout_ms: 1500 };
        assert!(err.to_string().contains("1500"));

        let err = WebSearchError::RateLimitExceeded {
            message: "window full".to_string(),
            retry_after_ms: Some(750),
        };
        assert!(err.to_string().contains("window full"));
    }
}
