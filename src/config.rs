// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the web search client

use std::env;

const DEFAULT_SEARCH_API_URL: &str = "https://api.search.example.com/v1/search";
const DEFAULT_ANSWER_API_URL: &str = "https://api.search.example.com/v1/answer";

/// Configuration for search, caching, rate limiting and retries
///
/// Every numeric field falls back to its default when the environment
/// variable is unset, non-numeric, zero, or negative.
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    /// Bearer credential for the search provider
    pub api_key: String,
    /// Search endpoint URL
    pub search_api_url: String,
    /// Answer/escalation endpoint URL
    pub answer_api_url: String,
    /// Cache TTL in minutes
    pub cache_ttl_minutes: u64,
    /// Maximum accepted requests per rate window
    pub rate_limit: usize,
    /// Rate window in milliseconds
    pub rate_window_ms: u64,
    /// Floor on the advertised wait when the window is full, in milliseconds
    pub retry_after_ms: u64,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum accepted response body size in bytes
    pub max_response_bytes: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds
    pub retry_base_delay_ms: u64,
    /// Default result count when a request does not specify one
    pub default_top_k: usize,
}

impl WebSearchConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("SEARCH_API_KEY").unwrap_or_default(),
            search_api_url: env::var("SEARCH_API_URL")
                .unwrap_or_else(|_| DEFAULT_SEARCH_API_URL.to_string()),
            answer_api_url: env::var("ANSWER_API_URL")
                .unwrap_or_else(|_| DEFAULT_ANSWER_API_URL.to_string()),
            cache_ttl_minutes: env_u64("SEARCH_CACHE_TTL_MINUTES", 30),
            rate_limit: env_u64("SEARCH_RATE_LIMIT", 5) as usize,
            rate_window_ms: env_u64("SEARCH_RATE_WINDOW_MS", 1000),
            retry_after_ms: env_u64("SEARCH_RETRY_AFTER_MS", 1000),
            request_timeout_ms: env_u64("SEARCH_TIMEOUT_MS", 10_000),
            max_response_bytes: env_u64("SEARCH_MAX_RESPONSE_BYTES", 5 * 1024 * 1024),
            max_retries: env_u64("SEARCH_MAX_RETRIES", 2) as u32,
            retry_base_delay_ms: env_u64("SEARCH_RETRY_BASE_DELAY_MS", 1000),
            default_top_k: env_u64("SEARCH_DEFAULT_TOP_K", 10) as usize,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.search_api_url.is_empty() {
            return Err("Search API URL must not be empty".to_string());
        }
        if self.rate_limit == 0 {
            return Err("Rate limit must be greater than 0".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Whether a provider credential is configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            search_api_url: DEFAULT_SEARCH_API_URL.to_string(),
            answer_api_url: DEFAULT_ANSWER_API_URL.to_string(),
            cache_ttl_minutes: 30,
            rate_limit: 5,
            rate_window_ms: 1000,
            retry_after_ms: 1000,
            request_timeout_ms: 10_000,
            max_response_bytes: 5 * 1024 * 1024,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            default_top_k: 10,
        }
    }
}

/// Read a positive integer from the environment, falling back silently
fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v as u64)
        .unwrap_or(default)
}
