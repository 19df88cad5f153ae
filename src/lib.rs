// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resilient web search client
//!
//! Issues outbound search queries against a provider API and guards them
//! end to end:
//! - Sliding-window rate limiting
//! - TTL-based response caching with background expiry
//! - SSRF-safe URL and response validation
//! - Retry with exponential backoff, raced against a timeout
//! - Normalization and deduplication of heterogeneous result shapes
//! - Optional escalation into an answer engine with citations

pub mod answer;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod rate_limiter;
pub mod retry;
pub mod security;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use answer::AnswerService;
pub use backend::{HttpBackend, SearchBackend};
pub use cache::{cache_key, CacheStats, ResponseCache};
pub use config::WebSearchConfig;
pub use error::WebSearchError;
pub use rate_limiter::{RateLimiter, RateLimiterStatus};
pub use service::SearchService;
pub use types::{
    AnswerParams, DedupeStrategy, SearchMeta, SearchParams, SearchResponse, SearchResult,
};
