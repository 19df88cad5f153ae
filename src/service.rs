// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Search orchestration
//!
//! Coordinates rate limiting, caching, the guarded upstream call, result
//! normalization and deduplication. One `search` call either fully succeeds
//! with a well-formed response or fails atomically with a `WebSearchError`;
//! failed calls are never cached and never recorded in the rate window.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use url::Url;

use crate::backend::{HttpBackend, RawSearchResult, SearchApiRequest, SearchBackend};
use crate::cache::{cache_key, CacheStats, ResponseCache};
use crate::config::WebSearchConfig;
use crate::error::WebSearchError;
use crate::rate_limiter::{RateLimiter, RateLimiterStatus};
use crate::retry::{with_retry, with_timeout};
use crate::security;
use crate::types::{DedupeStrategy, SearchMeta, SearchParams, SearchResponse, SearchResult};

/// Estimated upstream cost per returned result, in dollars
const COST_PER_RESULT: f64 = 0.001;

/// Main search service: rate limit -> cache -> guarded call -> normalize
pub struct SearchService {
    backend: Arc<dyn SearchBackend>,
    cache: Arc<ResponseCache>,
    rate_limiter: Arc<RateLimiter>,
    config: WebSearchConfig,
}

impl SearchService {
    /// Create a service backed by the HTTP transport
    pub fn new(config: WebSearchConfig) -> Self {
        let backend = Arc::new(HttpBackend::new(config.clone()));
        Self::with_backend(config, backend)
    }

    /// Create a service over an explicit backend (used by tests)
    pub fn with_backend(config: WebSearchConfig, backend: Arc<dyn SearchBackend>) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_ttl_minutes));
        // Sweeper needs a runtime; constructing a service outside one is
        // still allowed (cache then expires lazily only).
        if tokio::runtime::Handle::try_current().is_ok() {
            cache.spawn_sweeper();
        }
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit,
            config.rate_window_ms,
            config.retry_after_ms,
        ));
        Self {
            backend,
            cache,
            rate_limiter,
            config,
        }
    }

    /// Perform a search
    ///
    /// Step order: rate-limit check, cache lookup, guarded upstream call,
    /// normalization, dedup, cache write, rate-limit record. Cache hits
    /// never touch the rate limiter.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResponse, WebSearchError> {
        if params.q.trim().is_empty() {
            return Err(WebSearchError::invalid_parameters(
                "Query must not be empty",
                "Provide a non-empty q parameter",
            ));
        }

        if !self.rate_limiter.check_limit() {
            let wait_ms = self.rate_limiter.time_to_wait();
            return Err(WebSearchError::RateLimitExceeded {
                message: format!(
                    "Request budget of {} per {}ms exhausted",
                    self.config.rate_limit, self.config.rate_window_ms
                ),
                retry_after_ms: Some(wait_ms),
            });
        }

        let key = cache_key(params);
        if let Some(mut hit) = self.cache.get(&key) {
            debug!("Cache hit for query: {}", params.q);
            hit.meta.cache_hit = true;
            return Ok(hit);
        }

        let query = merge_operators(&params.q, params.operators.as_deref());
        let top_k = params.top_k.unwrap_or(self.config.default_top_k);
        let request = SearchApiRequest {
            query: query.clone(),
            top_k,
            time_range: params.time_range.clone(),
            site: params.site.clone(),
            lang: params.lang.clone(),
            region: params.region.clone(),
            safe_mode: params.safe_mode,
            include_snippets: params.include_snippets,
            exclude_sites: params.exclude_sites.clone(),
            from: params.from.clone(),
            to: params.to.clone(),
        };

        let backend = Arc::clone(&self.backend);
        let timeout_ms = self.config.request_timeout_ms;
        let start = Instant::now();
        let raw = with_retry(
            || {
                let backend = Arc::clone(&backend);
                let request = request.clone();
                async move {
                    with_timeout(async move { backend.search(request).await }, timeout_ms).await
                }
            },
            self.config.max_retries,
            Duration::from_millis(self.config.retry_base_delay_ms),
        )
        .await
        .map_err(|e| {
            warn!("Search failed for query '{}': {}", query, e);
            e
        })?;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let normalized = normalize_results(raw.results);
        let results = dedupe_results(normalized, params.dedupe.unwrap_or(DedupeStrategy::None));

        let response = SearchResponse {
            meta: SearchMeta {
                query,
                top_k,
                time_range: params.time_range.clone(),
                cost_estimate: estimate_search_cost(results.len()),
                cache_hit: false,
                response_time_ms,
            },
            results,
            answer: None,
            clusters: None,
            highlights: None,
            citations: None,
        };

        self.cache.set(&key, response.clone(), None);
        self.rate_limiter.increment();

        info!(
            "Search complete: {} results for '{}' in {}ms",
            response.results.len(),
            params.q,
            response_time_ms
        );

        Ok(response)
    }

    /// Perform multiple searches concurrently
    ///
    /// Each search participates in caching and rate limiting independently;
    /// results come back in input order.
    pub async fn batch_search(
        &self,
        param_sets: &[SearchParams],
    ) -> Vec<Result<SearchResponse, WebSearchError>> {
        let futures: Vec<_> = param_sets.iter().map(|p| self.search(p)).collect();
        futures::future::join_all(futures).await
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Clear the response cache
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Snapshot the rate-limiter state
    pub fn rate_status(&self) -> RateLimiterStatus {
        self.rate_limiter.status()
    }

    /// Reset the rate window (diagnostics and tests)
    pub fn reset_rate_limiter(&self) {
        self.rate_limiter.reset();
    }

    pub(crate) fn backend(&self) -> Arc<dyn SearchBackend> {
        Arc::clone(&self.backend)
    }

    pub(crate) fn config(&self) -> &WebSearchConfig {
        &self.config
    }
}

/// Merge boolean operator terms into the query text
fn merge_operators(query: &str, operators: Option<&[String]>) -> String {
    match operators {
        Some(ops) if !ops.is_empty() => {
            let mut merged = query.to_string();
            for op in ops {
                let op = op.trim();
                if !op.is_empty() {
                    merged.push(' ');
                    merged.push_str(op);
                }
            }
            merged
        }
        _ => query.to_string(),
    }
}

/// Normalize raw provider results
///
/// Drops results missing a title or URL or failing URL validation;
/// sanitizes kept URLs and snippet text; coerces optional fields.
pub(crate) fn normalize_results(raw: Vec<RawSearchResult>) -> Vec<SearchResult> {
    raw.into_iter()
        .filter_map(|r| {
            let title = r.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let url = r.url?;
            if url.trim().is_empty() || !security::is_valid_url(&url) {
                return None;
            }
            Some(SearchResult {
                title,
                url: security::sanitize_url(&url),
                snippet: security::sanitize_html(&r.snippet.unwrap_or_default()),
                published_date: r.published_date,
                source: r.source,
                score: r.score,
            })
        })
        .collect()
}

/// Deduplicate results, preserving first-seen order
pub(crate) fn dedupe_results(
    results: Vec<SearchResult>,
    strategy: DedupeStrategy,
) -> Vec<SearchResult> {
    if strategy == DedupeStrategy::None {
        return results;
    }

    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| {
            let key = match strategy {
                DedupeStrategy::Domain => Url::parse(&r.url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| r.url.clone()),
                DedupeStrategy::Title => r.title.clone(),
                DedupeStrategy::None => unreachable!(),
            };
            seen.insert(key)
        })
        .collect()
}

/// Linear cost model over the result count
pub(crate) fn estimate_search_cost(result_count: usize) -> f64 {
    result_count as f64 * COST_PER_RESULT
}
