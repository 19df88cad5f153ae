// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! TTL-based response caching
//!
//! Entries expire lazily on read and are additionally removed by a periodic
//! background sweep, so keys that are written once and never re-read do not
//! accumulate. Cache and sweeper state are in-memory only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{DedupeStrategy, SearchParams, SearchResponse};

/// How often the background sweep scans for expired entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    data: SearchResponse,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// TTL-based cache for search responses
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Total entries in cache
    pub total: usize,
    /// Expired entries not yet evicted
    pub expired: usize,
}

impl ResponseCache {
    /// Create a new cache
    ///
    /// # Arguments
    /// * `default_ttl_minutes` - TTL applied when `set` is not given one
    pub fn new(default_ttl_minutes: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl: Duration::from_secs(default_ttl_minutes * 60),
            sweeper: Mutex::new(None),
        }
    }

    /// Get a cached response
    ///
    /// Returns None if absent or expired; an expired entry is removed.
    pub fn get(&self, key: &str) -> Option<SearchResponse> {
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    return Some(entry.data.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        // The entry looked expired under the read lock. A concurrent set may
        // have replaced it before we get the write lock, so re-check before
        // removing.
        let mut entries = self.entries.write().ok()?;
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.data.clone()),
            None => None,
        }
    }

    /// Store a response, overwriting any prior entry for the key
    pub fn set(&self, key: &str, data: SearchResponse, ttl: Option<Duration>) {
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(_) => return,
        };
        entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                inserted_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
            },
        );
    }

    /// Remove one entry
    pub fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// Remove all entries
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Remove every entry whose age exceeds its TTL
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        if let Ok(mut entries) = self.entries.write() {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            let removed = before - entries.len();
            if removed > 0 {
                debug!("Cache sweep removed {} expired entries", removed);
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(_) => {
                return CacheStats {
                    total: 0,
                    expired: 0,
                }
            }
        };
        let now = Instant::now();
        CacheStats {
            total: entries.len(),
            expired: entries.values().filter(|e| e.is_expired(now)).count(),
        }
    }

    /// Start the periodic background sweep
    ///
    /// Holds only a weak reference, so dropping the cache stops the task.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(cache) => cache.cleanup_expired(),
                    None => break,
                }
            }
        });
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(old) = sweeper.replace(handle) {
                old.abort();
            }
        }
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(handle) = sweeper.take() {
                handle.abort();
            }
        }
    }
}

/// Derive the cache key for a parameter set
///
/// Joins, in fixed field order, every parameter that affects the upstream
/// result, separated by `|` and omitting unset fields. Identical semantic
/// parameters always produce an identical key.
pub fn cache_key(params: &SearchParams) -> String {
    let mut parts: Vec<String> = vec![params.q.clone()];

    if let Some(top_k) = params.top_k {
        parts.push(top_k.to_string());
    }
    if let Some(ref time_range) = params.time_range {
        parts.push(time_range.clone());
    }
    if let Some(ref site) = params.site {
        parts.push(site.clone());
    }
    if let Some(ref lang) = params.lang {
        parts.push(lang.clone());
    }
    if let Some(ref region) = params.region {
        parts.push(region.clone());
    }
    if let Some(safe_mode) = params.safe_mode {
        parts.push(safe_mode.to_string());
    }
    if let Some(include_snippets) = params.include_snippets {
        parts.push(include_snippets.to_string());
    }
    if let Some(ref from) = params.from {
        parts.push(from.clone());
    }
    if let Some(ref to) = params.to {
        parts.push(to.clone());
    }
    if let Some(dedupe) = params.dedupe {
        let tag = match dedupe {
            DedupeStrategy::None => "none",
            DedupeStrategy::Domain => "domain",
            DedupeStrategy::Title => "title",
        };
        parts.push(tag.to_string());
    }
    if let Some(ref operators) = params.operators {
        parts.push(operators.join(","));
    }
    if let Some(ref exclude_sites) = params.exclude_sites {
        parts.push(exclude_sites.join(","));
    }

    parts.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchMeta;

    fn response(query: &str) -> SearchResponse {
        SearchResponse {
            results: vec![],
            meta: SearchMeta {
                query: query.to_string(),
                top_k: 10,
                time_range: None,
                cost_estimate: 0.0,
                cache_hit: false,
                response_time_ms: 10,
            },
            answer: None,
            clusters: None,
            highlights: None,
            citations: None,
        }
    }

    #[test]
    fn test_set_and_get() {
        let cache = ResponseCache::new(30);
        cache.set("k", response("rust"), None);
        let hit = cache.get("k").unwrap();
        assert_eq!(hit.meta.query, "rust");
    }

    #[test]
    fn test_miss() {
        let cache = ResponseCache::new(30);
        assert!(cache.get("nonexistent").is_none());
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let cache = ResponseCache::new(30);
        cache.set("k", response("first"), None);
        cache.set("k", response("second"), None);
        assert_eq!(cache.get("k").unwrap().meta.query, "second");
        assert_eq!(cache.stats().total, 1);
    }

    #[test]
    fn test_expired_entry_removed_on_read() {
        let cache = ResponseCache::new(30);
        cache.set("k", response("rust"), Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.get("k").is_none());
        // Lazy expiry removed the entry, not just hid it.
        assert_eq!(cache.stats().total, 0);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = ResponseCache::new(30);
        cache.set("a", response("a"), None);
        cache.set("b", response("b"), None);

        cache.delete("a");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());

        cache.clear();
        assert_eq!(cache.stats().total, 0);
    }

    #[test]
    fn test_cleanup_expired_only_removes_stale() {
        let cache = ResponseCache::new(30);
        cache.set("stale", response("stale"), Some(Duration::from_millis(0)));
        cache.set("fresh", response("fresh"), None);
        std::thread::sleep(Duration::from_millis(10));

        cache.cleanup_expired();
        let stats = cache.stats();
        assert_eq!(stats.total, 1);
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_cache_key_deterministic() {
        let params = SearchParams {
            q: "rust ownership".to_string(),
            top_k: Some(5),
            dedupe: Some(DedupeStrategy::Domain),
            ..Default::default()
        };
        assert_eq!(cache_key(&params), cache_key(&params.clone()));
        assert_eq!(cache_key(&params), "rust ownership|5|domain");
    }

    #[test]
    fn test_cache_key_omits_unset_fields() {
        let params = SearchParams {
            q: "x".to_string(),
            ..Default::default()
        };
        assert_eq!(cache_key(&params), "x");
    }

    #[test]
    fn test_cache_key_field_order() {
        let params = SearchParams {
            q: "q".to_string(),
            top_k: Some(3),
            time_range: Some("week".to_string()),
            site: Some("example.com".to_string()),
            safe_mode: Some(true),
            operators: Some(vec!["AND rust".to_string(), "NOT go".to_string()]),
            exclude_sites: Some(vec!["spam.example".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            cache_key(&params),
            "q|3|week|example.com|true|AND rust,NOT go|spam.example"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overwrite_racing_expiry_eviction_survives() {
        // A reader that sees an expired entry must not evict a fresh entry
        // written for the same key before it reaches the write lock.
        for _ in 0..50 {
            let cache = Arc::new(ResponseCache::new(30));
            cache.set("k", response("stale"), Some(Duration::from_millis(0)));
            std::thread::sleep(Duration::from_millis(1));

            let reader = {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.get("k");
                })
            };
            let writer = {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.set("k", response("fresh"), None);
                })
            };
            reader.await.unwrap();
            writer.await.unwrap();

            // Whatever the interleaving, the fresh entry is retrievable.
            assert_eq!(cache.get("k").unwrap().meta.query, "fresh");
        }
    }

    #[test]
    fn test_get_returns_fresh_entry_replacing_expired() {
        let cache = ResponseCache::new(30);
        cache.set("k", response("stale"), Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(1));
        cache.set("k", response("fresh"), None);
        assert_eq!(cache.get("k").unwrap().meta.query, "fresh");
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_cache_dropped() {
        let cache = Arc::new(ResponseCache::new(30));
        cache.spawn_sweeper();
        drop(cache);
        // Nothing to assert directly; the weak upgrade failing ends the task
        // and Drop aborts the handle. This must not panic or hang.
    }
}
