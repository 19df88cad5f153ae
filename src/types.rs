// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for web search and answer generation

use serde::{Deserialize, Serialize};

/// Deduplication strategy applied to normalized results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeStrategy {
    /// Keep every result
    None,
    /// Keep the first result per hostname
    Domain,
    /// Keep the first result per exact title
    Title,
}

impl Default for DedupeStrategy {
    fn default() -> Self {
        Self::None
    }
}

/// Parameters for a search request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text search query
    pub q: String,
    /// Maximum number of results to return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Time-range filter (e.g. "day", "week", "month")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    /// Restrict results to a single site
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Language hint (BCP-47)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Region hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Safe-search flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_mode: Option<bool>,
    /// Whether to include snippets in results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_snippets: Option<bool>,
    /// Boolean operator terms merged into the query text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operators: Option<Vec<String>>,
    /// Sites to exclude from results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_sites: Option<Vec<String>>,
    /// Lower date bound (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Upper date bound (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Deduplication strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe: Option<DedupeStrategy>,
}

/// Parameters for answer generation: a search plus an engine selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerParams {
    /// Escalation engine/model, required for answer generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sonar_model: Option<String>,
    /// Search parameters used to build the evidence base
    #[serde(flatten)]
    pub search: SearchParams,
}

/// A single normalized search result
///
/// Invariant: once normalized, `title` and `url` are non-empty and `url`
/// has passed the security filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Title of the search result
    pub title: String,
    /// URL of the search result
    pub url: String,
    /// Snippet/description of the search result
    #[serde(default)]
    pub snippet: String,
    /// Published date if available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// Source provider or domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Relevance score if the provider supplies one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Metadata attached to every search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMeta {
    /// The query as sent upstream (operators merged in)
    pub query: String,
    /// Result count bound applied to the request
    pub top_k: usize,
    /// Time-range filter applied, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    /// Estimated cost of the call in dollars
    pub cost_estimate: f64,
    /// Whether this response was served from cache
    pub cache_hit: bool,
    /// Wall-clock time spent on network calls, in milliseconds
    pub response_time_ms: u64,
}

/// Response from a search or answer operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Normalized, deduplicated results
    pub results: Vec<SearchResult>,
    /// Request/response metadata
    pub meta: SearchMeta,
    /// Generated answer text, present only for answer operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Topic clusters, passed through from the answer engine if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Vec<serde_json::Value>>,
    /// Highlighted passages from the answer engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
    /// Citations backing a generated answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<SearchResult>>,
}
