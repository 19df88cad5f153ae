// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upstream transport seam
//!
//! `SearchBackend` is the boundary between orchestration and the provider
//! HTTP API: one POST for a raw search, one POST for an answer escalation.
//! `HttpBackend` is the reqwest implementation; tests substitute mock
//! implementations of the trait.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::WebSearchConfig;
use crate::error::{classify_status, classify_transport_error, WebSearchError};
use crate::security;
use crate::types::SearchResult;

/// Request body for the raw search endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SearchApiRequest {
    /// Query text with operator terms already merged in
    pub query: String,
    /// Maximum result count
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_snippets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_sites: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Request body for the answer escalation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AnswerApiRequest {
    /// Escalation engine/model
    pub model: String,
    /// Query text
    pub query: String,
    /// Evidence base gathered by the preceding search
    pub evidence: Vec<SearchResult>,
}

/// One result as the provider returns it, before normalization
#[derive(Debug, Clone, Deserialize)]
pub struct RawSearchResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default, alias = "published_at")]
    pub published_date: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Raw search endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct RawSearchResponse {
    #[serde(default)]
    pub results: Vec<RawSearchResult>,
}

/// Raw answer endpoint response
///
/// Providers return either an OpenAI-style choice list or a flat `answer`
/// field; both are accepted and normalized downstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAnswerResponse {
    #[serde(default)]
    pub choices: Option<Vec<RawAnswerChoice>>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub citations: Option<Vec<RawSearchResult>>,
    #[serde(default)]
    pub highlights: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub clusters: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAnswerChoice {
    #[serde(default)]
    pub message: Option<RawAnswerMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAnswerMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Transport boundary for the search provider
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Issue one raw search request
    async fn search(&self, request: SearchApiRequest) -> Result<RawSearchResponse, WebSearchError>;

    /// Issue one answer escalation request
    async fn answer(&self, request: AnswerApiRequest) -> Result<RawAnswerResponse, WebSearchError>;
}

/// reqwest-based backend for the provider HTTP API
pub struct HttpBackend {
    client: Client,
    config: WebSearchConfig,
}

impl HttpBackend {
    /// Create a new HTTP backend
    pub fn new(config: WebSearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// POST a JSON body and return the parsed JSON response
    ///
    /// The target URL must pass the security filter before any bytes go out;
    /// the response is subject to the content-type and size guards.
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<serde_json::Value, WebSearchError> {
        if !security::is_valid_url(url) {
            return Err(WebSearchError::SecurityError {
                message: format!("Refusing to call unsafe URL: {}", security::sanitize_url(url)),
            });
        }

        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.config.request_timeout_ms))?;

        let status = response.status();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        security::check_content_type(content_type.as_deref())?;

        if let Some(declared) = response.content_length() {
            security::check_response_size(declared, self.config.max_response_bytes)?;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(&e, self.config.request_timeout_ms))?;
        security::check_response_size(bytes.len() as u64, self.config.max_response_bytes)?;

        serde_json::from_slice(&bytes).map_err(|e| WebSearchError::InvalidResponse {
            message: format!("JSON parse error: {}", e),
        })
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, request: SearchApiRequest) -> Result<RawSearchResponse, WebSearchError> {
        let value = self.post_json(&self.config.search_api_url, &request).await?;
        serde_json::from_value(value).map_err(|e| WebSearchError::InvalidResponse {
            message: format!("Unexpected search response shape: {}", e),
        })
    }

    async fn answer(&self, request: AnswerApiRequest) -> Result<RawAnswerResponse, WebSearchError> {
        let value = self.post_json(&self.config.answer_api_url, &request).await?;
        serde_json::from_value(value).map_err(|e| WebSearchError::InvalidResponse {
            message: format!("Unexpected answer response shape: {}", e),
        })
    }
}
