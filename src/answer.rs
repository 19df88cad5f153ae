// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Answer generation on top of search
//!
//! Gathers an evidence base via a normal `search` call, escalates it to the
//! answer engine, and merges answer text, citations, highlights and clusters
//! into one response. The evidence search participates in caching and rate
//! limiting exactly like any other search; the escalation call itself is
//! never cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::backend::AnswerApiRequest;
use crate::error::WebSearchError;
use crate::retry::{with_retry, with_timeout};
use crate::service::{normalize_results, SearchService};
use crate::types::{AnswerParams, SearchResponse};

/// Flat base cost per answer call, by model
const SONAR_BASE_COST: f64 = 0.005;
const SONAR_PRO_BASE_COST: f64 = 0.015;
const SONAR_REASONING_BASE_COST: f64 = 0.025;
/// Surcharge per evidence item carried into the escalation request
const EVIDENCE_ITEM_COST: f64 = 0.001;

/// Answer generation service built on `SearchService`
pub struct AnswerService {
    search: Arc<SearchService>,
}

impl AnswerService {
    /// Create an answer service over an existing search service
    pub fn new(search: Arc<SearchService>) -> Self {
        Self { search }
    }

    /// Generate an answer with citations
    ///
    /// Requires an explicit `sonar_model`; rejects before any network
    /// activity when it is missing. Total `response_time_ms` is the sum of
    /// the evidence search and the escalation call (sequential).
    pub async fn generate_answer(
        &self,
        params: &AnswerParams,
    ) -> Result<SearchResponse, WebSearchError> {
        let model = params
            .sonar_model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                WebSearchError::invalid_parameters(
                    "sonar_model is required for answer generation",
                    "Set sonar_model to one of: sonar, sonar-pro, sonar-reasoning",
                )
            })?
            .to_string();

        let evidence = self.search.search(&params.search).await?;

        let request = AnswerApiRequest {
            model: model.clone(),
            query: evidence.meta.query.clone(),
            evidence: evidence.results.clone(),
        };

        let backend = self.search.backend();
        let config = self.search.config();
        let timeout_ms = config.request_timeout_ms;
        let start = Instant::now();
        let raw = with_retry(
            || {
                let backend = Arc::clone(&backend);
                let request = request.clone();
                async move {
                    with_timeout(async move { backend.answer(request).await }, timeout_ms).await
                }
            },
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        )
        .await
        .map_err(|e| {
            warn!("Answer escalation failed for '{}': {}", params.search.q, e);
            e
        })?;
        let escalation_time_ms = start.elapsed().as_millis() as u64;

        let answer = extract_answer_text(&raw.choices, &raw.answer)?;

        let citations = match raw.citations {
            Some(raw_citations) => normalize_results(raw_citations),
            None => evidence.results.clone(),
        };

        let highlights = raw.highlights.map(|values| {
            values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect::<Vec<String>>()
        });

        let mut response = SearchResponse {
            results: evidence.results,
            meta: evidence.meta,
            answer: Some(answer),
            clusters: raw.clusters,
            highlights,
            citations: Some(citations),
        };
        response.meta.cache_hit = false;
        response.meta.cost_estimate =
            estimate_answer_cost(&model, response.results.len());
        response.meta.response_time_ms += escalation_time_ms;

        info!(
            "Answer generated with {} ({} citations) in {}ms",
            model,
            response.citations.as_ref().map(Vec::len).unwrap_or(0),
            response.meta.response_time_ms
        );

        Ok(response)
    }
}

/// Pull the answer text out of either upstream shape
fn extract_answer_text(
    choices: &Option<Vec<crate::backend::RawAnswerChoice>>,
    flat: &Option<String>,
) -> Result<String, WebSearchError> {
    if let Some(choices) = choices {
        if let Some(content) = choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
        {
            return Ok(content);
        }
    }
    if let Some(answer) = flat {
        return Ok(answer.clone());
    }
    Err(WebSearchError::InvalidResponse {
        message: "Answer engine returned no answer content".to_string(),
    })
}

/// Flat per-model base cost plus a per-evidence-item surcharge
fn estimate_answer_cost(model: &str, evidence_count: usize) -> f64 {
    let base = match model {
        "sonar" => SONAR_BASE_COST,
        "sonar-pro" => SONAR_PRO_BASE_COST,
        "sonar-reasoning" => SONAR_REASONING_BASE_COST,
        _ => SONAR_BASE_COST,
    };
    base + evidence_count as f64 * EVIDENCE_ITEM_COST
}
