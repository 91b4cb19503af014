//! Classify-then-fetch coordination for one documentation domain.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{DomainProfile, QueryExpansion, RetrievalConfig};
use crate::error::{DocsError, Result};
use crate::intent::{IntentClassification, IntentTable};
use crate::retriever::{DocumentSearch, SearchHit};

const FILLER_WORDS: &[&str] = &[
    "a", "about", "an", "are", "can", "could", "do", "does", "explain", "for", "get", "help",
    "how", "i", "in", "is", "it", "me", "my", "need", "of", "on", "please", "should", "show",
    "tell", "the", "there", "this", "to", "use", "using", "want", "way", "we", "what", "when",
    "where", "which", "why", "with", "would", "you", "your",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStatus {
    Detected,
    NotDetected,
}

/// Outcome of [`Coordinator::coordinate`]. Search fields are set only when detected.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorResult {
    pub status: CoordinationStatus,
    pub domain: String,
    pub classification: IntentClassification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchHit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl CoordinatorResult {
    pub fn is_detected(&self) -> bool {
        self.status == CoordinationStatus::Detected
    }
}

/// Result of checking generated code against the documentation.
#[derive(Debug, Clone, Serialize)]
pub struct CodeValidation {
    pub apis_checked: Vec<String>,
    pub potential_issues: Vec<String>,
    pub reference_urls: Vec<String>,
    pub references: Vec<SearchHit>,
}

pub struct Coordinator {
    domain: String,
    label: String,
    threshold: f32,
    retrieval: RetrievalConfig,
    expansions: Vec<QueryExpansion>,
    api_patterns: Vec<Regex>,
    validation_floor: f32,
    table: Arc<IntentTable>,
    search: Arc<dyn DocumentSearch>,
}

impl Coordinator {
    pub fn new(
        profile: &DomainProfile,
        table: Arc<IntentTable>,
        search: Arc<dyn DocumentSearch>,
    ) -> Result<Self> {
        let api_patterns = profile
            .validation
            .api_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| DocsError::Config {
                    reason: format!("invalid api pattern {p:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            domain: profile.name.clone(),
            label: profile.label.clone(),
            threshold: profile.intent.threshold,
            retrieval: profile.retrieval.clone(),
            expansions: profile.intent.expansions.clone(),
            api_patterns,
            validation_floor: profile.validation.floor,
            table,
            search,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn classify(&self, text: &str) -> IntentClassification {
        self.table.classify(text)
    }

    /// Whether `classification` selects this coordinator's domain with enough confidence.
    pub fn is_detected(&self, classification: &IntentClassification) -> bool {
        classification.domain.as_deref() == Some(self.domain.as_str())
            && classification.confidence >= self.threshold
    }

    pub async fn coordinate(&self, text: &str) -> Result<CoordinatorResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DocsError::invalid_query("request text is empty"));
        }

        let classification = self.classify(text);
        if !self.is_detected(&classification) {
            tracing::debug!(
                "request not routed to {}: domain={:?} confidence={:.2}",
                self.domain,
                classification.domain,
                classification.confidence
            );
            return Ok(CoordinatorResult {
                status: CoordinationStatus::NotDetected,
                domain: self.domain.clone(),
                classification,
                queries: None,
                results: None,
                context: None,
            });
        }

        let queries = self.search_queries(text, &classification);
        let hits = self.search_merged(&queries).await?;
        let context = self.format_context(&hits, text);
        tracing::info!(
            "{} request detected (confidence {:.2}); {} sources from {} queries",
            self.label,
            classification.confidence,
            hits.len(),
            queries.len()
        );

        Ok(CoordinatorResult {
            status: CoordinationStatus::Detected,
            domain: self.domain.clone(),
            classification,
            queries: Some(queries),
            results: Some(hits),
            context: Some(context),
        })
    }

    /// The refined request plus expansions triggered by matched keywords, deduplicated.
    pub fn search_queries(&self, text: &str, classification: &IntentClassification) -> Vec<String> {
        let mut queries = vec![refine_query(text)];
        for expansion in &self.expansions {
            let triggered = classification
                .matched_keywords
                .iter()
                .any(|kw| kw.eq_ignore_ascii_case(&expansion.trigger));
            if triggered && !queries.contains(&expansion.query) {
                queries.push(expansion.query.clone());
            }
        }
        queries.truncate(self.retrieval.max_queries.max(1));
        queries
    }

    async fn search_merged(&self, queries: &[String]) -> Result<Vec<SearchHit>> {
        let mut merged: Vec<SearchHit> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for query in queries {
            let result = match self.search.search(query, self.retrieval.per_query_k).await {
                Ok(result) => result,
                Err(DocsError::InvalidQuery { reason }) => {
                    tracing::warn!("skipping query {:?}: {}", query, reason);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for hit in result.hits {
                match by_id.get(&hit.chunk.id) {
                    Some(&i) => {
                        if hit.score > merged[i].score {
                            merged[i] = hit;
                        }
                    }
                    None => {
                        by_id.insert(hit.chunk.id.clone(), merged.len());
                        merged.push(hit);
                    }
                }
            }
        }

        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(self.retrieval.top_k);
        Ok(merged)
    }

    /// Render hits as a context block for a downstream model prompt.
    pub fn format_context(&self, hits: &[SearchHit], request: &str) -> String {
        if hits.is_empty() {
            return format!("No relevant {} documentation found for this query.", self.label);
        }

        let upper = self.label.to_uppercase();
        let mut context = format!(
            "\n=== {upper} DOCUMENTATION CONTEXT ===\nRetrieved documentation relevant to: {request}\n\n"
        );
        for (i, hit) in hits.iter().enumerate() {
            context.push_str(&format!(
                "--- Source {} (Relevance: {:.3}) ---\n",
                i + 1,
                hit.score
            ));
            context.push_str(&format!("Title: {}\n", hit.chunk.title));
            context.push_str(&format!("URL: {}\n", hit.chunk.url));
            let content = match self.retrieval.context_char_limit {
                Some(limit) => truncate_chars(&hit.chunk.text, limit),
                None => hit.chunk.text.clone(),
            };
            context.push_str(&format!("Content: {content}\n\n"));
        }
        context.push_str(&format!("=== END {upper} DOCUMENTATION CONTEXT ===\n"));
        context.push_str(&format!(
            "Use the above documentation context when generating code or guidance about {}.\n\
             Ensure every method, class and API you reference exists in the provided documentation.\n",
            self.label
        ));
        context
    }

    /// Look up every API referenced by `code` and flag those the docs do not cover.
    pub async fn validate_code(&self, code: &str, original_request: Option<&str>) -> Result<CodeValidation> {
        if code.trim().is_empty() {
            return Err(DocsError::invalid_query("code is empty"));
        }

        let mut apis: Vec<String> = Vec::new();
        for pattern in &self.api_patterns {
            for caps in pattern.captures_iter(code) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let name = m.as_str().to_string();
                if name.chars().count() > 2 && !apis.contains(&name) {
                    apis.push(name);
                }
            }
        }

        let mut issues = Vec::new();
        let mut references: Vec<SearchHit> = Vec::new();
        for api in &apis {
            let result = self.search.search(&format!("{api} method function"), 2).await?;
            let best = result.hits.first().map(|h| h.score);
            if best.is_none_or(|score| score < self.validation_floor) {
                issues.push(format!("API '{api}' not found in documentation"));
            }
            references.extend(result.hits);
        }

        if let Some(request) = original_request.map(str::trim).filter(|r| !r.is_empty()) {
            references.extend(self.search.search(request, 2).await?.hits);
        }

        let mut reference_urls: Vec<String> = Vec::new();
        for hit in &references {
            if !reference_urls.contains(&hit.chunk.url) {
                reference_urls.push(hit.chunk.url.clone());
            }
        }
        reference_urls.truncate(3);
        references.truncate(5);

        Ok(CodeValidation {
            apis_checked: apis,
            potential_issues: issues,
            reference_urls,
            references,
        })
    }
}

/// Drop filler words and surrounding punctuation; fall back to the raw text when nothing
/// salient remains.
pub fn refine_query(text: &str) -> String {
    let salient: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|w| !w.is_empty() && !FILLER_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    if salient.is_empty() {
        text.trim().to_string()
    } else {
        salient.join(" ")
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
