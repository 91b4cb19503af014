//! Keyword-weighted intent classification.

use regex::Regex;
use serde::Serialize;

use crate::config::{DomainProfile, IntentConfig, WeightedTerm};
use crate::error::{DocsError, Result};

/// Which documentation domain a request belongs to, and how strongly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentClassification {
    pub domain: Option<String>,
    pub confidence: f32,
    pub matched_keywords: Vec<String>,
}

impl IntentClassification {
    fn none() -> Self {
        Self {
            domain: None,
            confidence: 0.0,
            matched_keywords: Vec::new(),
        }
    }
}

struct Matcher {
    term: String,
    regex: Regex,
    weight: f32,
}

struct IntentDomain {
    name: String,
    threshold: f32,
    full_weight: f32,
    matchers: Vec<Matcher>,
}

impl IntentDomain {
    fn compile(name: &str, config: &IntentConfig) -> Result<Self> {
        let mut matchers = Vec::with_capacity(config.keywords.len() + config.patterns.len());
        for kw in &config.keywords {
            // word boundaries that also work for terms starting or ending in punctuation
            let pattern = format!(r"(?i)(?:^|\W){}(?:$|\W)", regex::escape(kw.term.trim()));
            matchers.push(Self::matcher(name, kw, &pattern)?);
        }
        for p in &config.patterns {
            matchers.push(Self::matcher(name, p, &format!("(?i){}", p.term))?);
        }

        let total: f32 = matchers.iter().map(|m| m.weight).sum();
        let full_weight = config.full_weight.unwrap_or(total);
        if !(full_weight.is_finite() && full_weight >= 0.0) {
            return Err(DocsError::Config {
                reason: format!("domain {name}: full_weight must be a non-negative number"),
            });
        }

        Ok(Self {
            name: name.to_string(),
            threshold: config.threshold,
            full_weight,
            matchers,
        })
    }

    fn matcher(domain: &str, term: &WeightedTerm, pattern: &str) -> Result<Matcher> {
        if !(term.weight.is_finite() && term.weight >= 0.0) {
            return Err(DocsError::Config {
                reason: format!("domain {domain}: weight of {:?} must be non-negative", term.term),
            });
        }
        let regex = Regex::new(pattern).map_err(|e| DocsError::Config {
            reason: format!("domain {domain}: invalid pattern {:?}: {e}", term.term),
        })?;
        Ok(Matcher {
            term: term.term.clone(),
            regex,
            weight: term.weight,
        })
    }

    fn score(&self, text: &str) -> (f32, Vec<String>) {
        let mut matched_weight = 0.0f32;
        let mut matched = Vec::new();
        for m in &self.matchers {
            if m.regex.is_match(text) {
                matched_weight += m.weight;
                matched.push(m.term.clone());
            }
        }
        let confidence = if self.full_weight > 0.0 {
            (matched_weight / self.full_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (confidence, matched)
    }
}

/// Immutable table of domains and their weighted keywords, compiled once at startup.
pub struct IntentTable {
    domains: Vec<IntentDomain>,
}

impl IntentTable {
    pub fn from_profiles<'a, I>(profiles: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a DomainProfile>,
    {
        let domains = profiles
            .into_iter()
            .map(|p| IntentDomain::compile(&p.name, &p.intent))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { domains })
    }

    /// A single-domain table, mostly useful for tests and ad-hoc tables.
    pub fn single(name: &str, config: &IntentConfig) -> Result<Self> {
        Ok(Self {
            domains: vec![IntentDomain::compile(name, config)?],
        })
    }

    /// Score `text` against every domain; the highest confidence wins, earlier domains on ties.
    pub fn classify(&self, text: &str) -> IntentClassification {
        let mut best = IntentClassification::none();
        for domain in &self.domains {
            let (confidence, matched) = domain.score(text);
            if confidence > best.confidence {
                best = IntentClassification {
                    domain: Some(domain.name.clone()),
                    confidence,
                    matched_keywords: matched,
                };
            }
        }
        best
    }
}
