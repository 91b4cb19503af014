//! Deterministic text embeddings.
//!
//! The store records the embedder id and dimension it was built with; a query must be embedded
//! by the same embedder for scores to mean anything.

use crc32fast::Hasher as Crc32;
use std::collections::BTreeMap;

use crate::error::{DocsError, Result};

/// Maps text to a fixed-length, L2-normalised vector.
pub trait Embedder: Send + Sync {
    /// Stable identifier persisted in the store manifest.
    fn id(&self) -> String;

    fn dimension(&self) -> usize;

    /// `NoTerms` when the text carries nothing to embed; other errors are embedder faults.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub const DEFAULT_DIMENSION: usize = 384;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "else", "when", "at", "from", "by",
    "for", "with", "about", "into", "through", "to", "of", "in", "on", "is", "are", "was",
    "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would", "can",
    "could", "this", "that", "these", "those", "it", "its", "as",
];

/// Signed feature hashing over lowercase word unigrams and bigrams, weighted by `1 + ln(tf)`.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn terms(text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
            .collect();

        let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
        terms
    }

    fn bucket(&self, term: &str) -> (usize, f32) {
        let mut hasher = Crc32::new();
        hasher.update(term.as_bytes());
        let hash = hasher.finalize();
        let index = (hash as usize) % self.dimension;
        let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> String {
        format!("hash-crc32-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let terms = Self::terms(text);
        if terms.is_empty() {
            return Err(DocsError::NoTerms);
        }

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for term in &terms {
            *counts.entry(term.as_str()).or_default() += 1;
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (term, tf) in counts {
            let (index, sign) = self.bucket(term);
            vector[index] += sign * (1.0 + (tf as f32).ln());
        }

        // opposite-signed collisions can cancel every term
        normalize(&mut vector).ok_or(DocsError::NoTerms)?;
        Ok(vector)
    }
}

/// Scales `vector` to unit length; `None` when it is all zeros.
pub fn normalize(vector: &mut [f32]) -> Option<()> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    for v in vector.iter_mut() {
        *v /= norm;
    }
    Some(())
}

/// Cosine similarity of two unit vectors, clamped to [-1, 1].
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic_and_normalised() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("Configure OAuth authentication").unwrap();
        let b = embedder.embed("Configure OAuth authentication").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSION);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn related_text_scores_higher() {
        let embedder = HashEmbedder::new(2048);
        let query = embedder.embed("authentication setup").unwrap();
        let related = embedder
            .embed("authentication setup requires an auth config and oauth credentials")
            .unwrap();
        let unrelated = embedder
            .embed("deploying containers to a hosting provider with docker")
            .unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn stopword_only_text_has_no_terms() {
        let err = HashEmbedder::default().embed("the and of => ---").unwrap_err();
        assert_eq!(err.kind(), "no_terms");
    }

    #[test]
    fn id_encodes_dimension() {
        assert_eq!(HashEmbedder::new(512).id(), "hash-crc32-512");
    }
}
