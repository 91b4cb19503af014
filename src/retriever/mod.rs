use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::embedding::Embedder;
use crate::error::{DocsError, Result};
use crate::storage::{CorpusStore, DocumentChunk};

pub type SharedStore = Arc<RwLock<CorpusStore>>;

/// One retrieved chunk with its cosine similarity to the query, in [-1, 1].
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Hits ordered by descending score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            hits: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Semantic search over a documentation corpus.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// At most `k` chunks nearest to `query`.
    async fn search(&self, query: &str, k: usize) -> Result<SearchResult>;
}

/// Searches the shared store with the embedder it was built with.
#[derive(Clone)]
pub struct Retriever {
    store: SharedStore,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: SharedStore, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl DocumentSearch for Retriever {
    async fn search(&self, query: &str, k: usize) -> Result<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DocsError::invalid_query("query text is empty"));
        }
        let vector = self.embedder.embed(query).map_err(|e| match e {
            DocsError::NoTerms => DocsError::invalid_query("query has no searchable terms"),
            other => other,
        })?;

        let store = self.store.read().await;
        let corpus = store.corpus()?;
        if corpus.is_empty() || k == 0 {
            return Ok(SearchResult::empty(query));
        }

        let hits = corpus
            .nearest(&vector, k)?
            .into_iter()
            .map(|(chunk, score)| SearchHit {
                chunk: chunk.clone(),
                score,
            })
            .collect();
        tracing::debug!("search {:?} k={} over {} chunks", query, k, corpus.len());

        Ok(SearchResult {
            query: query.to_string(),
            hits,
        })
    }
}
