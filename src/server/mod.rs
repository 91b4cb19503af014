//! Tool logic for one documentation domain, independent of the MCP transport.
//!
//! [`DocsService`] owns the shared store and answers every tool call with a JSON value;
//! [`tools::DocsServer`] exposes it over rmcp.

pub mod tools;

pub use tools::DocsServer;

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Duration;

use crate::builder::{BuildReport, CorpusBuilder, CrawlPolicy};
use crate::chunker::Chunker;
use crate::config::DomainProfile;
use crate::coordinator::Coordinator;
use crate::embedding::Embedder;
use crate::error::{DocsError, Result};
use crate::fetch::PageFetcher;
use crate::intent::IntentTable;
use crate::retriever::{DocumentSearch, Retriever, SharedStore};
use crate::storage::{Corpus, CorpusStore};

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const MAX_RESULTS_LIMIT: usize = 20;
/// Page budget for the refresh triggered by `search_docs` on an empty store.
pub const AUTO_REFRESH_PAGES: usize = 20;

/// Where a refresh takes its pages from.
#[derive(Debug, Clone)]
pub enum RefreshSource {
    Crawl { max_pages: usize },
    Path(PathBuf),
}

pub struct DocsService {
    profile: DomainProfile,
    store: SharedStore,
    retriever: Arc<Retriever>,
    coordinator: Coordinator,
    fetcher: Arc<dyn PageFetcher>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    // Serializes refreshes; searches only take the store read lock
    build_lock: Mutex<()>,
}

impl DocsService {
    pub fn new(
        profile: DomainProfile,
        table: Arc<IntentTable>,
        store_dir: &Path,
        embedder: Arc<dyn Embedder>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self> {
        let store = CorpusStore::open(store_dir, &profile.name, embedder.as_ref());
        let store: SharedStore = Arc::new(RwLock::new(store));
        let retriever = Arc::new(Retriever::new(store.clone(), embedder.clone()));
        let coordinator = Coordinator::new(&profile, table, retriever.clone())?;
        let chunker = Chunker::new(profile.chunking.clone())?;

        Ok(Self {
            profile,
            store,
            retriever,
            coordinator,
            fetcher,
            embedder,
            chunker,
            build_lock: Mutex::new(()),
        })
    }

    pub fn profile(&self) -> &DomainProfile {
        &self.profile
    }

    /// Chunk count, or `StoreUnavailable`.
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.read().await.count()
    }

    pub async fn search_docs(
        &self,
        query: &str,
        max_results: Option<usize>,
        auto_refresh: bool,
    ) -> Result<Value> {
        if query.trim().is_empty() {
            return Err(DocsError::invalid_query("query text is empty"));
        }
        let k = max_results
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_LIMIT);

        let mut total = self.chunk_count().await?;
        if total == 0 && auto_refresh {
            tracing::info!("Store is empty, auto-refreshing {} pages", AUTO_REFRESH_PAGES);
            self.refresh(
                RefreshSource::Crawl {
                    max_pages: AUTO_REFRESH_PAGES,
                },
                false,
            )
            .await?;
            total = self.chunk_count().await?;
        }
        if total == 0 {
            return Ok(json!({
                "status": "empty_database",
                "message": "The documentation store is empty. Run refresh_docs first or pass auto_refresh=true.",
                "query": query,
                "results": [],
            }));
        }

        let result = self.retriever.search(query, k).await?;
        Ok(json!({
            "status": "success",
            "query": result.query,
            "results_count": result.len(),
            "total_chunks": total,
            "results": result.hits,
        }))
    }

    pub async fn detect_intent(&self, text: &str) -> Result<Value> {
        if text.trim().is_empty() {
            return Err(DocsError::invalid_query("text is empty"));
        }
        let classification = self.coordinator.classify(text);
        Ok(json!({
            "is_related": self.coordinator.is_detected(&classification),
            "domain": classification.domain,
            "confidence": classification.confidence,
            "threshold": self.coordinator.threshold(),
            "matched_keywords": classification.matched_keywords,
            "text": text,
        }))
    }

    pub async fn intelligent_agent(&self, user_request: &str, include_code_validation: bool) -> Result<Value> {
        let result = self.coordinator.coordinate(user_request).await?;
        if !result.is_detected() {
            return Ok(json!({
                "status": "not_detected",
                "domain": result.domain,
                "classification": result.classification,
                "message": format!("Request does not appear to be {}-related", self.profile.label),
                "user_request": user_request,
            }));
        }

        let key_sources: Vec<&str> = result
            .results
            .iter()
            .flatten()
            .take(3)
            .map(|hit| hit.chunk.url.as_str())
            .collect();
        let guidance = json!({
            "next_steps": [
                "Use the provided documentation context when generating code",
                "Reference the specific methods and classes mentioned in the context",
                "Follow the patterns shown in the retrieved examples",
            ],
            "key_sources": key_sources,
        });

        let mut response = serde_json::to_value(&result)?;
        if let Value::Object(map) = &mut response {
            map.insert("user_request".into(), json!(user_request));
            map.insert("guidance".into(), guidance);
            if include_code_validation {
                map.insert(
                    "validation_info".into(),
                    json!({
                        "message": "After generating code, use the validate_code tool to check it against the documentation",
                        "recommended": true,
                    }),
                );
            }
        }
        Ok(response)
    }

    pub async fn validate_code(&self, code: &str, original_request: Option<&str>) -> Result<Value> {
        let validation = self.coordinator.validate_code(code, original_request).await?;
        let check_apis = if validation.potential_issues.is_empty() {
            vec!["All APIs appear to be documented".to_string()]
        } else {
            validation.potential_issues.clone()
        };
        Ok(json!({
            "status": "validation_complete",
            "apis_checked": validation.apis_checked,
            "potential_issues": validation.potential_issues,
            "issues_found": validation.potential_issues.len(),
            "validation_sources": validation.references.len(),
            "recommendations": {
                "check_apis": check_apis,
                "reference_docs": validation.reference_urls,
            },
        }))
    }

    /// Rebuild the corpus from `source` and swap it in. A populated store is left alone
    /// unless `force` is set.
    pub async fn refresh(&self, source: RefreshSource, force: bool) -> Result<Value> {
        let _guard = self.build_lock.lock().await;

        let (store_dir, current) = {
            let store = self.store.read().await;
            (store.path().to_path_buf(), store.count().ok())
        };
        if let Some(count) = current.filter(|&c| c > 0 && !force) {
            return Ok(json!({
                "status": "skipped",
                "message": "Store already populated; pass force_refresh=true to rebuild",
                "current_chunk_count": count,
            }));
        }

        let (corpus, report) = self.build(&source).await?;
        let total = corpus.len();
        CorpusStore::persist(&store_dir, &corpus)?;
        self.store.write().await.install(corpus)?;
        tracing::info!("Refresh complete: {} chunks in {:?}", total, store_dir);

        Ok(refresh_summary(total, &report))
    }

    async fn build(&self, source: &RefreshSource) -> Result<(Corpus, BuildReport)> {
        let policy = CrawlPolicy {
            follow_links: self.profile.follow_links,
            scope: self.profile.scope.clone(),
            delay: Duration::from_millis(self.profile.fetch.delay_ms),
        };
        let builder = CorpusBuilder::new(
            &self.profile.name,
            self.fetcher.clone(),
            self.chunker.clone(),
            self.embedder.clone(),
            policy,
        );
        match source {
            RefreshSource::Crawl { max_pages } => {
                let seeds = self.profile.resolve_seeds()?;
                builder.build(&seeds, *max_pages).await
            }
            RefreshSource::Path(path) => builder.build_from_path(path).await,
        }
    }

    pub async fn database_status(&self) -> Value {
        let store = self.store.read().await;
        match store.corpus() {
            Ok(corpus) if !corpus.is_empty() => {
                let samples: Vec<&str> = corpus.urls().into_iter().take(5).collect();
                json!({
                    "status": "active",
                    "domain": self.profile.name,
                    "total_chunks": corpus.len(),
                    "sample_sources": samples,
                    "database_ready": true,
                    "recommendation": "Store is ready for searching",
                })
            }
            Ok(_) => json!({
                "status": "empty",
                "domain": self.profile.name,
                "total_chunks": 0,
                "sample_sources": [],
                "database_ready": false,
                "recommendation": "Run refresh_docs to populate the store",
            }),
            Err(e) => json!({
                "status": "unavailable",
                "domain": self.profile.name,
                "total_chunks": 0,
                "sample_sources": [],
                "database_ready": false,
                "message": e.to_string(),
                "recommendation": "Run refresh_docs with force_refresh=true to rebuild the store",
            }),
        }
    }

    pub async fn index_stats(&self) -> Result<Value> {
        let store = self.store.read().await;
        let corpus = store.corpus()?;
        let urls = corpus.urls();
        let manifest = corpus.manifest();
        Ok(json!({
            "collection": manifest.collection,
            "total_chunks": corpus.len(),
            "unique_pages": urls.len(),
            "sample_urls": urls.iter().take(10).collect::<Vec<_>>(),
            "embedder": manifest.embedder,
            "dimension": manifest.dimension,
            "built_at_epoch_ms": manifest.built_at_epoch_ms,
        }))
    }

    /// Text for the context-injection prompt: the documentation block followed by the request.
    pub async fn context_prompt(&self, request: &str) -> Result<String> {
        let result = self.coordinator.coordinate(request).await?;
        Ok(match result.context {
            Some(context) => format!("{context}\nUser request: {}", request.trim()),
            None => request.trim().to_string(),
        })
    }
}

fn refresh_summary(total: usize, report: &BuildReport) -> Value {
    json!({
        "status": "completed",
        "total_chunks": total,
        "pages_attempted": report.pages_attempted,
        "pages_succeeded": report.pages_succeeded,
        "pages_failed": report.pages_failed,
        "chunks_indexed": report.chunks_indexed,
        "chunks_skipped": report.chunks_skipped,
        "failures": report.failures,
    })
}
