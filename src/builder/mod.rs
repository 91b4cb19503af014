//! Corpus building: crawl, extract, chunk, embed.
//!
//! A build never touches the live store; it returns a fresh [`Corpus`] that the caller
//! persists and swaps in.

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use url::Url;

use crate::chunker::Chunker;
use crate::document::{ContentKind, Document, DocumentScanner, PageExtractor};
use crate::embedding::Embedder;
use crate::error::{DocsError, Result};
use crate::fetch::PageFetcher;
use crate::storage::{Corpus, DocumentChunk};

/// A page that was skipped during a build.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    pub url: String,
    pub kind: &'static str,
    pub message: String,
}

/// Summary of one build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub pages_attempted: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub chunks_indexed: usize,
    pub chunks_skipped: usize,
    pub failures: Vec<PageFailure>,
}

impl BuildReport {
    fn record_failure(&mut self, err: &DocsError, url: &str) {
        self.pages_failed += 1;
        self.failures.push(PageFailure {
            url: url.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}

/// Crawl settings taken from the domain profile.
#[derive(Debug, Clone)]
pub struct CrawlPolicy {
    pub follow_links: bool,
    pub scope: String,
    /// Pause between pages.
    pub delay: Duration,
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self {
            follow_links: false,
            scope: "/".to_string(),
            delay: Duration::ZERO,
        }
    }
}

pub struct CorpusBuilder {
    collection: String,
    fetcher: Arc<dyn PageFetcher>,
    extractor: PageExtractor,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    policy: CrawlPolicy,
}

impl CorpusBuilder {
    pub fn new(
        collection: impl Into<String>,
        fetcher: Arc<dyn PageFetcher>,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        policy: CrawlPolicy,
    ) -> Self {
        Self {
            collection: collection.into(),
            fetcher,
            extractor: PageExtractor::new(),
            chunker,
            embedder,
            policy,
        }
    }

    /// Crawl from `seeds`, attempting at most `max_pages` fetches.
    pub async fn build(&self, seeds: &[String], max_pages: usize) -> Result<(Corpus, BuildReport)> {
        let mut corpus = Corpus::new(&self.collection, self.embedder.as_ref());
        let mut report = BuildReport::default();

        let mut frontier: VecDeque<Url> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        for seed in seeds {
            match Url::parse(seed) {
                Ok(url) => {
                    if seen.insert(normalize_key(&url)) {
                        frontier.push_back(url);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping invalid seed URL {}: {}", seed, e);
                    report.pages_attempted += 1;
                    report.record_failure(
                        &DocsError::Fetch {
                            url: seed.clone(),
                            reason: format!("invalid url: {e}"),
                        },
                        seed,
                    );
                }
            }
        }

        tracing::info!(
            "Starting to index up to {} pages from {} seeds into {}",
            max_pages,
            frontier.len(),
            self.collection
        );

        while report.pages_attempted < max_pages {
            let Some(url) = frontier.pop_front() else {
                break;
            };
            if report.pages_attempted > 0 && !self.policy.delay.is_zero() {
                sleep(self.policy.delay).await;
            }
            report.pages_attempted += 1;
            tracing::info!("[{}/{}] Scraping {}", report.pages_attempted, max_pages, url);

            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", url, e);
                    report.record_failure(&e, url.as_str());
                    continue;
                }
            };

            // relative links resolve against the final url after redirects
            let base = page.url;
            if base != url {
                seen.insert(normalize_key(&base));
            }
            let kind = ContentKind::detect(page.content_type.as_deref(), base.path());
            let extracted = match self.extractor.extract(base.as_str(), &page.body, kind) {
                Ok(extracted) => extracted,
                Err(e) => {
                    tracing::warn!("Failed to extract {}: {}", base, e);
                    report.record_failure(&e, base.as_str());
                    continue;
                }
            };

            if self.policy.follow_links {
                for link in extracted.links {
                    if self.in_scope(&base, &link) && seen.insert(normalize_key(&link)) {
                        frontier.push_back(link);
                    }
                }
            }

            let added = self.index_document(&mut corpus, &extracted.document, &mut report)?;
            report.pages_succeeded += 1;
            tracing::info!("Indexed {} chunks from {}", added, base);
        }

        self.finish(corpus, report)
    }

    /// Index every supported file under `path`; each file becomes one page keyed by its path.
    pub async fn build_from_path(&self, path: &Path) -> Result<(Corpus, BuildReport)> {
        let mut corpus = Corpus::new(&self.collection, self.embedder.as_ref());
        let mut report = BuildReport::default();

        let files = DocumentScanner::new().scan(path)?;
        tracing::info!("Indexing {} local files from {:?}", files.len(), path);

        for file in files {
            let key = file.to_string_lossy().to_string();
            report.pages_attempted += 1;

            let body = match tokio::fs::read_to_string(&file).await {
                Ok(body) => body,
                Err(e) => {
                    let err = DocsError::Fetch {
                        url: key.clone(),
                        reason: e.to_string(),
                    };
                    report.record_failure(&err, &key);
                    continue;
                }
            };

            let kind = ContentKind::detect(None, &key);
            match self.extractor.extract(&key, &body, kind) {
                Ok(extracted) => {
                    self.index_document(&mut corpus, &extracted.document, &mut report)?;
                    report.pages_succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to extract {}: {}", key, e);
                    report.record_failure(&e, &key);
                }
            }
        }

        self.finish(corpus, report)
    }

    /// Chunk and embed one document into `corpus`. Embedder faults abort the build.
    fn index_document(
        &self,
        corpus: &mut Corpus,
        document: &Document,
        report: &mut BuildReport,
    ) -> Result<usize> {
        let min_chars = self.chunker.config().min_chunk_chars;
        let mut added = 0;
        for chunk in self.chunker.split(&document.content) {
            if chunk.text.trim().chars().count() < min_chars {
                report.chunks_skipped += 1;
                continue;
            }
            let embedding = match self.embedder.embed(&chunk.text) {
                Ok(embedding) => embedding,
                Err(DocsError::NoTerms) => {
                    report.chunks_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let replaced = corpus.upsert(
                DocumentChunk {
                    id: DocumentChunk::make_id(&document.url, chunk.index),
                    url: document.url.clone(),
                    title: document.title.clone(),
                    index: chunk.index,
                    token_count: chunk.token_count,
                    content_hash: document.content_hash.clone(),
                    text: chunk.text,
                },
                embedding,
            )?;
            if !replaced {
                added += 1;
                report.chunks_indexed += 1;
            }
        }
        Ok(added)
    }

    fn finish(&self, corpus: Corpus, report: BuildReport) -> Result<(Corpus, BuildReport)> {
        tracing::info!(
            "Indexing summary: attempted={} succeeded={} failed={} chunks={}",
            report.pages_attempted,
            report.pages_succeeded,
            report.pages_failed,
            corpus.len()
        );
        if report.pages_succeeded == 0 {
            return Err(DocsError::BuildFailed {
                attempted: report.pages_attempted,
            });
        }
        Ok((corpus, report))
    }

    fn in_scope(&self, from: &Url, link: &Url) -> bool {
        link.host_str() == from.host_str() && link.path().starts_with(&self.policy.scope)
    }
}

/// Frontier dedup key: no fragment, no trailing slash.
fn normalize_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.as_str().trim_end_matches('/').to_string()
}
