mod common;

use common::*;
use docs_mcp_rs::config::{DomainProfile, IntentConfig, WeightedTerm};
use docs_mcp_rs::embedding::HashEmbedder;
use docs_mcp_rs::intent::IntentTable;
use docs_mcp_rs::server::{DocsService, RefreshSource};
use std::sync::Arc;

fn test_profile() -> DomainProfile {
    let mut profile = DomainProfile::composio();
    profile.seed_urls = three_topic_seeds();
    profile.chunking = small_chunking();
    profile.fetch.delay_ms = 0;
    profile.intent = IntentConfig {
        threshold: 0.3,
        full_weight: None,
        keywords: vec![
            WeightedTerm::new("composio", 1.0),
            WeightedTerm::new("authentication", 0.5),
        ],
        ..IntentConfig::default()
    };
    profile
}

fn service(dir: &std::path::Path, fetcher: Arc<FakeFetcher>) -> DocsService {
    let profile = test_profile();
    let table = Arc::new(IntentTable::from_profiles([&profile]).unwrap());
    DocsService::new(profile, table, dir, Arc::new(HashEmbedder::new(2048)), fetcher).unwrap()
}

#[tokio::test]
async fn test_refresh_then_search() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path(), Arc::new(three_topic_fetcher()));

    let summary = svc.refresh(RefreshSource::Crawl { max_pages: 10 }, false).await.unwrap();
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["total_chunks"], 9);
    assert!(dir.path().join("corpus.json").exists());

    let found = svc.search_docs("authentication", Some(3), false).await.unwrap();
    assert_eq!(found["status"], "success");
    assert_eq!(found["results_count"], 3);
    assert_eq!(found["total_chunks"], 9);
    assert_eq!(found["results"][0]["url"], AUTH_URL);
}

#[tokio::test]
async fn test_refresh_skips_populated_store_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(three_topic_fetcher());
    let svc = service(dir.path(), fetcher.clone());
    svc.refresh(RefreshSource::Crawl { max_pages: 10 }, false).await.unwrap();
    assert_eq!(fetcher.fetches(), 3);

    let skipped = svc.refresh(RefreshSource::Crawl { max_pages: 10 }, false).await.unwrap();
    assert_eq!(skipped["status"], "skipped");
    assert_eq!(skipped["current_chunk_count"], 9);
    assert_eq!(fetcher.fetches(), 3);

    let forced = svc.refresh(RefreshSource::Crawl { max_pages: 10 }, true).await.unwrap();
    assert_eq!(forced["status"], "completed");
    assert_eq!(fetcher.fetches(), 6);
    assert_eq!(svc.chunk_count().await.unwrap(), 9);
}

#[tokio::test]
async fn test_failed_build_keeps_previous_corpus() {
    let dir = tempfile::tempdir().unwrap();
    service(dir.path(), Arc::new(three_topic_fetcher()))
        .refresh(RefreshSource::Crawl { max_pages: 10 }, false)
        .await
        .unwrap();

    // every page now fails
    let svc = service(dir.path(), Arc::new(FakeFetcher::new()));
    let err = svc
        .refresh(RefreshSource::Crawl { max_pages: 10 }, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "build_failed");
    assert_eq!(svc.chunk_count().await.unwrap(), 9);
}

#[tokio::test]
async fn test_empty_store_reports_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(three_topic_fetcher());
    let svc = service(dir.path(), fetcher.clone());

    let empty = svc.search_docs("authentication", None, false).await.unwrap();
    assert_eq!(empty["status"], "empty_database");
    assert_eq!(fetcher.fetches(), 0);

    let status = svc.database_status().await;
    assert_eq!(status["status"], "empty");
    assert_eq!(status["database_ready"], false);

    let refreshed = svc.search_docs("authentication", Some(50), true).await.unwrap();
    assert_eq!(refreshed["status"], "success");
    assert_eq!(refreshed["results_count"], 9);
    assert_eq!(fetcher.fetches(), 3);

    let status = svc.database_status().await;
    assert_eq!(status["status"], "active");
    assert_eq!(status["sample_sources"][0], AUTH_URL);
}

#[tokio::test]
async fn test_blank_query_is_rejected_before_store_checks() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(three_topic_fetcher());
    let svc = service(dir.path(), fetcher.clone());

    let err = svc.search_docs("   ", None, true).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_query");
    assert_eq!(fetcher.fetches(), 0);
}

#[tokio::test]
async fn test_index_stats_describe_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path(), Arc::new(three_topic_fetcher()));
    svc.refresh(RefreshSource::Crawl { max_pages: 10 }, false).await.unwrap();

    let stats = svc.index_stats().await.unwrap();
    assert_eq!(stats["total_chunks"], 9);
    assert_eq!(stats["unique_pages"], 3);
    assert_eq!(stats["dimension"], 2048);
    assert_eq!(stats["embedder"], "hash-crc32-2048");
}

#[tokio::test]
async fn test_intelligent_agent_injects_context() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path(), Arc::new(three_topic_fetcher()));
    svc.refresh(RefreshSource::Crawl { max_pages: 10 }, false).await.unwrap();

    let detected = svc
        .intelligent_agent("set up authentication in composio", true)
        .await
        .unwrap();
    assert_eq!(detected["status"], "detected");
    assert!(detected["context"].as_str().unwrap().contains("Title: Authentication"));
    assert_eq!(detected["validation_info"]["recommended"], true);

    let skipped = svc.intelligent_agent("bake a sourdough loaf", true).await.unwrap();
    assert_eq!(skipped["status"], "not_detected");

    let intent = svc.detect_intent("composio authentication").await.unwrap();
    assert_eq!(intent["is_related"], true);
    assert_eq!(intent["domain"], "composio");
}

#[tokio::test]
async fn test_refresh_from_local_path() {
    let dir = tempfile::tempdir().unwrap();
    let docs = tempfile::tempdir().unwrap();
    std::fs::write(
        docs.path().join("auth.md"),
        format!("# Auth\n\n{}\n", topic_words(Some("authentication"), AUTH_POOL, 70)),
    )
    .unwrap();
    let fetcher = Arc::new(FakeFetcher::new());
    let svc = service(dir.path(), fetcher.clone());

    let summary = svc
        .refresh(RefreshSource::Path(docs.path().to_path_buf()), true)
        .await
        .unwrap();
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["pages_succeeded"], 1);
    assert_eq!(fetcher.fetches(), 0);
}
