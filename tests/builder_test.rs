mod common;

use common::*;
use docs_mcp_rs::builder::{CorpusBuilder, CrawlPolicy};
use docs_mcp_rs::embedding::HashEmbedder;
use std::sync::Arc;

fn builder(fetcher: Arc<FakeFetcher>, policy: CrawlPolicy) -> CorpusBuilder {
    CorpusBuilder::new(
        "test",
        fetcher,
        small_chunker(),
        Arc::new(HashEmbedder::new(256)),
        policy,
    )
}

#[tokio::test]
async fn test_build_indexes_every_page() {
    let fetcher = Arc::new(three_topic_fetcher());
    let (corpus, report) = builder(fetcher.clone(), CrawlPolicy::default())
        .build(&three_topic_seeds(), 10)
        .await
        .unwrap();

    assert_eq!(report.pages_attempted, 3);
    assert_eq!(report.pages_succeeded, 3);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.chunks_indexed, 9);
    assert_eq!(corpus.len(), 9);
    assert_eq!(corpus.urls(), vec![AUTH_URL, DEPLOY_URL, STYLE_URL]);

    let first = corpus.chunks().next().unwrap();
    assert_eq!(first.title, "Authentication");
    assert_eq!(first.index, 0);
    assert!(corpus.chunks().all(|c| c.token_count <= 30));
}

#[tokio::test]
async fn test_rebuild_yields_same_chunk_ids() {
    let fetcher = Arc::new(three_topic_fetcher());
    let b = builder(fetcher, CrawlPolicy::default());

    let (first, _) = b.build(&three_topic_seeds(), 10).await.unwrap();
    let (second, _) = b.build(&three_topic_seeds(), 10).await.unwrap();

    assert_eq!(first.ids(), second.ids());
    assert_eq!(first.len(), second.len());
}

#[tokio::test]
async fn test_failed_pages_are_recorded_and_skipped() {
    let fetcher = Arc::new(three_topic_fetcher().with_page(
        "https://docs.example.dev/docs/empty",
        html_page("Empty", "Page not found", &[]),
    ));
    let seeds = vec![
        AUTH_URL.to_string(),
        "https://docs.example.dev/docs/missing".to_string(),
        "https://docs.example.dev/docs/empty".to_string(),
        "not a url".to_string(),
    ];

    let (corpus, report) = builder(fetcher, CrawlPolicy::default())
        .build(&seeds, 10)
        .await
        .unwrap();

    assert_eq!(report.pages_succeeded, 1);
    assert_eq!(report.pages_failed, 3);
    assert_eq!(corpus.len(), 3);
    let kinds: Vec<&str> = report.failures.iter().map(|f| f.kind).collect();
    assert!(kinds.contains(&"fetch_error"));
    assert!(kinds.contains(&"parse_error"));
}

#[tokio::test]
async fn test_windows_without_terms_are_skipped() {
    let arrows = vec!["=&gt;"; 60].join(" ");
    let deploy_text = format!("{} {arrows}", topic_words(None, DEPLOY_POOL, 30));
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page(
                AUTH_URL,
                html_page("Authentication", &topic_words(Some("authentication"), AUTH_POOL, 70), &[]),
            )
            .with_page(DEPLOY_URL, html_page("Deployment", &deploy_text, &[])),
    );

    let (corpus, report) = builder(fetcher, CrawlPolicy::default())
        .build(&[AUTH_URL.to_string(), DEPLOY_URL.to_string()], 10)
        .await
        .unwrap();

    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.chunks_skipped, 2);
    assert_eq!(corpus.len(), 5);
    assert_eq!(corpus.urls(), vec![AUTH_URL, DEPLOY_URL]);
}

#[tokio::test]
async fn test_zero_successful_pages_is_build_failed() {
    let fetcher = Arc::new(FakeFetcher::new());
    let err = builder(fetcher, CrawlPolicy::default())
        .build(&["https://docs.example.dev/docs/missing".to_string()], 5)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "build_failed");
}

#[tokio::test]
async fn test_page_budget_is_respected() {
    let fetcher = Arc::new(three_topic_fetcher());
    let (_, report) = builder(fetcher.clone(), CrawlPolicy::default())
        .build(&three_topic_seeds(), 2)
        .await
        .unwrap();

    assert_eq!(report.pages_attempted, 2);
    assert_eq!(fetcher.fetches(), 2);
}

#[tokio::test]
async fn test_follow_links_stays_in_scope() {
    let start = "https://docs.example.dev/docs/start";
    let fetcher = Arc::new(
        three_topic_fetcher().with_page(
            start,
            html_page(
                "Start",
                &topic_words(None, STYLE_POOL, 60),
                &[
                    "/docs/auth",
                    "/docs/deploy#section",
                    "/blog/announcement",
                    "https://other.example.com/docs/auth",
                ],
            ),
        ),
    );
    let policy = CrawlPolicy {
        follow_links: true,
        scope: "/docs/".to_string(),
        ..CrawlPolicy::default()
    };

    let (corpus, report) = builder(fetcher.clone(), policy)
        .build(&[start.to_string()], 10)
        .await
        .unwrap();

    assert_eq!(report.pages_attempted, 3);
    assert_eq!(fetcher.fetches(), 3);
    assert_eq!(corpus.urls(), vec![start, AUTH_URL, DEPLOY_URL]);
}

#[tokio::test]
async fn test_links_resolve_against_redirected_url() {
    let fetcher = Arc::new(
        three_topic_fetcher()
            .with_redirect("https://docs.example.dev/docs", "https://docs.example.dev/docs/")
            .with_page(
                "https://docs.example.dev/docs/",
                html_page("Docs", &topic_words(None, STYLE_POOL, 60), &["auth"]),
            ),
    );
    let policy = CrawlPolicy {
        follow_links: true,
        scope: "/docs/".to_string(),
        ..CrawlPolicy::default()
    };

    let (corpus, report) = builder(fetcher, policy)
        .build(&["https://docs.example.dev/docs".to_string()], 10)
        .await
        .unwrap();

    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(corpus.urls(), vec!["https://docs.example.dev/docs/", AUTH_URL]);
}

#[tokio::test]
async fn test_build_from_local_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("intro.md"),
        format!("# Introduction\n\n{}\n", topic_words(None, DEPLOY_POOL, 60)),
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "too short").unwrap();
    std::fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();

    let (corpus, report) = builder(Arc::new(FakeFetcher::new()), CrawlPolicy::default())
        .build_from_path(dir.path())
        .await
        .unwrap();

    assert_eq!(report.pages_attempted, 2);
    assert_eq!(report.pages_succeeded, 1);
    assert_eq!(report.pages_failed, 1);
    let first = corpus.chunks().next().unwrap();
    assert_eq!(first.title, "Introduction");
    assert!(first.url.ends_with("intro.md"));
}
