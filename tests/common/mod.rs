#![allow(dead_code)]

use async_trait::async_trait;
use docs_mcp_rs::chunker::{Chunker, ChunkerConfig, TokenizerKind};
use docs_mcp_rs::error::{DocsError, Result};
use docs_mcp_rs::fetch::{FetchedPage, PageFetcher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Serves canned HTML pages and counts every fetch.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let url = match self.redirects.get(url.as_str()) {
            Some(target) => Url::parse(target).unwrap(),
            None => url.clone(),
        };
        match self.pages.get(url.as_str()) {
            Some(body) => Ok(FetchedPage {
                url: url.clone(),
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: body.clone(),
            }),
            None => Err(DocsError::Fetch {
                url: url.to_string(),
                reason: "http status 404 Not Found".to_string(),
            }),
        }
    }
}

/// `count` words cycling through `pool`, with `anchor` at every third position when given.
pub fn topic_words(anchor: Option<&str>, pool: &[&str], count: usize) -> String {
    (0..count)
        .map(|i| match anchor {
            Some(anchor) if i % 3 == 0 => anchor,
            _ => pool[i % pool.len()],
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn html_page(title: &str, body_text: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{href}\">more</a>"))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav>Home Docs Blog Pricing</nav>\
         <main><p>{body_text}</p></main>\
         <footer>{anchors}</footer>\
         </body></html>"
    )
}

pub const AUTH_POOL: &[&str] = &[
    "token", "oauth", "login", "credential", "secret", "session", "header", "bearer", "refresh",
    "expiry", "scope",
];
pub const DEPLOY_POOL: &[&str] = &[
    "deployment", "server", "docker", "container", "hosting", "region", "scaling", "replica",
    "release", "pipeline",
];
pub const STYLE_POOL: &[&str] = &[
    "styling", "color", "theme", "margin", "padding", "font", "layout", "responsive", "grid",
    "spacing",
];

pub const AUTH_URL: &str = "https://docs.example.dev/docs/auth";
pub const DEPLOY_URL: &str = "https://docs.example.dev/docs/deploy";
pub const STYLE_URL: &str = "https://docs.example.dev/docs/styling";

/// Three 70-word pages on distinct topics; only the auth page mentions "authentication".
pub fn three_topic_fetcher() -> FakeFetcher {
    FakeFetcher::new()
        .with_page(
            AUTH_URL,
            html_page("Authentication", &topic_words(Some("authentication"), AUTH_POOL, 70), &[]),
        )
        .with_page(
            DEPLOY_URL,
            html_page("Deployment", &topic_words(None, DEPLOY_POOL, 70), &[]),
        )
        .with_page(
            STYLE_URL,
            html_page("Styling", &topic_words(None, STYLE_POOL, 70), &[]),
        )
}

pub fn three_topic_seeds() -> Vec<String> {
    vec![AUTH_URL.to_string(), DEPLOY_URL.to_string(), STYLE_URL.to_string()]
}

/// Whitespace windows of 30 words with 5 words of overlap.
pub fn small_chunker() -> Chunker {
    Chunker::new(small_chunking()).unwrap()
}

pub fn small_chunking() -> ChunkerConfig {
    ChunkerConfig {
        chunk_tokens: 30,
        overlap_tokens: 5,
        min_chunk_chars: 10,
        tokenizer: TokenizerKind::Whitespace,
    }
}
