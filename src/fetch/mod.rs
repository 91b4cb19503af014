use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{sleep, Duration};
use url::Url;

use crate::error::{DocsError, Result};

/// Raw page body plus the response's content type.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

/// Source of page bodies for the corpus builder.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Requests per page, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Pause between consecutive pages of one build.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_max_attempts() -> usize {
    3
}
fn default_backoff_ms() -> u64 {
    250
}
fn default_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            delay_ms: default_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// HTTP page fetcher with a per-request timeout and bounded retries
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    // Counter for requests, including retries
    request_count: Arc<AtomicUsize>,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DocsError::Config {
                reason: format!("failed to build http client: {e}"),
            })?;

        Ok(Self {
            client,
            config,
            request_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Helper method to perform one GET
    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let fetch_error = |reason: String| DocsError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("http status {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        Ok(FetchedPage {
            url: final_url,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Get a page with retry logic
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = Duration::from_millis(self.config.backoff_ms);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < max_attempts => {
                    tracing::warn!("Attempt {}/{} failed for {}: {}", attempt, max_attempts, url, e);
                    sleep(delay).await;
                    // Exponential backoff: double the delay for each retry
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
