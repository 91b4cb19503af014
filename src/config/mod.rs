//! Domain profiles: everything that distinguishes one documentation server from another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkerConfig;
use crate::error::{DocsError, Result};
use crate::fetch::FetchConfig;

/// A keyword or regex pattern with the weight it contributes to a domain's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub term: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

impl WeightedTerm {
    pub fn new(term: impl Into<String>, weight: f32) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

fn default_weight() -> f32 {
    1.0
}

/// An extra search query issued when `trigger` is among the matched keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExpansion {
    pub trigger: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Weight at which confidence saturates; the sum of all weights when unset.
    #[serde(default)]
    pub full_weight: Option<f32>,
    #[serde(default)]
    pub keywords: Vec<WeightedTerm>,
    #[serde(default)]
    pub patterns: Vec<WeightedTerm>,
    #[serde(default)]
    pub expansions: Vec<QueryExpansion>,
}

fn default_threshold() -> f32 {
    0.3
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            full_weight: None,
            keywords: Vec::new(),
            patterns: Vec::new(),
            expansions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_per_query_k")]
    pub per_query_k: usize,
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    #[serde(default)]
    pub context_char_limit: Option<usize>,
}

fn default_top_k() -> usize {
    5
}
fn default_per_query_k() -> usize {
    3
}
fn default_max_queries() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            per_query_k: default_per_query_k(),
            max_queries: default_max_queries(),
            context_char_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub api_patterns: Vec<String>,
    #[serde(default = "default_floor")]
    pub floor: f32,
}

fn default_floor() -> f32 {
    0.3
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            api_patterns: Vec::new(),
            floor: default_floor(),
        }
    }
}

/// Configuration of one documentation domain server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainProfile {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub seed_urls: Vec<String>,
    /// Optional file with one URL per line, appended to `seed_urls` after cleaning.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
    /// Lines of `seed_file` must start with this prefix.
    #[serde(default)]
    pub seed_prefix: Option<String>,
    #[serde(default)]
    pub follow_links: bool,
    /// Path prefix that discovered links must stay under.
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_scope() -> String {
    "/".to_string()
}

fn default_max_pages() -> usize {
    100
}

impl DomainProfile {
    /// Seed URLs from the profile plus the cleaned contents of `seed_file`, if any.
    pub fn resolve_seeds(&self) -> Result<Vec<String>> {
        let mut seeds = self.seed_urls.clone();
        if let Some(path) = &self.seed_file {
            let raw = std::fs::read_to_string(path).map_err(|e| DocsError::Config {
                reason: format!("failed to read seed file {}: {e}", path.display()),
            })?;
            for url in clean_seed_urls(raw.lines(), self.seed_prefix.as_deref()) {
                if !seeds.contains(&url) {
                    seeds.push(url);
                }
            }
        }
        Ok(seeds)
    }

    /// The built-in Composio documentation profile.
    pub fn composio() -> Self {
        let pages = [
            "/docs/welcome",
            "/docs/getting-started",
            "/docs/installation",
            "/docs/quickstart",
            "/docs/mcp-overview",
            "/docs/mcp-developers",
            "/docs/mcp-quickstart",
            "/docs/custom-auth-configs",
            "/docs/authentication",
            "/docs/auth-setup",
            "/docs/oauth-setup",
            "/docs/concepts",
            "/docs/architecture",
            "/sdk-reference/python/python-sdk-reference",
            "/sdk-reference/javascript/js-sdk-reference",
            "/toolkits/introduction",
            "/toolkits/custom-toolkits",
            "/providers/openai",
            "/providers/anthropic",
            "/tools/gmail",
            "/tools/slack",
            "/tools/github",
            "/tools/notion",
            "/docs/webhooks",
            "/docs/troubleshooting",
            "/examples/getting-started",
            "/api-reference/overview",
            "/api-reference/authentication",
        ];
        let kw = |term: &str, weight: f32| WeightedTerm::new(term, weight);
        let mut keywords = vec![
            kw("composio", 1.0),
            kw("mcp server", 0.5),
            kw("mcp servers", 0.5),
            kw("model context protocol", 0.5),
            kw("fastmcp", 0.4),
            kw("auth config", 0.4),
            kw("python sdk", 0.3),
            kw("javascript sdk", 0.3),
            kw("oauth", 0.3),
            kw("authentication", 0.3),
            kw("toolkit", 0.3),
            kw("tools", 0.2),
            kw("actions", 0.2),
            kw("sdk", 0.2),
            kw("integration", 0.2),
            kw("webhook", 0.2),
            kw("api", 0.1),
        ];
        for tool in [
            "gmail", "slack", "github", "notion", "trello", "asana", "linear", "jira", "discord",
            "telegram", "whatsapp",
        ] {
            keywords.push(kw(tool, 0.2));
        }
        for provider in ["openai", "anthropic", "google", "azure", "cohere"] {
            keywords.push(kw(provider, 0.15));
        }
        let mut expansions = vec![
            QueryExpansion {
                trigger: "mcp server".into(),
                query: "MCP server setup configuration".into(),
            },
            QueryExpansion {
                trigger: "authentication".into(),
                query: "authentication OAuth setup".into(),
            },
            QueryExpansion {
                trigger: "oauth".into(),
                query: "authentication OAuth setup".into(),
            },
            QueryExpansion {
                trigger: "sdk".into(),
                query: "SDK installation usage examples".into(),
            },
        ];
        for tool in ["gmail", "slack", "github", "notion", "trello", "asana", "jira"] {
            expansions.push(QueryExpansion {
                trigger: tool.into(),
                query: format!("{tool} integration examples"),
            });
        }

        Self {
            name: "composio".into(),
            label: "Composio".into(),
            seed_urls: pages
                .iter()
                .map(|p| format!("https://docs.composio.dev{p}"))
                .collect(),
            seed_file: None,
            seed_prefix: None,
            follow_links: false,
            scope: "/".into(),
            max_pages: 100,
            intent: IntentConfig {
                threshold: 0.3,
                full_weight: Some(1.0),
                keywords,
                patterns: Vec::new(),
                expansions,
            },
            retrieval: RetrievalConfig::default(),
            validation: ValidationConfig {
                api_patterns: vec![
                    r"composio\.([A-Za-z_][A-Za-z0-9_]*)".into(),
                    r"(Composio)\([^)]*\)".into(),
                    r"\.([A-Za-z_][A-Za-z0-9_]*)\(".into(),
                    r"(FastMCP)\([^)]*\)".into(),
                ],
                floor: 0.3,
            },
            chunking: ChunkerConfig::default(),
            fetch: FetchConfig::default(),
        }
    }

    /// The built-in Reflex documentation profile.
    pub fn reflex() -> Self {
        let kw = |term: &str, weight: f32| WeightedTerm::new(term, weight);
        let mut keywords = vec![
            kw("reflex", 1.0),
            kw("rx", 0.6),
            kw("custom component", 0.3),
            kw("client storage", 0.3),
            kw("color mode", 0.3),
            kw("python web framework", 0.3),
            kw("fullstack python", 0.3),
            kw("reactive ui", 0.2),
            kw("state management", 0.2),
        ];
        for term in [
            "react", "web app", "frontend", "backend", "full-stack", "component", "state",
            "event", "var", "route", "router", "database", "model", "deployment", "hosting",
            "auth", "authentication", "upload", "asset", "styling", "css", "responsive",
            "layout", "form", "table", "chart", "navbar", "sidebar", "modal", "toast", "theme",
            "middleware",
        ] {
            keywords.push(kw(term, 0.15));
        }
        let expansion = |trigger: &str, query: &str| QueryExpansion {
            trigger: trigger.into(),
            query: query.into(),
        };

        Self {
            name: "reflex".into(),
            label: "Reflex".into(),
            seed_urls: vec!["https://reflex.dev/docs/getting-started/introduction".into()],
            seed_file: None,
            seed_prefix: Some("https://reflex.dev/docs/".into()),
            follow_links: true,
            scope: "/docs/".into(),
            max_pages: 200,
            intent: IntentConfig {
                threshold: 0.5,
                full_weight: Some(1.0),
                keywords,
                patterns: vec![
                    kw(r"rx\.\w+", 0.8),
                    kw(r"python.*web.*app", 0.8),
                    kw(r"fullstack.*python", 0.8),
                    kw(r"react.*component.*python", 0.8),
                ],
                expansions: vec![
                    expansion("component", "reflex components"),
                    expansion("state", "reflex state management events vars"),
                    expansion("styling", "reflex styling theming responsive design"),
                    expansion("css", "reflex styling theming responsive design"),
                    expansion("route", "reflex routing pages navigation"),
                    expansion("database", "reflex database models queries"),
                    expansion("model", "reflex database models queries"),
                    expansion("deployment", "reflex deployment hosting production"),
                    expansion("hosting", "reflex deployment hosting production"),
                    expansion("auth", "reflex authentication login user management"),
                ],
            },
            retrieval: RetrievalConfig {
                max_queries: 5,
                context_char_limit: Some(800),
                ..RetrievalConfig::default()
            },
            validation: ValidationConfig {
                api_patterns: vec![r"rx\.(\w+)".into()],
                floor: 0.3,
            },
            chunking: ChunkerConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// A set of profiles: the built-ins, optionally overridden by a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSet {
    #[serde(default)]
    pub profiles: Vec<DomainProfile>,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            profiles: vec![DomainProfile::composio(), DomainProfile::reflex()],
        }
    }
}

impl ProfileSet {
    /// Load profiles from a TOML file; entries replace built-ins of the same name.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DocsError::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let loaded: ProfileSet = toml::from_str(content).map_err(|e| DocsError::Config {
            reason: format!("invalid profile file: {e}"),
        })?;
        let mut set = Self::default();
        for profile in loaded.profiles {
            set.insert(profile);
        }
        Ok(set)
    }

    pub fn insert(&mut self, profile: DomainProfile) {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DomainProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }
}

const ASSET_EXTENSIONS: &[&str] = &[".png", ".svg", ".ico", ".css", ".js", ".webmanifest"];

/// Normalise a list of raw URLs scraped from a sitemap or link dump.
///
/// Repairs doubled scheme prefixes, keeps only URLs under `prefix`, drops static assets,
/// strips fragments and trailing slashes, and returns the sorted, deduplicated set.
pub fn clean_seed_urls<'a, I>(lines: I, prefix: Option<&str>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut cleaned = BTreeSet::new();
    for line in lines {
        let mut url = line.trim();
        if url.is_empty() {
            continue;
        }
        if let Some(pos) = url.rfind("https://").filter(|pos| *pos > 0) {
            url = &url[pos..];
        }
        if let Some(prefix) = prefix {
            if !url.starts_with(prefix) {
                continue;
            }
        }
        if ASSET_EXTENSIONS.iter().any(|ext| url.ends_with(ext)) {
            continue;
        }
        let url = url.split('#').next().unwrap_or_default();
        let url = url.trim_end_matches('/');
        if !url.is_empty() {
            cleaned.insert(url.to_string());
        }
    }
    cleaned.into_iter().collect()
}
