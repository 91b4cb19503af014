use regex::Regex;
use pulldown_cmark::{Event, Parser};
use scraper::{ElementRef, Html, Node, Selector};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

use crate::error::{DocsError, Result};

/// Pages whose extracted text is shorter than this are treated as error pages.
pub const MIN_CONTENT_CHARS: usize = 200;

/// Represents a fetched page reduced to its main text
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
}

impl Document {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let content_hash = hex_digest(content.as_bytes());
        Self {
            url: url.into(),
            title: title.into(),
            content,
            content_hash,
        }
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// How a page body should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Markdown,
    PlainText,
}

impl ContentKind {
    /// Picks a kind from the response content type, falling back to the path extension.
    pub fn detect(content_type: Option<&str>, path: &str) -> Self {
        if let Some(ct) = content_type.map(|ct| ct.to_ascii_lowercase()) {
            if ct.contains("html") || ct.contains("xml") {
                return Self::Html;
            }
            if ct.contains("markdown") {
                return Self::Markdown;
            }
        }
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("md" | "mdx" | "markdown") => Self::Markdown,
            Some("txt" | "rst" | "adoc") => Self::PlainText,
            _ => Self::Html,
        }
    }
}

/// A document plus the outgoing links found on its page.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub document: Document,
    pub links: Vec<Url>,
}

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "svg", "template",
];
const SKIPPED_CLASSES: &[&str] = &[
    "sidebar",
    "toc",
    "breadcrumb",
    "navigation",
    "edit-page",
    "last-updated",
    "page-metadata",
    "social-links",
    "footer-links",
    "header-links",
];
const SKIPPED_ROLES: &[&str] = &["navigation", "banner", "contentinfo"];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "li", "ul", "ol", "pre", "table", "tr", "td", "th", "h1", "h2", "h3",
    "h4", "h5", "h6", "blockquote", "br", "dd", "dt",
];

/// Reduces HTML, markdown and plain-text pages to a title and main body text.
pub struct PageExtractor {
    content_roots: Vec<Selector>,
    title: Selector,
    h1: Selector,
    body: Selector,
    links: Selector,
    heading_regex: Regex,
}

impl PageExtractor {
    pub fn new() -> Self {
        let selector = |css: &str| Selector::parse(css).expect("static selector");
        Self {
            content_roots: [
                "article",
                "main",
                "[role=\"main\"]",
                ".content",
                ".docs-content",
                ".documentation-content",
                ".markdown-body",
                ".prose",
            ]
            .into_iter()
            .map(selector)
            .collect(),
            title: selector("title"),
            h1: selector("h1"),
            body: selector("body"),
            links: selector("a[href]"),
            heading_regex: Regex::new(r"(?m)^#\s+(.+)$").expect("static regex"),
        }
    }

    /// Extracts a page body of the given kind. `url` must parse for link discovery on HTML
    /// pages; local paths are accepted verbatim and yield no links.
    pub fn extract(&self, url: &str, body: &str, kind: ContentKind) -> Result<ExtractedPage> {
        let (title, content, links) = match kind {
            ContentKind::Html => self.extract_html(url, body),
            ContentKind::Markdown => {
                let title = self.extract_title(body);
                (title, markdown_to_text(body), Vec::new())
            }
            ContentKind::PlainText => (None, collapse_whitespace(body), Vec::new()),
        };

        if content.chars().count() < MIN_CONTENT_CHARS {
            return Err(DocsError::Parse {
                url: url.to_string(),
                reason: format!(
                    "content too short ({} chars), possibly an error page",
                    content.chars().count()
                ),
            });
        }

        let title = title.unwrap_or_else(|| fallback_title(url));
        Ok(ExtractedPage {
            document: Document::new(url, title, content),
            links,
        })
    }

    /// Extract the title from a markdown document (first heading)
    pub fn extract_title(&self, content: &str) -> Option<String> {
        self.heading_regex
            .captures(content)
            .map(|cap| cap[1].trim().to_string())
    }

    fn extract_html(&self, url: &str, body: &str) -> (Option<String>, String, Vec<Url>) {
        let document = Html::parse_document(body);

        let title = [&self.title, &self.h1]
            .into_iter()
            .filter_map(|sel| document.select(sel).next())
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty());

        let root = self
            .content_roots
            .iter()
            .find_map(|sel| document.select(sel).next())
            .or_else(|| document.select(&self.body).next())
            .unwrap_or_else(|| document.root_element());
        let content = collect_text(root);

        let links = match Url::parse(url) {
            Ok(base) => document
                .select(&self.links)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|href| base.join(href).ok())
                .filter(|link| matches!(link.scheme(), "http" | "https"))
                .map(|mut link| {
                    link.set_fragment(None);
                    link
                })
                .collect(),
            Err(_) => Vec::new(),
        };

        (title, content, links)
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_boilerplate(el: ElementRef<'_>) -> bool {
    let value = el.value();
    SKIPPED_TAGS.contains(&value.name())
        || value.classes().any(|class| SKIPPED_CLASSES.contains(&class))
        || value
            .attr("role")
            .is_some_and(|role| SKIPPED_ROLES.contains(&role))
}

fn collect_text(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in root.descendants() {
        match node.value() {
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => raw.push(' '),
            Node::Text(text) => {
                let skipped = node
                    .ancestors()
                    .take_while(|ancestor| ancestor.id() != root.id())
                    .filter_map(ElementRef::wrap)
                    .any(is_boilerplate);
                if !skipped {
                    raw.push_str(text);
                }
            }
            _ => {}
        }
    }
    collapse_whitespace(&raw)
}

/// Convert markdown to plain text
pub fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&text)
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fallback_title(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

/// Finds documentation files on disk
pub struct DocumentScanner {
    supported_extensions: Vec<String>,
}

impl DocumentScanner {
    /// Create a new document scanner with default supported extensions
    pub fn new() -> Self {
        Self {
            supported_extensions: ["html", "htm", "xml", "md", "mdx", "markdown", "txt"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    /// Check if a file is a supported documentation file
    pub fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.supported_extensions.contains(&ext.to_lowercase()))
    }

    /// Supported files under `path` (or `path` itself), in file-name order.
    pub fn scan(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !path.exists() {
            return Err(DocsError::Config {
                reason: format!("path not found: {}", path.display()),
            });
        }
        let files = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && self.is_supported_file(p))
            .collect();
        Ok(files)
    }
}

impl Default for DocumentScanner {
    fn default() -> Self {
        Self::new()
    }
}
