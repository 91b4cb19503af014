//! Token-window chunking with overlap.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

use crate::error::{DocsError, Result};

/// Which tokenizer measures chunk sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// OpenAI `cl100k_base` byte-pair encoding.
    #[default]
    Cl100k,
    /// One token per whitespace-separated word.
    Whitespace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    /// Chunks shorter than this (after trimming) are not indexed.
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
    #[serde(default)]
    pub tokenizer: TokenizerKind,
}

fn default_chunk_tokens() -> usize {
    500
}
fn default_overlap_tokens() -> usize {
    50
}
fn default_min_chunk_chars() -> usize {
    50
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: default_chunk_tokens(),
            overlap_tokens: default_overlap_tokens(),
            min_chunk_chars: default_min_chunk_chars(),
            tokenizer: TokenizerKind::default(),
        }
    }
}

/// Counts tokens under a fixed encoding.
#[derive(Clone)]
pub struct Tokenizer {
    kind: TokenizerKind,
    bpe: Option<Arc<CoreBPE>>,
}

impl Tokenizer {
    pub fn new(kind: TokenizerKind) -> Result<Self> {
        let bpe = match kind {
            TokenizerKind::Cl100k => {
                let bpe = tiktoken_rs::cl100k_base().map_err(|e| DocsError::Tokenizer {
                    reason: e.to_string(),
                })?;
                Some(Arc::new(bpe))
            }
            TokenizerKind::Whitespace => None,
        };
        Ok(Self { kind, bpe })
    }

    pub fn kind(&self) -> TokenizerKind {
        self.kind
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => text.split_whitespace().count(),
        }
    }
}

/// One window of page text, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub token_count: usize,
}

/// Splits text into windows of at most `chunk_tokens` tokens, consecutive windows sharing
/// roughly `overlap_tokens` tokens.
#[derive(Clone)]
pub struct Chunker {
    config: ChunkerConfig,
    tokenizer: Tokenizer,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        let tokenizer = Tokenizer::new(config.tokenizer)?;
        Ok(Self { config, tokenizer })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let target = self.config.chunk_tokens.max(1);
        let overlap = self.config.overlap_tokens.min(target - 1);

        let words = self.words(text, target);
        if words.is_empty() {
            return Vec::new();
        }
        let costs: Vec<usize> = words.iter().map(|w| self.word_cost(w)).collect();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let mut end = start;
            let mut total = 0usize;
            while end < words.len() && (end == start || total + costs[end] <= target) {
                total += costs[end];
                end += 1;
            }

            // per-word costs only estimate the joined window, so measure and shrink
            let mut text = words[start..end].join(" ");
            let mut token_count = self.tokenizer.count(&text);
            while token_count > target && end > start + 1 {
                end -= 1;
                text = words[start..end].join(" ");
                token_count = self.tokenizer.count(&text);
            }

            chunks.push(TextChunk {
                index: chunks.len(),
                text,
                token_count,
            });

            if end >= words.len() {
                break;
            }

            // step back far enough to carry `overlap` tokens, but always advance
            let mut next = end;
            let mut tail = 0usize;
            while next > start + 1 && tail < overlap {
                next -= 1;
                tail += costs[next];
            }
            start = next;
        }
        chunks
    }

    fn word_cost(&self, word: &str) -> usize {
        match self.tokenizer.kind() {
            TokenizerKind::Whitespace => 1,
            TokenizerKind::Cl100k => self.tokenizer.count(&format!(" {word}")).max(1),
        }
    }

    /// Fits in a window whether it starts the window or follows a space.
    fn fits(&self, word: &str, target: usize) -> bool {
        self.word_cost(word) <= target && self.tokenizer.count(word) <= target
    }

    /// Whitespace-separated words. A word too large for one window is cut into the longest
    /// char runs that fit; a single char is never cut.
    fn words<'a>(&self, text: &'a str, target: usize) -> Vec<Cow<'a, str>> {
        let mut words = Vec::new();
        for word in text.split_whitespace() {
            if self.fits(word, target) {
                words.push(Cow::Borrowed(word));
                continue;
            }
            let mut piece = String::new();
            for c in word.chars() {
                piece.push(c);
                if piece.chars().count() > 1 && !self.fits(&piece, target) {
                    piece.pop();
                    words.push(Cow::Owned(std::mem::take(&mut piece)));
                    piece.push(c);
                }
            }
            if !piece.is_empty() {
                words.push(Cow::Owned(piece));
            }
        }
        words
    }
}
