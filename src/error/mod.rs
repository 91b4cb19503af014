use std::path::PathBuf;

/// Errors raised by corpus building, retrieval and coordination.
#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("could not extract content from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("embedding failed: {reason}")]
    Embedding { reason: String },

    #[error("text has no embeddable terms")]
    NoTerms,

    #[error("vector store at {} is unavailable: {reason}", path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("corpus build produced no pages ({attempted} attempted)")]
    BuildFailed { attempted: usize },

    #[error("tokenizer unavailable: {reason}")]
    Tokenizer { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DocsError {
    /// Stable snake_case name of the error kind, used in tool error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch_error",
            Self::Parse { .. } => "parse_error",
            Self::Embedding { .. } => "embedding_error",
            Self::NoTerms => "no_terms",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::InvalidQuery { .. } => "invalid_query",
            Self::BuildFailed { .. } => "build_failed",
            Self::Tokenizer { .. } => "tokenizer_error",
            Self::Config { .. } => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }

    pub fn store_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = DocsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(DocsError::invalid_query("empty").kind(), "invalid_query");
        assert_eq!(
            DocsError::store_unavailable("/tmp/x", "gone").kind(),
            "store_unavailable"
        );
        assert_eq!(DocsError::BuildFailed { attempted: 3 }.kind(), "build_failed");
        assert_eq!(DocsError::NoTerms.kind(), "no_terms");
    }

    #[test]
    fn store_unavailable_mentions_path() {
        let err = DocsError::store_unavailable("/data/store", "permission denied");
        let msg = err.to_string();
        assert!(msg.contains("/data/store"));
        assert!(msg.contains("permission denied"));
    }
}
