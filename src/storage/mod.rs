use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::document::hex_digest;
use crate::embedding::{cosine, Embedder};
use crate::error::{DocsError, Result};

const CORPUS_FILE: &str = "corpus.json";

/// A contiguous span of one page's text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub url: String,
    pub title: String,
    pub index: usize,
    pub token_count: usize,
    pub content_hash: String,
    pub text: String,
}

impl DocumentChunk {
    /// Stable identifier for the `index`-th chunk of `url`.
    pub fn make_id(url: &str, index: usize) -> String {
        format!("{}_{}", &hex_digest(url.as_bytes())[..16], index)
    }
}

/// Stored chunk with its embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    #[serde(flatten)]
    chunk: DocumentChunk,
    #[serde(with = "vector_b64")]
    embedding: Vec<f32>,
}

/// Describes how a corpus was built; checked on open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub collection: String,
    pub embedder: String,
    pub dimension: usize,
    pub built_at_epoch_ms: u64,
}

#[derive(Serialize, Deserialize)]
struct CorpusFile {
    manifest: CorpusManifest,
    chunks: Vec<StoredChunk>,
}

/// An in-memory set of embedded chunks, kept in insertion order.
#[derive(Debug, Clone)]
pub struct Corpus {
    manifest: CorpusManifest,
    chunks: Vec<StoredChunk>,
    by_id: HashMap<String, usize>,
}

impl Corpus {
    pub fn new(collection: &str, embedder: &dyn Embedder) -> Self {
        let built_at_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            manifest: CorpusManifest {
                collection: collection.to_string(),
                embedder: embedder.id(),
                dimension: embedder.dimension(),
                built_at_epoch_ms,
            },
            chunks: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    fn from_file(file: CorpusFile) -> Self {
        let by_id = file
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.chunk.id.clone(), i))
            .collect();
        Self {
            manifest: file.manifest,
            chunks: file.chunks,
            by_id,
        }
    }

    pub fn manifest(&self) -> &CorpusManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Insert a chunk, replacing any chunk with the same id in place. Returns true on replace.
    pub fn upsert(&mut self, chunk: DocumentChunk, embedding: Vec<f32>) -> Result<bool> {
        if embedding.len() != self.manifest.dimension {
            return Err(DocsError::Embedding {
                reason: format!(
                    "dimension mismatch: expected {}, got {}",
                    self.manifest.dimension,
                    embedding.len()
                ),
            });
        }
        let stored = StoredChunk { chunk, embedding };
        match self.by_id.get(&stored.chunk.id) {
            Some(&i) => {
                self.chunks[i] = stored;
                Ok(true)
            }
            None => {
                self.by_id.insert(stored.chunk.id.clone(), self.chunks.len());
                self.chunks.push(stored);
                Ok(false)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&DocumentChunk> {
        self.by_id.get(id).map(|&i| &self.chunks[i].chunk)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &DocumentChunk> {
        self.chunks.iter().map(|c| &c.chunk)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.chunk.id.as_str()).collect()
    }

    /// Distinct source URLs in first-seen order.
    pub fn urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.chunks()
            .map(|c| c.url.as_str())
            .filter(|url| seen.insert(*url))
            .collect()
    }

    /// The `k` chunks most similar to `query`, best first, ties in insertion order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(&DocumentChunk, f32)>> {
        if query.len() != self.manifest.dimension {
            return Err(DocsError::Embedding {
                reason: format!(
                    "query dimension {} does not match corpus dimension {}",
                    query.len(),
                    self.manifest.dimension
                ),
            });
        }
        let mut scored: Vec<(&DocumentChunk, f32)> = self
            .chunks
            .iter()
            .map(|c| (&c.chunk, cosine(query, &c.embedding)))
            .collect();
        // stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

enum StoreState {
    Ready(Corpus),
    Unavailable(String),
}

/// Directory-backed vector store holding one corpus
pub struct CorpusStore {
    storage_path: PathBuf,
    collection: String,
    embedder_id: String,
    dimension: usize,
    state: StoreState,
}

impl CorpusStore {
    /// Open the store at `storage_path`. Failures are recorded rather than returned so that
    /// each later operation reports `StoreUnavailable`, and a rebuild can recover the store.
    pub fn open(storage_path: impl AsRef<Path>, collection: &str, embedder: &dyn Embedder) -> Self {
        let storage_path = storage_path.as_ref().to_path_buf();
        let state = match Self::load(&storage_path, collection, embedder) {
            Ok(corpus) => {
                tracing::info!(
                    "Opened corpus {} at {:?} with {} chunks",
                    collection,
                    storage_path,
                    corpus.len()
                );
                StoreState::Ready(corpus)
            }
            Err(reason) => {
                tracing::error!("Vector store at {:?} unavailable: {}", storage_path, reason);
                StoreState::Unavailable(reason)
            }
        };
        Self {
            storage_path,
            collection: collection.to_string(),
            embedder_id: embedder.id(),
            dimension: embedder.dimension(),
            state,
        }
    }

    fn load(
        storage_path: &Path,
        collection: &str,
        embedder: &dyn Embedder,
    ) -> std::result::Result<Corpus, String> {
        // Create the storage directory if it doesn't exist
        if !storage_path.exists() {
            fs::create_dir_all(storage_path).map_err(|e| e.to_string())?;
        }

        let index_path = storage_path.join(CORPUS_FILE);
        if !index_path.exists() {
            return Ok(Corpus::new(collection, embedder));
        }

        let file = File::open(&index_path).map_err(|e| e.to_string())?;
        let loaded: CorpusFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| format!("corrupt corpus file: {e}"))?;

        let manifest = &loaded.manifest;
        if manifest.embedder != embedder.id() || manifest.dimension != embedder.dimension() {
            return Err(format!(
                "store was built with embedder {} ({} dims), current embedder is {} ({} dims); force a refresh to rebuild",
                manifest.embedder,
                manifest.dimension,
                embedder.id(),
                embedder.dimension()
            ));
        }
        if loaded.chunks.iter().any(|c| c.embedding.len() != manifest.dimension) {
            return Err("corpus file contains vectors of the wrong dimension".to_string());
        }
        Ok(Corpus::from_file(loaded))
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, StoreState::Ready(_))
    }

    /// The current corpus, or `StoreUnavailable`.
    pub fn corpus(&self) -> Result<&Corpus> {
        match &self.state {
            StoreState::Ready(corpus) => Ok(corpus),
            StoreState::Unavailable(reason) => {
                Err(DocsError::store_unavailable(&self.storage_path, reason))
            }
        }
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.corpus()?.len())
    }

    /// Write `corpus` to `storage_path` through a temp file and an atomic rename, so a reader of
    /// the directory never sees a partially written corpus.
    pub fn persist(storage_path: &Path, corpus: &Corpus) -> Result<()> {
        fs::create_dir_all(storage_path)
            .map_err(|e| DocsError::store_unavailable(storage_path, e))?;

        let file = CorpusFile {
            manifest: corpus.manifest.clone(),
            chunks: corpus.chunks.clone(),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(storage_path)
            .map_err(|e| DocsError::store_unavailable(storage_path, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &file)?;
            writer.flush()?;
        }
        tmp.persist(storage_path.join(CORPUS_FILE))
            .map_err(|e| DocsError::store_unavailable(storage_path, e.error))?;
        Ok(())
    }

    /// Swap in a corpus that has already been persisted.
    pub fn install(&mut self, corpus: Corpus) -> Result<()> {
        self.check_compatible(&corpus)?;
        self.state = StoreState::Ready(corpus);
        Ok(())
    }

    /// Persist and install in one step; an incompatible corpus is never written.
    pub fn replace(&mut self, corpus: Corpus) -> Result<()> {
        self.check_compatible(&corpus)?;
        Self::persist(&self.storage_path, &corpus)?;
        self.state = StoreState::Ready(corpus);
        Ok(())
    }

    fn check_compatible(&self, corpus: &Corpus) -> Result<()> {
        if corpus.manifest.collection != self.collection {
            return Err(DocsError::store_unavailable(
                &self.storage_path,
                format!(
                    "corpus for collection {} cannot replace collection {}",
                    corpus.manifest.collection, self.collection
                ),
            ));
        }
        if corpus.manifest.embedder != self.embedder_id || corpus.manifest.dimension != self.dimension {
            return Err(DocsError::Embedding {
                reason: format!(
                    "corpus built with {} cannot be installed into a store using {}",
                    corpus.manifest.embedder, self.embedder_id
                ),
            });
        }
        Ok(())
    }
}

mod vector_b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vector: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded).map_err(D::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(D::Error::custom("embedding blob length is not a multiple of 4"));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}
