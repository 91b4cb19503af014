use docs_mcp_rs::embedding::{Embedder, HashEmbedder};
use docs_mcp_rs::storage::{Corpus, CorpusStore, DocumentChunk};

fn chunk(url: &str, index: usize, text: &str) -> DocumentChunk {
    DocumentChunk {
        id: DocumentChunk::make_id(url, index),
        url: url.to_string(),
        title: "Test Document".to_string(),
        index,
        token_count: text.split_whitespace().count(),
        content_hash: "abc".to_string(),
        text: text.to_string(),
    }
}

fn sample_corpus(embedder: &HashEmbedder) -> Corpus {
    let mut corpus = Corpus::new("test", embedder);
    for (i, text) in [
        "configure oauth authentication for the gmail toolkit",
        "deploy the app to production hosting with docker",
        "style components with theme colors and responsive layout",
    ]
    .into_iter()
    .enumerate()
    {
        let c = chunk("https://docs.example.dev/page", i, text);
        corpus.upsert(c, embedder.embed(text).unwrap()).unwrap();
    }
    corpus
}

#[test]
fn test_persist_and_reopen_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let embedder = HashEmbedder::new(512);
    let corpus = sample_corpus(&embedder);

    let mut store = CorpusStore::open(temp_dir.path(), "test", &embedder);
    assert_eq!(store.count().unwrap(), 0);
    store.replace(corpus.clone()).unwrap();

    let reopened = CorpusStore::open(temp_dir.path(), "test", &embedder);
    let loaded = reopened.corpus().unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.manifest(), corpus.manifest());

    let query = embedder.embed("oauth authentication").unwrap();
    let before: Vec<String> = corpus.nearest(&query, 3).unwrap().iter().map(|(c, _)| c.id.clone()).collect();
    let after: Vec<String> = loaded.nearest(&query, 3).unwrap().iter().map(|(c, _)| c.id.clone()).collect();
    assert_eq!(before, after);
    assert_eq!(after[0], DocumentChunk::make_id("https://docs.example.dev/page", 0));
}

#[test]
fn test_mismatched_embedder_is_unavailable() {
    let temp_dir = tempfile::tempdir().unwrap();
    let embedder = HashEmbedder::new(512);
    CorpusStore::persist(temp_dir.path(), &sample_corpus(&embedder)).unwrap();

    let other = HashEmbedder::new(64);
    let store = CorpusStore::open(temp_dir.path(), "test", &other);
    assert!(!store.is_available());
    assert_eq!(store.count().unwrap_err().kind(), "store_unavailable");
}

#[test]
fn test_corrupt_file_is_unavailable_until_replaced() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join("corpus.json"), "{ not json").unwrap();
    let embedder = HashEmbedder::new(512);

    let mut store = CorpusStore::open(temp_dir.path(), "test", &embedder);
    assert_eq!(store.corpus().unwrap_err().kind(), "store_unavailable");

    store.replace(sample_corpus(&embedder)).unwrap();
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn test_corpus_of_another_collection_is_refused() {
    let temp_dir = tempfile::tempdir().unwrap();
    let embedder = HashEmbedder::new(512);
    let mut store = CorpusStore::open(temp_dir.path(), "reflex", &embedder);

    let err = store.replace(sample_corpus(&embedder)).unwrap_err();
    assert_eq!(err.kind(), "store_unavailable");
    assert_eq!(store.count().unwrap(), 0);
    assert!(!temp_dir.path().join("corpus.json").exists());
}

#[test]
fn test_upsert_overwrites_same_id() {
    let embedder = HashEmbedder::new(512);
    let mut corpus = sample_corpus(&embedder);

    let text = "rewritten oauth guide";
    let replaced = corpus
        .upsert(chunk("https://docs.example.dev/page", 1, text), embedder.embed(text).unwrap())
        .unwrap();

    assert!(replaced);
    assert_eq!(corpus.len(), 3);
    let id = DocumentChunk::make_id("https://docs.example.dev/page", 1);
    assert_eq!(corpus.get(&id).unwrap().text, text);
    assert_eq!(corpus.ids()[1], id);
}

#[test]
fn test_wrong_dimension_is_rejected() {
    let embedder = HashEmbedder::new(512);
    let mut corpus = Corpus::new("test", &embedder);
    let err = corpus.upsert(chunk("u", 0, "text"), vec![0.0; 3]).unwrap_err();
    assert_eq!(err.kind(), "embedding_error");
}

#[test]
fn test_chunk_ids_are_stable_and_distinct() {
    let a = DocumentChunk::make_id("https://docs.example.dev/a", 0);
    assert_eq!(a, DocumentChunk::make_id("https://docs.example.dev/a", 0));
    assert_ne!(a, DocumentChunk::make_id("https://docs.example.dev/a", 1));
    assert_ne!(a, DocumentChunk::make_id("https://docs.example.dev/b", 0));
    assert!(a.ends_with("_0"));
}
