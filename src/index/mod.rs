//! Semantic code search index
//!
//! Ingestion embeds every extracted chunk and persists two artifacts side by
//! side:
//! - `code.index`: the flat L2 vector index (see [`flat`])
//! - `metadata.json`: one record per chunk, positionally aligned with the index
//!
//! At query time the artifacts are loaded once, lazily, and shared by every
//! concurrent search.

pub mod embedding;
pub mod flat;

pub use embedding::{EmbeddingProvider, LocalEmbedding, MockEmbedding, OpenAIEmbedding};
pub use flat::{FlatL2Index, Neighbor};

use crate::error::{Error, Result};
use crate::extract::CodeChunk;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// File name of the binary vector index
pub const INDEX_FILE: &str = "code.index";
/// File name of the chunk metadata array
pub const METADATA_FILE: &str = "metadata.json";

const DEFAULT_BATCH_SIZE: usize = 32;

/// A search result with its distance to the query
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchHit {
    pub chunk: CodeChunk,
    /// Squared L2 distance between query and chunk embeddings
    pub distance: f32,
}

/// Summary of a completed index build
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildReport {
    pub chunks: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// In-memory form of the persisted artifacts
struct LoadedIndex {
    vectors: FlatL2Index,
    metadata: Vec<CodeChunk>,
}

/// Vector index over code chunks backed by files in `index_dir`
pub struct CodeSearchIndex {
    index_dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    loaded: OnceCell<LoadedIndex>,
    loads: AtomicUsize,
}

impl CodeSearchIndex {
    /// Create an index handle; nothing is read until the first search
    pub fn new(index_dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index_dir: index_dir.into(),
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            loaded: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of texts sent per embedding request during a build
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn index_path(&self) -> PathBuf {
        self.index_dir.join(INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.index_dir.join(METADATA_FILE)
    }

    /// Whether the artifacts have been loaded into memory
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// How many times the artifacts were read from disk
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Embed `chunks` and persist a new index generation
    ///
    /// Chunk ids are reassigned to their position (0..N-1) before the metadata
    /// is written. Any previously loaded generation is dropped.
    pub async fn build(&mut self, chunks: Vec<CodeChunk>) -> Result<BuildReport> {
        if chunks.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let dimension = self.embedder.dimension();
        let mut vectors = FlatL2Index::new(dimension);

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch
                .iter()
                .map(|chunk| chunk.embedding_text().to_string())
                .collect();

            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::Provider {
                    service: "embedding",
                    status: 200,
                    body: format!(
                        "expected {} vectors, received {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            for embedding in &embeddings {
                vectors.add(embedding)?;
            }

            tracing::debug!("Embedded {}/{} chunks", vectors.len(), chunks.len());
        }

        let metadata: Vec<CodeChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(id, mut chunk)| {
                chunk.id = id;
                chunk
            })
            .collect();

        std::fs::create_dir_all(&self.index_dir)?;

        let index_path = self.index_path();
        let metadata_path = self.metadata_path();

        // both artifacts are staged before either replaces the old generation
        let index_bytes = vectors.to_bytes();
        let metadata_bytes = serde_json::to_vec_pretty(&metadata)?;
        crate::repo::write_atomic_all(&[
            (index_path.as_path(), index_bytes.as_slice()),
            (metadata_path.as_path(), metadata_bytes.as_slice()),
        ])?;

        self.loaded = OnceCell::new();

        tracing::info!(
            "Wrote index with {} chunks ({} dims) to {:?}",
            metadata.len(),
            dimension,
            self.index_dir
        );

        Ok(BuildReport {
            chunks: metadata.len(),
            dimension,
            index_path,
            metadata_path,
        })
    }

    /// The `top_k` chunks closest to `query`, closest first
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<CodeChunk>> {
        let hits = self.search_hits(query, top_k).await?;
        Ok(hits.into_iter().map(|hit| hit.chunk).collect())
    }

    /// Like [`CodeSearchIndex::search`], keeping each hit's distance
    pub async fn search_hits(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let loaded = self.ensure_loaded().await?;

        let query_vector = self.embedder.embed(query).await?;
        let neighbors = loaded.vectors.search(&query_vector, top_k)?;

        let mut hits = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            // Index positions map to metadata array positions, not stored ids
            match loaded.metadata.get(neighbor.position) {
                Some(chunk) => hits.push(SearchHit {
                    chunk: chunk.clone(),
                    distance: neighbor.distance,
                }),
                None => tracing::debug!(
                    "Skipping neighbor at position {} with no metadata record",
                    neighbor.position
                ),
            }
        }

        Ok(hits)
    }

    async fn ensure_loaded(&self) -> Result<&LoadedIndex> {
        self.loaded
            .get_or_try_init(|| async { self.load() })
            .await
    }

    fn load(&self) -> Result<LoadedIndex> {
        let index_path = self.index_path();
        let metadata_path = self.metadata_path();

        for path in [&index_path, &metadata_path] {
            if !path.exists() {
                return Err(Error::MissingIndex { path: path.clone() });
            }
        }

        self.loads.fetch_add(1, Ordering::SeqCst);

        let vectors = FlatL2Index::read_from(&index_path)?;
        let metadata: Vec<CodeChunk> = serde_json::from_slice(&std::fs::read(&metadata_path)?)?;

        if metadata.len() != vectors.len() {
            tracing::warn!(
                "Index holds {} vectors but metadata has {} records",
                vectors.len(),
                metadata.len()
            );
        }

        tracing::info!(
            "Loaded index with {} vectors ({} dims) from {:?}",
            vectors.len(),
            vectors.dimension(),
            self.index_dir
        );

        Ok(LoadedIndex { vectors, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const KEYWORDS: [&str; 3] = ["alpha", "beta", "gamma"];

    /// Embeds text as keyword occurrence counts
    struct KeywordEmbedding;

    #[async_trait::async_trait]
    impl EmbeddingProvider for KeywordEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    KEYWORDS
                        .iter()
                        .map(|kw| text.matches(kw).count() as f32)
                        .collect()
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            KEYWORDS.len()
        }
    }

    /// Claims one width but returns another
    struct LyingEmbedding;

    #[async_trait::async_trait]
    impl EmbeddingProvider for LyingEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 5]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn chunk(file: &str, name: &str, code: &str) -> CodeChunk {
        CodeChunk::new(file, name, code, 1, 2)
    }

    fn sample_chunks() -> Vec<CodeChunk> {
        vec![
            chunk("a.py", "only_alpha", "alpha"),
            chunk("a.py", "only_beta", "beta"),
            chunk("b.py", "alpha_beta", "alpha beta"),
            chunk("c.py", "gammas", "gamma gamma"),
        ]
    }

    async fn built_index(dir: &Path) -> CodeSearchIndex {
        let mut index = CodeSearchIndex::new(dir, Arc::new(KeywordEmbedding)).with_batch_size(3);
        index.build(sample_chunks()).await.unwrap();
        index
    }

    fn names(chunks: &[CodeChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.symbol_name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_build_assigns_dense_positional_ids() {
        let dir = tempfile::tempdir().unwrap();
        let index = built_index(dir.path()).await;

        let raw = std::fs::read_to_string(index.metadata_path()).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();

        assert_eq!(records.len(), 4);
        for (position, record) in records.iter().enumerate() {
            assert_eq!(record["id"], position);
            for field in ["file_path", "symbol_name", "start_line", "end_line", "code"] {
                assert!(record.get(field).is_some(), "missing {field}");
            }
        }
        assert_eq!(records[2]["symbol_name"], "alpha_beta");

        let vectors = FlatL2Index::read_from(&index.index_path()).unwrap();
        assert_eq!(vectors.len(), 4);
        assert_eq!(vectors.dimension(), 3);
    }

    #[tokio::test]
    async fn test_search_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let index = CodeSearchIndex::new(dir.path(), Arc::new(KeywordEmbedding));

        let err = index.search("alpha", 3).await.unwrap_err();
        assert!(err.is_missing_index());
        assert!(err.to_string().contains("ingest"));
        assert!(!index.is_loaded());
    }

    #[tokio::test]
    async fn test_search_with_only_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = built_index(dir.path()).await;
        std::fs::remove_file(index.metadata_path()).unwrap();

        let fresh = CodeSearchIndex::new(dir.path(), Arc::new(KeywordEmbedding));
        let err = fresh.search("alpha", 3).await.unwrap_err();
        match err {
            Error::MissingIndex { path } => assert!(path.ends_with(METADATA_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_search_returns_exactly_k_in_distance_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = built_index(dir.path()).await;

        let hits = index.search_hits("alpha", 3).await.unwrap();
        let chunks: Vec<_> = hits.iter().map(|h| h.chunk.clone()).collect();

        assert_eq!(names(&chunks), vec!["only_alpha", "alpha_beta", "only_beta"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_search_returns_all_when_index_is_small() {
        let dir = tempfile::tempdir().unwrap();
        let index = built_index(dir.path()).await;

        let chunks = index.search("gamma", 10).await.unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].symbol_name, "gammas");
    }

    #[tokio::test]
    async fn test_repeated_search_is_idempotent_and_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        built_index(dir.path()).await;

        let index = CodeSearchIndex::new(dir.path(), Arc::new(KeywordEmbedding));
        let first = index.search("alpha beta", 2).await.unwrap();
        let second = index.search("alpha beta", 2).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(index.load_count(), 1);
        assert!(index.is_loaded());
    }

    #[tokio::test]
    async fn test_concurrent_first_use_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        built_index(dir.path()).await;

        let index = Arc::new(CodeSearchIndex::new(dir.path(), Arc::new(KeywordEmbedding)));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let index = Arc::clone(&index);
            tasks.push(tokio::spawn(async move { index.search("beta", 2).await }));
        }

        for task in tasks {
            let chunks = task.await.unwrap().unwrap();
            assert_eq!(chunks[0].symbol_name, "only_beta");
        }
        assert_eq!(index.load_count(), 1);
    }

    #[tokio::test]
    async fn test_unmapped_neighbors_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let index = built_index(dir.path()).await;

        // Drop the last two metadata records so positions 2 and 3 have no entry
        let mut records: Vec<CodeChunk> =
            serde_json::from_slice(&std::fs::read(index.metadata_path()).unwrap()).unwrap();
        records.truncate(2);
        std::fs::write(index.metadata_path(), serde_json::to_vec(&records).unwrap()).unwrap();

        let fresh = CodeSearchIndex::new(dir.path(), Arc::new(KeywordEmbedding));
        let chunks = fresh.search("alpha", 4).await.unwrap();

        assert_eq!(names(&chunks), vec!["only_alpha", "only_beta"]);
    }

    #[tokio::test]
    async fn test_metadata_is_matched_by_position_not_stored_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = built_index(dir.path()).await;

        let mut records: Vec<CodeChunk> =
            serde_json::from_slice(&std::fs::read(index.metadata_path()).unwrap()).unwrap();
        for record in &mut records {
            record.id += 100;
        }
        std::fs::write(index.metadata_path(), serde_json::to_vec(&records).unwrap()).unwrap();

        let fresh = CodeSearchIndex::new(dir.path(), Arc::new(KeywordEmbedding));
        let chunks = fresh.search("gamma", 1).await.unwrap();

        assert_eq!(chunks[0].symbol_name, "gammas");
        assert_eq!(chunks[0].id, 103);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_loaded_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = built_index(dir.path()).await;
        assert_eq!(index.search("alpha", 1).await.unwrap()[0].symbol_name, "only_alpha");

        index
            .build(vec![chunk("d.py", "replacement", "alpha alpha")])
            .await
            .unwrap();

        let chunks = index.search("alpha", 5).await.unwrap();
        assert_eq!(names(&chunks), vec!["replacement"]);
        assert_eq!(chunks[0].id, 0);
        assert_eq!(index.load_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_metadata_write_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = built_index(dir.path()).await;
        let old_vectors = std::fs::read(index.index_path()).unwrap();

        std::fs::create_dir(dir.path().join(format!(".{}.tmp", METADATA_FILE))).unwrap();
        let result = index
            .build(vec![chunk("d.py", "replacement", "alpha alpha")])
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(index.index_path()).unwrap(), old_vectors);
        let chunks = index.search("gamma", 1).await.unwrap();
        assert_eq!(names(&chunks), vec!["gammas"]);
    }

    #[tokio::test]
    async fn test_empty_build_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = CodeSearchIndex::new(dir.path().join("idx"), Arc::new(KeywordEmbedding));

        assert!(matches!(index.build(Vec::new()).await, Err(Error::EmptyIndex)));
        assert!(!index.index_path().exists());
        assert!(!index.metadata_path().exists());
    }

    #[tokio::test]
    async fn test_build_rejects_wrong_width() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = CodeSearchIndex::new(dir.path(), Arc::new(LyingEmbedding));

        let err = index.build(sample_chunks()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 4,
                actual: 5
            }
        ));
        assert!(!index.index_path().exists());
    }

    #[tokio::test]
    async fn test_query_width_must_match_index() {
        let dir = tempfile::tempdir().unwrap();
        built_index(dir.path()).await;

        let index = CodeSearchIndex::new(dir.path(), Arc::new(MockEmbedding::new(8)));
        assert!(matches!(
            index.search("alpha", 1).await,
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
