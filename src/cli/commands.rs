//! Command implementations

use crate::extract::PythonExtractor;
use crate::index::{embedding, BuildReport, CodeSearchIndex, SearchHit};
use crate::llm::{LlmClient, LlmConfig, TextGenerator};
use crate::pipeline::{DocPipeline, EvaluationSummary, PipelineState, ScoreRecord};
use crate::repo::{Config, SourceRepo};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load the config file, falling back to defaults when it is absent
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load_or_default(path).with_context(|| format!("Failed to load config {:?}", path))
}

/// Search index over `paths.index_dir` using the configured embedding provider
pub fn open_index(config: &Config) -> Result<CodeSearchIndex> {
    let embedder = embedding::from_config(&config.embedding)?;
    Ok(CodeSearchIndex::new(config.index_dir(), embedder)
        .with_batch_size(config.embedding.batch_size))
}

/// LLM client for the `[llm]` section
pub fn llm_client(config: &Config) -> Arc<dyn TextGenerator> {
    Arc::new(LlmClient::new(LlmConfig::from_settings(&config.llm)))
}

/// Outcome of an ingest run
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub repo_dir: PathBuf,
    pub files: usize,
    pub skipped: Vec<String>,
    /// `None` when nothing was extracted and no index was written
    pub build: Option<BuildReport>,
}

/// Extract chunks from the repository and rebuild the index
pub async fn ingest(config: &Config, repo_dir: Option<&Path>) -> Result<IngestReport> {
    let repo_dir = repo_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.repo_dir());

    if !repo_dir.is_dir() {
        anyhow::bail!("Repository directory {:?} does not exist", repo_dir);
    }

    let repo = SourceRepo::open(&repo_dir, config);
    let mut extractor = PythonExtractor::new()?;
    let ingested = repo.ingest(&mut extractor)?;

    let build = if ingested.chunks.is_empty() {
        tracing::warn!("No functions found under {:?}; index left untouched", repo_dir);
        None
    } else {
        let mut index = open_index(config)?;
        Some(index.build(ingested.chunks).await?)
    };

    Ok(IngestReport {
        repo_dir,
        files: ingested.files,
        skipped: ingested.skipped,
        build,
    })
}

/// Document one module
pub async fn run(
    config: &Config,
    llm: Arc<dyn TextGenerator>,
    module_path: &str,
    query: Option<&str>,
) -> Result<PipelineState> {
    let index = Arc::new(open_index(config)?);
    let pipeline = DocPipeline::from_config(config, index, llm);
    Ok(pipeline.run(module_path, query).await?)
}

/// Query the index
pub async fn search(config: &Config, query: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
    let index = open_index(config)?;
    let top_k = top_k.unwrap_or(config.search.top_k);
    Ok(index.search_hits(query, top_k).await?)
}

/// Show or create the config file
pub fn config_command(path: &Path, show: bool, init: bool, force: bool) -> Result<()> {
    if init {
        if path.exists() && !force {
            anyhow::bail!("{:?} already exists. Use --force to overwrite.", path);
        }
        Config::default().save(path)?;
        println!("✓ Wrote default configuration to {:?}", path);
        if !show {
            return Ok(());
        }
    }

    let config = load_config(path)?;
    print_config(&config);
    Ok(())
}

fn print_config(config: &Config) {
    println!("docmaint Configuration");
    println!("======================\n");

    println!("Repository: {:?}", config.repo_dir());
    println!("Index:      {:?}", config.index_dir());
    println!("Docs:       {:?}", config.docs_dir());

    println!("\nIgnore patterns:");
    for pattern in &config.ignore_patterns {
        println!("  - {}", pattern);
    }

    println!(
        "\nEmbedding: {} {} ({} dims) at {}",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.dimension,
        config.embedding.endpoint
    );
    println!("LLM: {} at {}", config.llm.model, config.llm.endpoint);
    println!(
        "LLM API key: {}",
        if config.llm.resolved_api_key().is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("Top K: {}", config.search.top_k);
}

/// Print any serializable result as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_ingest_text(report: &IngestReport) {
    println!("Ingested {:?}", report.repo_dir);
    println!("  Python files: {}", report.files);
    for skipped in &report.skipped {
        println!("  Skipped: {}", skipped);
    }

    match &report.build {
        Some(build) => {
            println!("  Chunks indexed: {}", build.chunks);
            println!("  Dimension: {}", build.dimension);
            println!("  Index: {:?}", build.index_path);
            println!("  Metadata: {:?}", build.metadata_path);
        }
        None => println!("⚠ No functions found; index not written"),
    }
}

pub fn print_hits_text(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {} ({}) distance {:.4}",
            rank + 1,
            hit.chunk.symbol_name,
            hit.chunk.location(),
            hit.distance
        );
    }
}

/// `run` output in JSON form
#[derive(Serialize)]
pub struct RunOutput<'a> {
    #[serde(flatten)]
    pub state: &'a PipelineState,
    pub summary: EvaluationSummary,
}

pub fn print_run_text(state: &PipelineState) {
    if let Some(ref markdown) = state.final_markdown {
        println!("{}", markdown.trim_end());
    }

    println!("\nEvaluations:");
    println!("============\n");
    for (symbol, record) in state.evaluations.iter() {
        match record {
            ScoreRecord::Scored {
                correctness,
                coverage,
                clarity,
                consistency,
                overall_score,
            } => println!(
                "{}: overall {} (correctness {}, coverage {}, clarity {}, consistency {})",
                symbol, overall_score, correctness, coverage, clarity, consistency
            ),
            ScoreRecord::Unparsed { raw_response } => {
                println!("{}: unparsed judge reply: {}", symbol, raw_response.trim())
            }
        }
    }

    print_summary_text(&EvaluationSummary::from_records(state.evaluations.values()));

    if let Some(ref path) = state.output_path {
        println!("\n✓ Wrote {:?}", path);
    }
}

pub fn print_summary_text(summary: &EvaluationSummary) {
    println!("\nAverage scores over {} samples:", summary.samples);
    for (metric, mean) in summary.metrics() {
        match mean {
            Some(mean) => println!("  {:13} {:.2}", metric, mean),
            None => println!("  {:13} no data", metric),
        }
    }
    if summary.unparsed > 0 {
        println!("  ({} unparsed)", summary.unparsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use tempfile::TempDir;

    const JUDGE_REPLY: &str = r#"{"correctness": 5, "coverage": 3, "clarity": 4, "consistency": 5, "overall_score": 4}"#;

    fn offline_config(dir: &TempDir) -> Config {
        let mut config = Config::default().with_base_dir(dir.path());
        config.paths.repo_dir = PathBuf::from("repo");
        config.embedding.provider = "mock".to_string();
        config.embedding.dimension = 16;

        let pkg = dir.path().join("repo/pkg");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(
            pkg.join("mod.py"),
            "def load(path):\n    return open(path).read()\n\n\ndef save(path, text):\n    open(path, 'w').write(text)\n",
        )
        .unwrap();
        config
    }

    fn judge_llm() -> Arc<MockLlmClient> {
        let mut llm = MockLlmClient::new().with_default("Docs.");
        llm.add_response("Respond ONLY as a JSON object", JUDGE_REPLY);
        Arc::new(llm)
    }

    #[tokio::test]
    async fn test_ingest_then_search() {
        let dir = TempDir::new().unwrap();
        let config = offline_config(&dir);

        let report = ingest(&config, None).await.unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.build.as_ref().map(|b| b.chunks), Some(2));

        let hits = search(&config, "open file", Some(1)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_empty_repo_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = offline_config(&dir);
        config.paths.repo_dir = PathBuf::from("empty");
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let report = ingest(&config, None).await.unwrap();
        assert!(report.build.is_none());
        assert!(!config.index_dir().exists());
    }

    #[tokio::test]
    async fn test_run_writes_module_doc() {
        let dir = TempDir::new().unwrap();
        let config = offline_config(&dir);
        ingest(&config, None).await.unwrap();

        let state = run(&config, judge_llm(), "pkg/mod.py", None).await.unwrap();

        assert_eq!(state.evaluations.len(), 2);
        assert!(config.docs_dir().join("pkg_mod.py.md").exists());

        let json = serde_json::to_value(RunOutput {
            state: &state,
            summary: EvaluationSummary::from_records(state.evaluations.values()),
        })
        .unwrap();
        assert_eq!(json["module_path"], "pkg/mod.py");
        assert_eq!(json["summary"]["overall_score"], 4.0);
    }

    #[test]
    fn test_config_init_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docmaint.toml");

        config_command(&path, false, true, false).unwrap();
        assert!(path.exists());
        assert!(config_command(&path, false, true, false).is_err());
        config_command(&path, false, true, true).unwrap();
    }
}
