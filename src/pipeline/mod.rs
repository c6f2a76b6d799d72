//! Documentation pipeline
//!
//! One run documents one module by passing a [`PipelineState`] through five
//! stages in a fixed order:
//! - Plan: optional adjustment of the request
//! - Search: select relevant code chunks from the index
//! - Generate: draft Markdown docs per symbol
//! - Evaluate: score each draft with an LLM judge
//! - Assemble: combine drafts into the module document and write it
//!
//! Any stage error ends the run. Only the last stage writes to disk, so a
//! failed run leaves no document behind.

pub mod evaluate;
pub mod generate;
pub mod output;
pub mod plan;
pub mod search;
pub mod state;

pub use evaluate::{parse_judge_response, DocEvaluator, EvaluationSummary, ScoreRecord};
pub use generate::{assemble_overview, DocWriter};
pub use output::{AssembleStage, DocOutput};
pub use plan::{IdentityPlanner, PlanStage, Planner};
pub use search::SearchStage;
pub use state::{PipelineState, SymbolMap};

use crate::error::Result;
use crate::index::CodeSearchIndex;
use crate::llm::TextGenerator;
use crate::repo::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// One step of a documentation run
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Consume the state and return it with this stage's fields filled in
    async fn apply(&self, state: PipelineState) -> Result<PipelineState>;
}

/// Plan, Search, Generate, Evaluate, Assemble
pub struct DocPipeline {
    plan: PlanStage,
    search: SearchStage,
    generate: DocWriter,
    evaluate: DocEvaluator,
    assemble: AssembleStage,
}

impl DocPipeline {
    /// Create a pipeline with the identity planner
    pub fn new(
        index: Arc<CodeSearchIndex>,
        llm: Arc<dyn TextGenerator>,
        docs_dir: impl Into<PathBuf>,
        top_k: usize,
    ) -> Self {
        Self {
            plan: PlanStage::default(),
            search: SearchStage::new(index, top_k),
            generate: DocWriter::new(llm.clone()),
            evaluate: DocEvaluator::new(llm),
            assemble: AssembleStage::new(DocOutput::new(docs_dir)),
        }
    }

    /// Create a pipeline using the docs directory and `top_k` from `config`
    pub fn from_config(
        config: &Config,
        index: Arc<CodeSearchIndex>,
        llm: Arc<dyn TextGenerator>,
    ) -> Self {
        Self::new(index, llm, config.docs_dir(), config.search.top_k)
    }

    /// Replace the planning strategy
    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.plan = PlanStage::new(planner);
        self
    }

    fn stages(&self) -> [&dyn Stage; 5] {
        [
            &self.plan,
            &self.search,
            &self.generate,
            &self.evaluate,
            &self.assemble,
        ]
    }

    /// Document `module_path`, returning the final state
    pub async fn run(&self, module_path: &str, query: Option<&str>) -> Result<PipelineState> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("pipeline", %run_id, module = module_path);

        let state = PipelineState::new(module_path, query.map(str::to_string));
        self.run_stages(state).instrument(span).await
    }

    async fn run_stages(&self, mut state: PipelineState) -> Result<PipelineState> {
        tracing::info!("Starting documentation run");

        for stage in self.stages() {
            tracing::debug!("Entering stage {}", stage.name());
            state = stage.apply(state).await.map_err(|e| {
                tracing::error!("Stage {} failed: {}", stage.name(), e);
                e
            })?;
        }

        tracing::info!(
            "Finished: {} drafts, {} evaluations",
            state.draft_docs.len(),
            state.evaluations.len()
        );
        Ok(state)
    }
}
