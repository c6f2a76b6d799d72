//! Search stage: pick the chunks to document

use super::{PipelineState, Stage};
use crate::error::Result;
use crate::index::CodeSearchIndex;
use std::sync::Arc;

/// Fills `selected_chunks` from the code search index
pub struct SearchStage {
    index: Arc<CodeSearchIndex>,
    top_k: usize,
}

impl SearchStage {
    pub fn new(index: Arc<CodeSearchIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }
}

#[async_trait::async_trait]
impl Stage for SearchStage {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn apply(&self, mut state: PipelineState) -> Result<PipelineState> {
        let query = state.effective_query();
        tracing::debug!("Searching for {:?} (top {})", query, self.top_k);

        state.selected_chunks = self.index.search(&query, self.top_k).await?;
        tracing::info!("Selected {} chunks", state.selected_chunks.len());

        Ok(state)
    }
}
