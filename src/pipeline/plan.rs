//! Planning stage

use super::{PipelineState, Stage};
use crate::error::Result;
use std::sync::Arc;

/// Strategy that may adjust the state before searching
#[async_trait::async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, state: PipelineState) -> Result<PipelineState>;
}

/// Planner that leaves the state untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPlanner;

#[async_trait::async_trait]
impl Planner for IdentityPlanner {
    async fn plan(&self, state: PipelineState) -> Result<PipelineState> {
        Ok(state)
    }
}

/// Runs the configured [`Planner`] as the first pipeline stage
pub struct PlanStage {
    planner: Arc<dyn Planner>,
}

impl PlanStage {
    pub fn new(planner: Arc<dyn Planner>) -> Self {
        Self { planner }
    }
}

impl Default for PlanStage {
    fn default() -> Self {
        Self::new(Arc::new(IdentityPlanner))
    }
}

#[async_trait::async_trait]
impl Stage for PlanStage {
    fn name(&self) -> &'static str {
        "plan"
    }

    async fn apply(&self, state: PipelineState) -> Result<PipelineState> {
        self.planner.plan(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity_planner_is_a_no_op() {
        let state = PipelineState::new("pkg/mod.py", Some("query".to_string()));
        let planned = PlanStage::default().apply(state).await.unwrap();

        assert_eq!(planned.module_path, "pkg/mod.py");
        assert_eq!(planned.query.as_deref(), Some("query"));
        assert!(planned.selected_chunks.is_empty());
        assert!(planned.draft_docs.is_empty());
    }
}
