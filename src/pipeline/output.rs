//! Assemble & persist stage

use super::generate::assemble_overview;
use super::{PipelineState, Stage};
use crate::error::Result;
use std::path::PathBuf;

/// Writes module documents under a docs directory
#[derive(Debug, Clone)]
pub struct DocOutput {
    docs_dir: PathBuf,
}

impl DocOutput {
    pub fn new(docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
        }
    }

    /// Document path for a module: separators become `_`, `.md` is appended
    pub fn output_path(&self, module_path: &str) -> PathBuf {
        let file_name: String = module_path
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.docs_dir.join(format!("{}.md", file_name))
    }

    /// Write `markdown` for `module_path`, replacing any earlier document
    pub fn write(&self, module_path: &str, markdown: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.docs_dir)?;
        let path = self.output_path(module_path);
        crate::repo::write_atomic(&path, markdown.as_bytes())?;
        Ok(path)
    }
}

/// Final stage: build the module document and save it
pub struct AssembleStage {
    output: DocOutput,
}

impl AssembleStage {
    pub fn new(output: DocOutput) -> Self {
        Self { output }
    }
}

#[async_trait::async_trait]
impl Stage for AssembleStage {
    fn name(&self) -> &'static str {
        "assemble"
    }

    async fn apply(&self, mut state: PipelineState) -> Result<PipelineState> {
        let markdown = assemble_overview(&state.module_path, &state.draft_docs);
        let path = self.output.write(&state.module_path, &markdown)?;
        tracing::info!("Wrote {:?}", path);

        state.final_markdown = Some(markdown);
        state.output_path = Some(path);
        Ok(state)
    }
}
