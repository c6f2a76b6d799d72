//! Generation stage and module document assembly

use super::state::SymbolMap;
use super::{PipelineState, Stage};
use crate::error::Result;
use crate::extract::CodeChunk;
use crate::llm::{DocPrompt, TextGenerator};
use std::sync::Arc;

/// Drafts Markdown documentation for code chunks
pub struct DocWriter {
    llm: Arc<dyn TextGenerator>,
}

impl DocWriter {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Draft documentation for a single chunk
    pub async fn generate(&self, chunk: &CodeChunk) -> Result<String> {
        let request = DocPrompt::request(&chunk.code);
        let response = self.llm.chat(&request).await?;
        Ok(response.content)
    }
}

#[async_trait::async_trait]
impl Stage for DocWriter {
    fn name(&self) -> &'static str {
        "generate"
    }

    async fn apply(&self, mut state: PipelineState) -> Result<PipelineState> {
        for chunk in &state.selected_chunks {
            tracing::debug!("Drafting docs for {} ({})", chunk.symbol_name, chunk.location());
            let doc = self.generate(chunk).await?;
            state.draft_docs.insert(chunk.symbol_name.clone(), doc);
        }

        tracing::info!("Drafted {} docs", state.draft_docs.len());
        Ok(state)
    }
}

/// Combine per-symbol drafts into one module document
pub fn assemble_overview(module_path: &str, docs: &SymbolMap<String>) -> String {
    let mut markdown = format!("# Module `{}`\n\n", module_path);
    for (symbol, doc) in docs.iter() {
        markdown.push_str(&format!("## {}\n\n{}\n\n", symbol, doc));
    }
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, DOC_TEMPERATURE};
    use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

    fn headings(markdown: &str) -> Vec<(HeadingLevel, String)> {
        let mut result = Vec::new();
        let mut current: Option<(HeadingLevel, String)> = None;

        for event in Parser::new(markdown) {
            match event {
                Event::Start(Tag::Heading { level, .. }) => current = Some((level, String::new())),
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, ref mut buf)) = current {
                        buf.push_str(&text);
                    }
                }
                Event::End(TagEnd::Heading(_)) => result.extend(current.take()),
                _ => {}
            }
        }

        result
    }

    #[test]
    fn test_assemble_overview_format() {
        let docs: SymbolMap<String> = vec![("f", "Does f.".to_string())].into_iter().collect();
        assert_eq!(
            assemble_overview("pkg/mod.py", &docs),
            "# Module `pkg/mod.py`\n\n## f\n\nDoes f.\n\n"
        );
        assert_eq!(
            assemble_overview("empty.py", &SymbolMap::new()),
            "# Module `empty.py`\n\n"
        );
    }

    #[test]
    fn test_assemble_overview_keeps_insertion_order() {
        let docs: SymbolMap<String> = vec![
            ("zeta", "Last letter.".to_string()),
            ("alpha", "First letter.\n\n**Parameters**\n\n- none".to_string()),
            ("mid", "Middle.".to_string()),
        ]
        .into_iter()
        .collect();

        let markdown = assemble_overview("letters.py", &docs);
        let found = headings(&markdown);

        assert_eq!(
            found,
            vec![
                (HeadingLevel::H1, "Module letters.py".to_string()),
                (HeadingLevel::H2, "zeta".to_string()),
                (HeadingLevel::H2, "alpha".to_string()),
                (HeadingLevel::H2, "mid".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_sends_code_at_doc_temperature() {
        let mut llm = MockLlmClient::new();
        llm.add_response("def add", "Adds two numbers.");
        let llm = Arc::new(llm);
        let writer = DocWriter::new(llm.clone());

        let chunk = CodeChunk::new("m.py", "add", "def add(a, b):\n    return a + b", 1, 2);
        let doc = writer.generate(&chunk).await.unwrap();

        assert_eq!(doc, "Adds two numbers.");
        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, DOC_TEMPERATURE);
        assert!(requests[0].user.contains(&chunk.code));
    }

    #[tokio::test]
    async fn test_stage_keys_drafts_by_symbol() {
        let mut llm = MockLlmClient::new();
        llm.add_response("first", "First helper.");
        llm.add_response("second", "Second helper.");
        llm.add_response("def other", "Other.");
        let writer = DocWriter::new(Arc::new(llm));

        let mut state = PipelineState::new("m.py", None);
        state.selected_chunks = vec![
            CodeChunk::new("a.py", "helper", "def helper():\n    return 'first'", 1, 2),
            CodeChunk::new("a.py", "other", "def other():\n    pass", 4, 5),
            CodeChunk::new("b.py", "helper", "def helper():\n    return 'second'", 1, 2),
        ];

        let state = writer.apply(state).await.unwrap();
        let drafts: Vec<_> = state
            .draft_docs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        assert_eq!(
            drafts,
            vec![
                ("helper".to_string(), "Second helper.".to_string()),
                ("other".to_string(), "Other.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stage_propagates_failures() {
        let mut llm = MockLlmClient::new();
        llm.add_failure("def broken");
        let writer = DocWriter::new(Arc::new(llm));

        let mut state = PipelineState::new("m.py", None);
        state.selected_chunks = vec![CodeChunk::new("m.py", "broken", "def broken(): pass", 1, 1)];

        assert!(writer.apply(state).await.is_err());
    }
}
