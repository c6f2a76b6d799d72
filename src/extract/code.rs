//! Python code extraction using tree-sitter
//!
//! Only module-level function definitions become chunks. Nested functions,
//! classes and class methods are left out.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A named, line-ranged unit of source code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Position of the chunk within its index generation
    ///
    /// Ids handed out by the extractor are provisional; building the index
    /// renumbers every chunk densely from zero.
    pub id: usize,
    /// File path relative to the repository root
    pub file_path: String,
    /// Function name
    pub symbol_name: String,
    /// First line of the definition (1-based)
    pub start_line: usize,
    /// Last line of the definition body (1-based, inclusive)
    pub end_line: usize,
    /// Raw source text of the definition
    pub code: String,
}

impl CodeChunk {
    /// Create a new code chunk
    pub fn new(
        file_path: &str,
        symbol_name: &str,
        code: &str,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            id: 0,
            file_path: file_path.to_string(),
            symbol_name: symbol_name.to_string(),
            start_line,
            end_line,
            code: code.to_string(),
        }
    }

    /// Text handed to the embedding model
    pub fn embedding_text(&self) -> &str {
        &self.code
    }

    /// `path:start-end` label for log and CLI output
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

/// Extracts top-level function chunks from Python source
pub struct PythonExtractor {
    parser: tree_sitter::Parser,
}

impl PythonExtractor {
    /// Create a new extractor with the Python grammar loaded
    pub fn new() -> Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| Error::Configuration(format!("failed to load Python grammar: {}", e)))?;

        Ok(Self { parser })
    }

    /// Extract chunks from raw file bytes
    ///
    /// Undecodable or unparseable files are logged and yield no chunks, so a
    /// single bad file never stops an ingestion run.
    pub fn extract_file(&mut self, file_path: &str, bytes: &[u8]) -> Vec<CodeChunk> {
        match self.extract_bytes(file_path, bytes) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("Skipping file: {}", e);
                Vec::new()
            }
        }
    }

    /// Decode `bytes` as UTF-8 and extract chunks from it
    pub fn extract_bytes(&mut self, file_path: &str, bytes: &[u8]) -> Result<Vec<CodeChunk>> {
        let source = std::str::from_utf8(bytes).map_err(|e| Error::Extraction {
            path: file_path.to_string(),
            reason: format!("not valid UTF-8 ({})", e),
        })?;
        self.extract_source(file_path, source)
    }

    /// Extract chunks from decoded source text
    pub fn extract_source(&mut self, file_path: &str, source: &str) -> Result<Vec<CodeChunk>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| Error::Extraction {
                path: file_path.to_string(),
                reason: "parser produced no tree".to_string(),
            })?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(root.start_position().row + 1);
            return Err(Error::Extraction {
                path: file_path.to_string(),
                reason: format!("syntax error near line {}", line),
            });
        }

        let lines: Vec<&str> = source.lines().collect();
        let mut chunks = Vec::new();

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            let definition = match child.kind() {
                "function_definition" => child,
                "decorated_definition" => match child.child_by_field_name("definition") {
                    Some(inner) if inner.kind() == "function_definition" => inner,
                    _ => continue,
                },
                _ => continue,
            };

            if let Some(mut chunk) = extract_function(definition, source, &lines, file_path) {
                chunk.id = chunks.len();
                chunks.push(chunk);
            }
        }

        tracing::debug!("Extracted {} chunks from {}", chunks.len(), file_path);
        Ok(chunks)
    }
}

/// Build a chunk for one `function_definition` node
fn extract_function(
    node: tree_sitter::Node,
    source: &str,
    lines: &[&str],
    file_path: &str,
) -> Option<CodeChunk> {
    let name = node
        .child_by_field_name("name")?
        .utf8_text(source.as_bytes())
        .ok()?;

    let start_line = node.start_position().row + 1;
    let end_line = node
        .child_by_field_name("body")
        .map(content_end_line)
        .unwrap_or(start_line)
        .max(start_line);

    let code = lines
        .get(start_line - 1..end_line.min(lines.len()))
        .map(|span| span.join("\n"))
        .unwrap_or_default();

    Some(CodeChunk::new(file_path, name, &code, start_line, end_line))
}

/// Line of the last non-comment code in a node, descending into nested blocks
fn content_end_line(node: tree_sitter::Node) -> usize {
    let mut cursor = node.walk();
    let last = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .last();

    match last {
        Some(child) if node.kind() == "block" || opens_block(child.kind()) => {
            content_end_line(child)
        }
        _ => last_line(node),
    }
}

/// Kinds whose text ends with an indented block that may hold trailing comments
fn opens_block(kind: &str) -> bool {
    kind == "block" || kind.ends_with("_clause") || kind.ends_with("_definition")
}

/// 1-based line on which a node's text ends
fn last_line(node: tree_sitter::Node) -> usize {
    let end = node.end_position();
    // A node that ends at column 0 stops right after the previous line's newline
    if end.column == 0 && end.row > node.start_position().row {
        end.row
    } else {
        end.row + 1
    }
}

/// 1-based line of the first error or missing node in a tree
fn first_error_line(node: tree_sitter::Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error_line)
}
