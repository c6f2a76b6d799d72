//! Per-run pipeline state

use super::evaluate::ScoreRecord;
use crate::extract::CodeChunk;
use serde::ser::{Serialize, Serializer};
use std::path::PathBuf;

/// Insertion-ordered map keyed by symbol name
///
/// Inserting an existing key replaces its value without moving it.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> SymbolMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&mut self, symbol: impl Into<String>, value: T) -> Option<T> {
        let symbol = symbol.into();
        match self.entries.iter_mut().find(|(key, _)| *key == symbol) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((symbol, value));
                None
            }
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key == symbol)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl<T> Default for SymbolMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for SymbolMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for SymbolMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Everything one documentation run knows about its module
///
/// Each stage fills in its own fields; nothing here outlives the run except
/// the document written by the final stage.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineState {
    /// Target module, relative to the repository root
    pub module_path: String,
    /// Free-text search query supplied by the caller
    pub query: Option<String>,
    /// Chunks chosen by the search stage, closest first
    pub selected_chunks: Vec<CodeChunk>,
    /// Markdown draft per symbol
    pub draft_docs: SymbolMap<String>,
    /// Judge verdict per symbol
    pub evaluations: SymbolMap<ScoreRecord>,
    /// Assembled module document
    pub final_markdown: Option<String>,
    /// Where the module document was written
    pub output_path: Option<PathBuf>,
}

impl PipelineState {
    pub fn new(module_path: impl Into<String>, query: Option<String>) -> Self {
        Self {
            module_path: module_path.into(),
            query,
            selected_chunks: Vec::new(),
            draft_docs: SymbolMap::new(),
            evaluations: SymbolMap::new(),
            final_markdown: None,
            output_path: None,
        }
    }

    /// The caller's query, or a generic one derived from the module path
    pub fn effective_query(&self) -> String {
        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => query.to_string(),
            _ => format!("Key APIs related to module {}", self.module_path),
        }
    }
}
