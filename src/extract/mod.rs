//! Source extraction
//!
//! Splits Python files into retrieval units (one per top-level function)
//! using tree-sitter.

pub mod code;

pub use code::{CodeChunk, PythonExtractor};
