//! docmaint - Retrieval-augmented API documentation for Python repositories
//!
//! This library provides the pieces of the documentation pipeline: chunk
//! extraction, the embedding index, LLM drafting and judging, and the
//! orchestrator that ties them together.

pub mod cli;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod repo;

/// Re-export commonly used types
pub use error::{Error, Result};
pub use extract::{CodeChunk, PythonExtractor};
pub use index::{CodeSearchIndex, SearchHit};
pub use pipeline::{DocPipeline, PipelineState, ScoreRecord};
pub use repo::Config;
