//! LLM access for documentation drafting and judging
//!
//! This module handles:
//! - Talking to OpenAI-compatible chat completion endpoints
//! - The fixed prompt templates and their temperatures
//! - A scripted mock client for tests and offline runs

mod client;
mod prompts;

pub use client::{ChatRequest, LlmClient, LlmConfig, LlmResponse, MockLlmClient, TextGenerator};
pub use prompts::{DocPrompt, JudgePrompt, DOC_TEMPERATURE, JUDGE_TEMPERATURE};
