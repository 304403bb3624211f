//! LLM client trait and implementations
//!
//! Prompt in, text out. Deadlines are applied by the callers (scorer,
//! answer generator), each with its own budget.

use crate::Result;
use async_trait::async_trait;

pub mod ollama;
pub use ollama::OllamaClient;

/// Per-call generation knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// Trait for text completion against a local model backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}
