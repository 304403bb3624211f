//! Financial Agent
//!
//! A small financial Q&A agent that:
//! - Routes each query to weather lookup or the finance knowledge base
//! - Scores every knowledge entry against the query with a local LLM
//! - Generates the answer from the best-matching entry
//! - Records every handled query with its latency
//!
//! PIPELINE:
//! INPUT → ROUTE → (SCORE → RANK → GENERATE) | WEATHER → RESPOND → PERSIST

pub mod agent;
pub mod answer;
pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod retrieval;
pub mod router;
pub mod weather;

#[cfg(test)]
mod testing;

pub use error::Result;

// Re-export common types
pub use agent::FinancialAgent;
pub use config::AgentConfig;
pub use models::*;
pub use router::{Intent, IntentRouter};
