//! Core data models for the financial agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Which pipeline branch produced a response
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryPath {
    Knowledge,
    Weather,
    Error,
}

impl QueryPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPath::Knowledge => "knowledge",
            QueryPath::Weather => "weather",
            QueryPath::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "knowledge" => Some(QueryPath::Knowledge),
            "weather" => Some(QueryPath::Weather),
            "error" => Some(QueryPath::Error),
            _ => None,
        }
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ================= Knowledge =================
//

/// One static snippet used as retrieval context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl KnowledgeEntry {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Relevance of one entry to one query.
///
/// `score` only means something relative to other results of the same round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreResult {
    pub entry_id: String,
    pub score: f64,
    pub raw_model_output: String,
}

/// Prefix marking a `raw_model_output` that records a failure, not model text
pub const SCORE_ERROR_MARKER: &str = "[score-error]";

impl ScoreResult {
    pub fn failed(entry_id: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            entry_id: entry_id.into(),
            score: 0.0,
            raw_model_output: format!("{} {}", SCORE_ERROR_MARKER, reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.raw_model_output.starts_with(SCORE_ERROR_MARKER)
    }
}

//
// ================= History =================
//

/// One handled query, written once to the history store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub record_id: Uuid,
    pub user_id: String,
    pub query_text: String,
    pub response_text: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
    pub path: QueryPath,
}

//
// ================= Response =================
//

/// What `handle_query` hands back to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entry_id: Option<String>,
}

impl AgentResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            matched_entry_id: None,
        }
    }
}
