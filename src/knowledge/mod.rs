//! Knowledge store
//!
//! Ordered, append-only collection of knowledge entries.
//! Queries read a snapshot; appends take the write lock, so an in-flight
//! scoring round never observes a half-extended store.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::models::KnowledgeEntry;
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Trait for knowledge sources
#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Ordered copy of every entry at this moment
    async fn snapshot(&self) -> Result<Vec<KnowledgeEntry>>;
    async fn append(&self, entry: KnowledgeEntry) -> Result<()>;
    async fn len(&self) -> usize;
}

/// In-memory knowledge store
pub struct InMemoryKnowledgeStore {
    entries: Arc<RwLock<Vec<KnowledgeEntry>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Store seeded with the built-in finance entries
    pub fn with_defaults() -> Self {
        Self::new(default_entries())
    }

    /// Load a JSON array of `{id, text, tags?}` objects
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(&raw)?;

        for (i, entry) in entries.iter().enumerate() {
            validate(entry)?;
            if entries[..i].iter().any(|e| e.id == entry.id) {
                return Err(AgentError::InvalidInput(format!(
                    "Duplicate knowledge entry id '{}'",
                    entry.id
                )));
            }
        }

        info!(
            path = %path.as_ref().display(),
            count = entries.len(),
            "Loaded knowledge base"
        );

        Ok(Self::new(entries))
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn validate(entry: &KnowledgeEntry) -> Result<()> {
    if entry.id.trim().is_empty() {
        return Err(AgentError::InvalidInput(
            "Knowledge entry id must not be blank".to_string(),
        ));
    }
    if entry.text.trim().is_empty() {
        return Err(AgentError::InvalidInput(format!(
            "Knowledge entry '{}' has blank text",
            entry.id
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn snapshot(&self) -> Result<Vec<KnowledgeEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.clone())
    }

    async fn append(&self, entry: KnowledgeEntry) -> Result<()> {
        validate(&entry)?;

        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(AgentError::InvalidInput(format!(
                "Knowledge entry '{}' already exists",
                entry.id
            )));
        }

        info!(entry_id = %entry.id, "Knowledge entry appended");
        entries.push(entry);
        Ok(())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Knowledge store from configuration: the JSON file when
/// `knowledge_base_path` is set, the built-in entries otherwise
pub fn build_knowledge_store(config: &AgentConfig) -> Result<Arc<dyn KnowledgeStore>> {
    match config.knowledge_base_path.as_deref() {
        Some(path) => Ok(Arc::new(InMemoryKnowledgeStore::from_json_file(path)?)),
        None => Ok(Arc::new(InMemoryKnowledgeStore::with_defaults())),
    }
}

/// Built-in finance knowledge base
pub fn default_entries() -> Vec<KnowledgeEntry> {
    vec![
        KnowledgeEntry::new(
            "stocks",
            "股票市场是风险较高的投资渠道，适合能承受短期波动的投资者。",
        )
        .with_tags(&["股票", "高风险"]),
        KnowledgeEntry::new("bonds", "债券投资风险较低、收益稳定，适合保守型投资者。")
            .with_tags(&["债券", "低风险", "保守型"]),
        KnowledgeEntry::new("forex", "外汇市场波动剧烈，对专业知识要求高，不适合新手。")
            .with_tags(&["外汇", "高风险"]),
        KnowledgeEntry::new(
            "money-market-funds",
            "货币基金流动性强、风险极低，适合存放短期备用资金。",
        )
        .with_tags(&["货币基金", "流动性"]),
        KnowledgeEntry::new("index-funds", "指数基金通过跟踪大盘分散风险，适合长期定投。")
            .with_tags(&["指数基金", "定投"]),
    ]
}
