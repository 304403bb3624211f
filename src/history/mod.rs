//! Query history
//!
//! Durable log of handled queries. Records are written once and never
//! updated; writes from different queries are independent.

pub mod sqlite;

pub use sqlite::SqliteHistoryStore;

use crate::config::AgentConfig;
use crate::models::QueryRecord;
use crate::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Trait for history persistence
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: QueryRecord) -> Result<()>;

    /// Most recent query text for a user
    async fn last_query(&self, user_id: &str) -> Result<Option<String>>;

    /// Up to `limit` records for a user, newest first
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<QueryRecord>>;

    /// Release any held connections
    async fn close(&self) {}
}

/// In-memory history store for development and tests
pub struct InMemoryHistoryStore {
    records: Arc<RwLock<Vec<QueryRecord>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn all(&self) -> Vec<QueryRecord> {
        self.records.read().await.clone()
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: QueryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn last_query(&self, user_id: &str) -> Result<Option<String>> {
        let records = self.records.read().await;

        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.started_at)
            .map(|r| r.query_text.clone()))
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<QueryRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<QueryRecord> = records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();

        // Sort by timestamp descending
        items.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        items.truncate(limit);

        Ok(items)
    }
}

/// Pick the history backend from configuration.
///
/// SQLite when `history_database_url` is set, in-memory otherwise or when
/// the URL cannot be used.
pub fn build_history_store(config: &AgentConfig) -> Arc<dyn HistoryStore> {
    if let Some(url) = config.history_database_url.as_deref() {
        match SqliteHistoryStore::connect_lazy(url) {
            Ok(store) => {
                info!("Query history backend: sqlite");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize sqlite history backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Query history backend: in-memory");
    Arc::new(InMemoryHistoryStore::new())
}
