//! SQLite-backed query history
//!
//! The pool connects lazily and the schema is created on first use.
//! `connect_lazy` must be called from inside a tokio runtime.

use crate::error::AgentError;
use crate::history::HistoryStore;
use crate::models::{QueryPath, QueryRecord};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

pub struct SqliteHistoryStore {
    pool: SqlitePool,
    schema_ready: Arc<OnceCell<()>>,
}

impl SqliteHistoryStore {
    /// Build a lazily connected store, e.g. `sqlite://customer_history.db`
    /// or `sqlite::memory:`
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        // an in-memory database lives only as long as its single connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        Ok(Self {
            pool: pool_options.connect_lazy_with(options),
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS customer_queries (
                      record_id TEXT PRIMARY KEY,
                      customer_id TEXT NOT NULL,
                      query TEXT NOT NULL,
                      response TEXT NOT NULL,
                      path TEXT NOT NULL,
                      started_at TEXT NOT NULL,
                      finished_at TEXT NOT NULL,
                      latency_ms INTEGER NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_customer_queries_customer_time
                    ON customer_queries (customer_id, started_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::PersistenceFailure(format!(
                    "Failed to initialize query history schema: {}",
                    e
                ))
            })?;

        Ok(())
    }

    fn record_from_row(row: &SqliteRow) -> Result<QueryRecord> {
        let record_id: String = row.try_get("record_id")?;
        let path: String = row.try_get("path")?;
        let latency_ms: i64 = row.try_get("latency_ms")?;
        let started_at: DateTime<Utc> = row.try_get("started_at")?;
        let finished_at: DateTime<Utc> = row.try_get("finished_at")?;

        Ok(QueryRecord {
            record_id: Uuid::parse_str(&record_id)?,
            user_id: row.try_get("customer_id")?,
            query_text: row.try_get("query")?,
            response_text: row.try_get("response")?,
            started_at,
            finished_at,
            latency_ms: latency_ms.max(0) as u64,
            path: QueryPath::parse(&path).ok_or_else(|| {
                AgentError::PersistenceFailure(format!("Unknown query path '{}'", path))
            })?,
        })
    }
}

#[async_trait::async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, record: QueryRecord) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO customer_queries
              (record_id, customer_id, query, response, path, started_at, finished_at, latency_ms)
            VALUES
              (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.record_id.to_string())
        .bind(&record.user_id)
        .bind(&record.query_text)
        .bind(&record.response_text)
        .bind(record.path.as_str())
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(record.latency_ms as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AgentError::PersistenceFailure(format!("Failed to insert query record: {}", e))
        })?;

        debug!(record_id = %record.record_id, "Query record persisted");
        Ok(())
    }

    async fn last_query(&self, user_id: &str) -> Result<Option<String>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT query FROM customer_queries
            WHERE customer_id = ?
            ORDER BY started_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_get::<String, _>("query"))
            .transpose()
            .map_err(AgentError::from)
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<QueryRecord>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT record_id, customer_id, query, response, path, started_at, finished_at, latency_ms
            FROM customer_queries
            WHERE customer_id = ?
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AgentError::PersistenceFailure(format!("Failed to load query history: {}", e))
        })?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
