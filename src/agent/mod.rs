//! Main orchestrator - one query end to end
//!
//! RECEIVED → ROUTED → (SCORING → RANKING → GENERATING) | WEATHER → RESPONDED → PERSISTED
//!
//! Every stage is guarded: an error or panic inside it is logged and
//! replaced by that stage's fallback, so `handle_query` always answers.

use crate::answer::{AnswerGenerator, GeneratedAnswer, ANSWER_FALLBACK};
use crate::config::{AgentConfig, DEFAULT_HISTORY_TIMEOUT};
use crate::error::{panic_reason, with_timeout, AgentError};
use crate::history::HistoryStore;
use crate::knowledge::KnowledgeStore;
use crate::llm::{LlmClient, OllamaClient};
use crate::models::{AgentResponse, KnowledgeEntry, QueryPath, QueryRecord};
use crate::retrieval::{RetrievalRanker, SemanticScorer};
use crate::router::{Intent, IntentRouter};
use crate::weather::{WeatherClient, WeatherOutcome, WEATHER_DEGRADED};
use crate::Result;
use chrono::Utc;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Reply to a blank query
pub const EMPTY_QUERY_MESSAGE: &str = "请输入您想咨询的问题。";

/// Prefixed to answers generated without a confident knowledge match
pub const NO_MATCH_NOTICE: &str = "（知识库中未找到高度相关的条目，以下为通用回答）\n";

/// Main orchestrator that coordinates the entire workflow
pub struct FinancialAgent {
    knowledge: Arc<dyn KnowledgeStore>,
    history: Arc<dyn HistoryStore>,
    scorer: SemanticScorer,
    generator: AnswerGenerator,
    weather: WeatherClient,
    history_timeout: Duration,
}

impl FinancialAgent {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        history: Arc<dyn HistoryStore>,
        scorer: SemanticScorer,
        generator: AnswerGenerator,
        weather: WeatherClient,
    ) -> Self {
        Self {
            knowledge,
            history,
            scorer,
            generator,
            weather,
            history_timeout: DEFAULT_HISTORY_TIMEOUT,
        }
    }

    /// Deadline for the history write at the end of each query
    pub fn with_history_timeout(mut self, timeout: Duration) -> Self {
        self.history_timeout = timeout;
        self
    }

    /// Wire the production components; scorer and generator share one
    /// Ollama client (and connection pool)
    pub fn from_config(
        config: &AgentConfig,
        knowledge: Arc<dyn KnowledgeStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let ollama = OllamaClient::from_config(config);

        info!(
            model = %ollama.model_name(),
            backend = %config.ollama_base_url,
            weather_configured = config.weather_configured(),
            "Financial agent initialized"
        );

        let llm: Arc<dyn LlmClient> = Arc::new(ollama);

        Self::new(
            knowledge,
            history,
            SemanticScorer::from_config(Arc::clone(&llm), config),
            AnswerGenerator::from_config(llm, config),
            WeatherClient::from_config(config),
        )
        .with_history_timeout(config.history_timeout)
    }

    pub fn knowledge(&self) -> &Arc<dyn KnowledgeStore> {
        &self.knowledge
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Answer one query. Never fails; the history write cannot change or
    /// hold back the returned response beyond `history_timeout`.
    pub async fn handle_query(&self, user_id: &str, query: &str) -> AgentResponse {
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(user_id, query, "Query received");

        let (response, path) = self.respond(query).await;

        let elapsed = clock.elapsed();
        let finished_at = started_at
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        let latency_ms = elapsed.as_millis() as u64;

        info!(user_id, %path, latency_ms, "Query answered");

        let record = QueryRecord {
            record_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            query_text: query.to_string(),
            response_text: response.text.clone(),
            started_at,
            finished_at,
            latency_ms,
            path,
        };

        let write = with_timeout(self.history_timeout, self.history.append(record));
        if let Err(e) = guarded("persist", write).await {
            warn!(user_id, "Query history write failed, response still returned: {}", e);
        }

        response
    }

    async fn respond(&self, query: &str) -> (AgentResponse, QueryPath) {
        let query = query.trim();
        if query.is_empty() {
            return (AgentResponse::text(EMPTY_QUERY_MESSAGE), QueryPath::Error);
        }

        let intent = IntentRouter::classify(query);
        debug!(?intent, "Query routed");

        match intent {
            Intent::Weather => self.answer_weather(query).await,
            Intent::Knowledge => self.answer_knowledge(query).await,
        }
    }

    async fn answer_weather(&self, query: &str) -> (AgentResponse, QueryPath) {
        let location = IntentRouter::extract_location(query);

        let lookup = guarded("weather", async { Ok(self.weather.lookup(&location).await) }).await;

        match lookup {
            Ok(answer) => {
                let path = match answer.outcome {
                    WeatherOutcome::Degraded => QueryPath::Error,
                    WeatherOutcome::Reported | WeatherOutcome::NotConfigured => QueryPath::Weather,
                };
                (AgentResponse::text(answer.text), path)
            }
            Err(e) => {
                warn!("Weather stage failed: {}", e);
                (AgentResponse::text(WEATHER_DEGRADED), QueryPath::Error)
            }
        }
    }

    async fn answer_knowledge(&self, query: &str) -> (AgentResponse, QueryPath) {
        // === SCORING + RANKING ===
        let matched = match guarded("retrieval", self.retrieve(query)).await {
            Ok(matched) => matched,
            Err(e) => {
                warn!("Retrieval stage failed, answering without context: {}", e);
                None
            }
        };

        // === GENERATING ===
        let context = matched.as_ref().map(|entry| entry.text.as_str());
        let generated = guarded("generation", async {
            Ok(self.generator.generate(query, context).await)
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Generation stage failed: {}", e);
            GeneratedAnswer {
                text: ANSWER_FALLBACK.to_string(),
                fell_back: true,
            }
        });

        if generated.fell_back {
            return (AgentResponse::text(generated.text), QueryPath::Error);
        }

        let response = match matched {
            Some(entry) => AgentResponse {
                text: generated.text,
                matched_entry_id: Some(entry.id),
            },
            None => AgentResponse::text(format!("{}{}", NO_MATCH_NOTICE, generated.text)),
        };

        (response, QueryPath::Knowledge)
    }

    /// Score and rank the knowledge base; `None` when nothing matched with
    /// any confidence
    async fn retrieve(&self, query: &str) -> Result<Option<KnowledgeEntry>> {
        let entries = self.knowledge.snapshot().await?;
        if entries.is_empty() {
            info!("Knowledge base is empty");
            return Ok(None);
        }

        let scores = self.scorer.score(query, &entries).await;

        let Some(ranking) = RetrievalRanker::select(&scores) else {
            return Ok(None);
        };

        if ranking.low_confidence {
            warn!(
                failed = scores.iter().filter(|s| s.is_failure()).count(),
                "No knowledge entry scored above zero, treating as no match"
            );
            return Ok(None);
        }

        info!(entry_id = %ranking.entry_id, score = ranking.score, "Best knowledge match");
        Ok(entries.into_iter().nth(ranking.index))
    }

    /// Release the history store's connections
    pub async fn shutdown(self) {
        self.history.close().await;
        info!("Financial agent shut down");
    }
}

/// Run one pipeline stage, turning a panic into `AgentError::StageFailure`
async fn guarded<T, F>(stage: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic_reason(panic.as_ref());
            error!(stage, "Stage panicked: {}", reason);
            Err(AgentError::StageFailure { stage, reason })
        }
    }
}
