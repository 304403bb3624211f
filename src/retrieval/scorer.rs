//! Semantic scorer
//!
//! Asks the LLM to rate each knowledge entry against the query on a 0-10
//! scale. One call per entry, at most `concurrency` in flight, each under
//! its own deadline. A failed call never fails the round: the entry gets
//! a zero score and an error marker instead.

use crate::config::AgentConfig;
use crate::error::{panic_reason, with_timeout};
use crate::llm::{CompletionOptions, LlmClient};
use crate::models::{KnowledgeEntry, ScoreResult};
use crate::retrieval::parser::parse_score;
use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

pub struct SemanticScorer {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
    concurrency: usize,
    options: CompletionOptions,
}

impl SemanticScorer {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            llm,
            timeout,
            concurrency: concurrency.max(1),
            options: CompletionOptions {
                max_tokens: 10,
                temperature: 0.0,
            },
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, config: &AgentConfig) -> Self {
        let mut scorer = Self::new(llm, config.score_timeout, config.scoring_concurrency);
        scorer.options.max_tokens = config.score_max_tokens;
        scorer
    }

    /// Score every entry; output order and length always match `entries`
    pub async fn score(&self, query: &str, entries: &[KnowledgeEntry]) -> Vec<ScoreResult> {
        debug!(
            entries = entries.len(),
            concurrency = self.concurrency,
            "Scoring knowledge entries"
        );

        let query: Arc<str> = Arc::from(query);

        // `buffered` yields in input order regardless of completion order
        stream::iter(entries.iter().cloned())
            .map(|entry| {
                let llm = Arc::clone(&self.llm);
                let query = Arc::clone(&query);
                let (timeout, options) = (self.timeout, self.options);
                async move {
                    let entry_id = entry.id.clone();
                    AssertUnwindSafe(score_entry(llm.as_ref(), &query, entry, timeout, &options))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            let reason = panic_reason(panic.as_ref());
                            warn!(entry_id = %entry_id, "Relevance scoring panicked: {}", reason);
                            ScoreResult::failed(entry_id, format!("panicked: {}", reason))
                        })
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

async fn score_entry(
    llm: &dyn LlmClient,
    query: &str,
    entry: KnowledgeEntry,
    timeout: Duration,
    options: &CompletionOptions,
) -> ScoreResult {
    let prompt = build_score_prompt(query, &entry.text);

    match with_timeout(timeout, llm.complete(&prompt, options)).await {
        Ok(raw) => match parse_score(&raw) {
            Some(score) => {
                let score = score.clamp(MIN_SCORE, MAX_SCORE);
                debug!(entry_id = %entry.id, score, "Entry scored");
                ScoreResult {
                    entry_id: entry.id,
                    score,
                    raw_model_output: raw,
                }
            }
            None => {
                warn!(entry_id = %entry.id, output = %raw, "Unparseable relevance score");
                ScoreResult::failed(entry.id, format!("unparseable output: {}", raw.trim()))
            }
        },
        Err(e) => {
            warn!(
                entry_id = %entry.id,
                transient = e.is_transient(),
                "Relevance scoring failed: {}",
                e
            );
            ScoreResult::failed(entry.id, e)
        }
    }
}

fn build_score_prompt(query: &str, knowledge: &str) -> String {
    format!(
        r#"请仅返回一个0-10的数字，用于表示“用户查询”与“知识库条目”的语义相关性：
- 0分：完全不相关（如查询天气 vs 投资知识）
- 5分：部分相关（如查询“短期理财” vs “货币基金”）
- 10分：高度相关（如查询“保守投资” vs “债券投资”）

用户查询：{}
知识库条目：{}
相关性分数："#,
        query, knowledge
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::default_entries;
    use crate::testing::{ScriptedLlm, Reply};

    const QUERY: &str = "我是保守型投资者，该选什么理财方式？";

    #[tokio::test]
    async fn test_scores_every_entry_in_order() {
        let llm = Arc::new(
            ScriptedLlm::new(Reply::Text("2".into()))
                .on("条目：债券", Reply::Text("9.5".into()))
                .on("条目：货币", Reply::Text("相关性分数：6分".into())),
        );
        let scorer = SemanticScorer::new(llm.clone(), Duration::from_secs(1), 3);
        let entries = default_entries();

        let results = scorer.score(QUERY, &entries).await;

        assert_eq!(results.len(), entries.len());
        for (result, entry) in results.iter().zip(&entries) {
            assert_eq!(result.entry_id, entry.id);
        }
        assert_eq!(results[1].score, 9.5);
        assert_eq!(results[3].score, 6.0);
        assert_eq!(results[0].score, 2.0);
        assert_eq!(llm.calls(), entries.len());
    }

    #[tokio::test]
    async fn test_order_preserved_when_completion_order_differs() {
        // the first entry answers last
        let llm = Arc::new(
            ScriptedLlm::new(Reply::Text("1".into()))
                .on("条目：股票", Reply::Delayed(Duration::from_millis(80), "7".into())),
        );
        let scorer = SemanticScorer::new(llm, Duration::from_secs(1), 5);
        let entries = default_entries();

        let results = scorer.score(QUERY, &entries).await;

        assert_eq!(results[0].entry_id, "stocks");
        assert_eq!(results[0].score, 7.0);
        assert!(results[1..].iter().all(|r| r.score == 1.0));
    }

    #[tokio::test]
    async fn test_failures_become_zero_scores() {
        let llm = Arc::new(
            ScriptedLlm::new(Reply::Text("4".into()))
                .on("条目：外汇", Reply::Hang)
                .on("条目：指数", Reply::Text("非常相关".into()))
                .on("条目：股票", Reply::Unreachable),
        );
        let scorer = SemanticScorer::new(llm, Duration::from_millis(50), 2);
        let entries = default_entries();

        let results = scorer.score(QUERY, &entries).await;

        assert_eq!(results.len(), 5);
        assert!(results[0].is_failure() && results[0].score == 0.0);
        assert!(results[2].is_failure() && results[2].score == 0.0);
        assert!(results[4].is_failure() && results[4].score == 0.0);
        // isolated: neighbours are unaffected
        assert_eq!(results[1].score, 4.0);
        assert_eq!(results[3].score, 4.0);
    }

    #[tokio::test]
    async fn test_panicking_call_is_isolated() {
        let llm = Arc::new(
            ScriptedLlm::new(Reply::Text("4".into())).on("条目：股票", Reply::Panic),
        );
        let scorer = SemanticScorer::new(llm, Duration::from_secs(1), 2);
        let entries = default_entries();

        let results = scorer.score(QUERY, &entries).await;

        assert_eq!(results.len(), entries.len());
        assert_eq!(results[0].entry_id, "stocks");
        assert!(results[0].is_failure() && results[0].score == 0.0);
        assert!(results[0].raw_model_output.contains("scripted LLM panic"));
        assert!(results[1..].iter().all(|r| r.score == 4.0));
    }

    #[tokio::test]
    async fn test_negative_score_clamps_to_zero() {
        let llm = Arc::new(
            ScriptedLlm::new(Reply::Text("3".into())).on("条目：外汇", Reply::Text("-3".into())),
        );
        let scorer = SemanticScorer::new(llm, Duration::from_secs(1), 4);

        let results = scorer.score(QUERY, &default_entries()).await;

        assert_eq!(results[2].score, MIN_SCORE);
        assert!(!results[2].is_failure());
    }

    #[tokio::test]
    async fn test_unreachable_backend_scores_all_zero() {
        let llm = Arc::new(ScriptedLlm::new(Reply::Unreachable));
        let scorer = SemanticScorer::new(llm, Duration::from_millis(50), 4);
        let entries = default_entries();

        let results = scorer.score(QUERY, &entries).await;

        assert_eq!(results.len(), entries.len());
        assert!(results.iter().all(|r| r.score == 0.0 && r.is_failure()));
    }

    #[tokio::test]
    async fn test_concurrency_limit_respected() {
        let llm = Arc::new(ScriptedLlm::new(Reply::Delayed(
            Duration::from_millis(20),
            "5".into(),
        )));
        let scorer = SemanticScorer::new(llm.clone(), Duration::from_secs(1), 2);

        scorer.score(QUERY, &default_entries()).await;

        assert!(llm.max_in_flight() <= 2);
        assert!(llm.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_clamped() {
        let llm = Arc::new(
            ScriptedLlm::new(Reply::Text("3".into())).on("条目：债券", Reply::Text("95".into())),
        );
        let scorer = SemanticScorer::new(llm, Duration::from_secs(1), 4);

        let results = scorer.score(QUERY, &default_entries()).await;

        assert_eq!(results[1].score, MAX_SCORE);
    }

    #[tokio::test]
    async fn test_empty_entries() {
        let llm = Arc::new(ScriptedLlm::new(Reply::Text("5".into())));
        let scorer = SemanticScorer::new(llm.clone(), Duration::from_secs(1), 4);

        assert!(scorer.score(QUERY, &[]).await.is_empty());
        assert_eq!(llm.calls(), 0);
    }
}
