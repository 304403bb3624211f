//! Answer generation
//!
//! Builds one prompt from the retrieved knowledge (if any) and the user
//! query, and makes a single LLM call. This call sits on the response path,
//! so any failure turns into a fixed fallback message.

use crate::config::AgentConfig;
use crate::error::with_timeout;
use crate::llm::{CompletionOptions, LlmClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shown when the model cannot be reached or returns nothing usable
pub const ANSWER_FALLBACK: &str =
    "抱歉，智能助手暂时无法生成回答（模型服务不可用或响应超时），请稍后再试。";

/// Outcome of one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    /// True when `text` is `ANSWER_FALLBACK`
    pub fell_back: bool,
}

pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
    options: CompletionOptions,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration, options: CompletionOptions) -> Self {
        Self {
            llm,
            timeout,
            options,
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, config: &AgentConfig) -> Self {
        Self::new(
            llm,
            config.generate_timeout,
            CompletionOptions {
                max_tokens: config.answer_max_tokens,
                temperature: config.temperature,
            },
        )
    }

    /// Generate a response; never fails
    pub async fn generate(&self, query: &str, context: Option<&str>) -> GeneratedAnswer {
        let prompt = build_answer_prompt(query, context);

        match with_timeout(self.timeout, self.llm.complete(&prompt, &self.options)).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(
                    with_context = context.is_some(),
                    answer_chars = text.chars().count(),
                    "Answer generated"
                );
                GeneratedAnswer {
                    text: text.trim().to_string(),
                    fell_back: false,
                }
            }
            Ok(_) => {
                warn!("Model returned an empty answer, using fallback");
                Self::fallback()
            }
            Err(e) => {
                warn!("Answer generation failed, using fallback: {}", e);
                Self::fallback()
            }
        }
    }

    fn fallback() -> GeneratedAnswer {
        GeneratedAnswer {
            text: ANSWER_FALLBACK.to_string(),
            fell_back: true,
        }
    }
}

/// Build the generation prompt with the answering guidelines
fn build_answer_prompt(query: &str, context: Option<&str>) -> String {
    let guidelines = "请用简洁、专业的中文回答以下问题，避免使用英文。\n\
若问题涉及投资建议，需基于保守、稳健的原则；若涉及概念解释，需通俗易懂。";

    match context {
        Some(knowledge) => format!(
            "{}\n\n基于以下知识库信息，回答用户问题：\n知识库：{}\n用户问题：{}",
            guidelines, knowledge, query
        ),
        None => format!("{}\n\n问题：{}", guidelines, query),
    }
}
