//! Ollama client for the local LLM backend
//!
//! Talks to `POST {base}/api/generate` with streaming disabled.
//! The reqwest::Client (and its connection pool) is created on first use
//! and shared by every call until the client is dropped.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::llm::{CompletionOptions, LlmClient};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error};

/// Reusable Ollama client (connection-pooled)
pub struct OllamaClient {
    http: OnceLock<Client>,
    base_url: String,
    model_name: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        let base_url: String = base_url.into();

        Self {
            http: OnceLock::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: model_name.into(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.ollama_base_url.clone(), config.model_name.clone())
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Lazily build the shared HTTP client.
    /// The backend is local, so system proxies are ignored.
    fn http(&self) -> &Client {
        self.http.get_or_init(|| {
            Client::builder()
                .no_proxy()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(8)
                .build()
                .unwrap_or_default()
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> crate::Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: &self.model_name,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        debug!(model = %self.model_name, prompt_chars = prompt.chars().count(), "Calling Ollama");

        let response = self
            .http()
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Ollama request failed: {}", e);
                AgentError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Ollama error response: {}", error_text);
            return Err(AgentError::Unreachable(format!(
                "Ollama returned {}: {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Ollama response: {}", e);
            AgentError::MalformedOutput(format!("Ollama parse error: {}", e))
        })?;

        match body.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(AgentError::MalformedOutput(
                "Empty response from Ollama".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}
