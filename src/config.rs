//! Process-wide agent configuration
//!
//! Built once at startup (from `.env` / environment) and handed to every
//! component explicitly. Nothing reads the environment after this point.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11435";
pub const DEFAULT_MODEL: &str = "llama3:latest";
pub const DEFAULT_WEATHER_API_URL: &str = "http://api.weatherapi.com/v1/current.json";
pub const DEFAULT_HISTORY_DATABASE_URL: &str = "sqlite://customer_history.db";
pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Placeholder shipped in sample `.env` files; treated as "no key"
const WEATHER_KEY_PLACEHOLDER: &str = "your_weather_api_key_here";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM backend address (Ollama-compatible `/api/generate`)
    pub ollama_base_url: String,
    pub model_name: String,
    pub weather_api_key: Option<String>,
    pub weather_api_url: String,
    /// Deadline for each per-entry scoring call
    pub score_timeout: Duration,
    /// Deadline for the final answer generation call
    pub generate_timeout: Duration,
    pub weather_timeout: Duration,
    /// Deadline for writing one query record
    pub history_timeout: Duration,
    /// Max scoring calls in flight at once
    pub scoring_concurrency: usize,
    pub score_max_tokens: u32,
    pub answer_max_tokens: u32,
    pub temperature: f32,
    /// `None` keeps history in memory only
    pub history_database_url: Option<String>,
    pub knowledge_base_path: Option<PathBuf>,
    pub api_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            weather_api_key: None,
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
            score_timeout: Duration::from_secs(15),
            generate_timeout: Duration::from_secs(60),
            weather_timeout: Duration::from_secs(10),
            history_timeout: DEFAULT_HISTORY_TIMEOUT,
            scoring_concurrency: 4,
            score_max_tokens: 10,
            answer_max_tokens: 500,
            temperature: 0.7,
            history_database_url: Some(DEFAULT_HISTORY_DATABASE_URL.to_string()),
            knowledge_base_path: None,
            api_port: 8080,
        }
    }
}

impl AgentConfig {
    /// Load `.env` (if present) and read the environment
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let millis = |key: &str, fallback: Duration| {
            Duration::from_millis(parse_or(key, non_empty(key), fallback.as_millis() as u64))
        };

        let weather_api_key = non_empty("WEATHER_API_KEY")
            .filter(|key| key != WEATHER_KEY_PLACEHOLDER);

        let (port_key, api_port) = first_set(&["PORT", "API_PORT"], &non_empty)
            .map_or(("PORT", None), |(key, value)| (key, Some(value)));

        Self {
            ollama_base_url: non_empty("OLLAMA_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ollama_base_url),
            model_name: non_empty("OLLAMA_MODEL").unwrap_or(defaults.model_name),
            weather_api_key,
            weather_api_url: non_empty("WEATHER_API_URL").unwrap_or(defaults.weather_api_url),
            score_timeout: millis("SCORE_TIMEOUT_MS", defaults.score_timeout),
            generate_timeout: millis("GENERATE_TIMEOUT_MS", defaults.generate_timeout),
            weather_timeout: millis("WEATHER_TIMEOUT_MS", defaults.weather_timeout),
            history_timeout: millis("HISTORY_TIMEOUT_MS", defaults.history_timeout),
            scoring_concurrency: parse_or(
                "SCORING_CONCURRENCY",
                non_empty("SCORING_CONCURRENCY"),
                defaults.scoring_concurrency,
            )
            .max(1),
            score_max_tokens: parse_or(
                "SCORE_MAX_TOKENS",
                non_empty("SCORE_MAX_TOKENS"),
                defaults.score_max_tokens,
            ),
            answer_max_tokens: parse_or(
                "ANSWER_MAX_TOKENS",
                non_empty("ANSWER_MAX_TOKENS"),
                defaults.answer_max_tokens,
            ),
            temperature: parse_or("LLM_TEMPERATURE", non_empty("LLM_TEMPERATURE"), defaults.temperature),
            history_database_url: non_empty("HISTORY_DATABASE_URL")
                .or(defaults.history_database_url),
            knowledge_base_path: non_empty("KNOWLEDGE_BASE_PATH").map(PathBuf::from),
            api_port: parse_or(port_key, api_port, defaults.api_port),
        }
    }

    pub fn weather_configured(&self) -> bool {
        self.weather_api_key.is_some()
    }
}

/// First of `keys` with a value, together with the key it came from
fn first_set<F>(keys: &[&'static str], lookup: F) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|key| lookup(key).map(|value| (*key, value)))
}

/// Parse `raw` or warn and return `fallback`
fn parse_or<T>(key: &str, raw: Option<String>, fallback: T) -> T
where
    T: FromStr,
{
    let Some(raw) = raw else {
        return fallback;
    };

    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "Unparseable configuration value, using default");
            fallback
        }
    }
}
