//! Test doubles shared by the module tests

use crate::error::AgentError;
use crate::history::HistoryStore;
use crate::llm::{CompletionOptions, LlmClient};
use crate::models::QueryRecord;
use crate::weather::{WeatherApi, WeatherReport};
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted reply of the stub LLM
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Answer after a delay
    Delayed(Duration, String),
    /// Return the prompt itself
    Echo,
    /// Never answer (until cancelled)
    Hang,
    Unreachable,
    Panic,
}

/// Stub LLM: the first rule whose pattern occurs in the prompt decides the
/// reply; otherwise the default reply is used
pub struct ScriptedLlm {
    rules: Vec<(String, Reply)>,
    default: Reply,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(default: Reply) -> Self {
        Self {
            rules: Vec::new(),
            default,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn on(mut self, pattern: &str, reply: Reply) -> Self {
        self.rules.push((pattern.to_string(), reply));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, prompt: &str) -> Reply {
        self.rules
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Decrements the in-flight counter even when the call is cancelled
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        // yield so concurrently polled calls overlap
        tokio::task::yield_now().await;

        match self.reply_for(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Echo => Ok(prompt.to_string()),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Ok(String::new())
            }
            Reply::Unreachable => Err(AgentError::Unreachable("connection refused".into())),
            Reply::Panic => panic!("scripted LLM panic"),
        }
    }
}

/// Weather transport that counts calls
pub struct CountingWeatherApi {
    behaviour: WeatherBehaviour,
    calls: AtomicUsize,
}

enum WeatherBehaviour {
    Report(WeatherReport),
    Hang,
    Fail,
}

impl CountingWeatherApi {
    pub fn reporting(location: &str, condition: &str, temp_c: f64) -> Self {
        Self::with(WeatherBehaviour::Report(WeatherReport {
            location: location.to_string(),
            condition: condition.to_string(),
            temp_c,
        }))
    }

    pub fn hanging() -> Self {
        Self::with(WeatherBehaviour::Hang)
    }

    pub fn failing() -> Self {
        Self::with(WeatherBehaviour::Fail)
    }

    fn with(behaviour: WeatherBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WeatherApi for CountingWeatherApi {
    async fn current(&self, _location: &str, _api_key: &str) -> Result<WeatherReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behaviour {
            WeatherBehaviour::Report(report) => Ok(report.clone()),
            WeatherBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(AgentError::Timeout(Duration::from_secs(30)))
            }
            WeatherBehaviour::Fail => Err(AgentError::Unreachable("503 Service Unavailable".into())),
        }
    }
}

/// History store whose writes always fail
pub struct FailingHistoryStore {
    pub attempts: AtomicUsize,
}

impl FailingHistoryStore {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for FailingHistoryStore {
    async fn append(&self, _record: QueryRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AgentError::PersistenceFailure("disk I/O error".into()))
    }

    async fn last_query(&self, _user_id: &str) -> Result<Option<String>> {
        Err(AgentError::PersistenceFailure("disk I/O error".into()))
    }

    async fn recent(&self, _user_id: &str, _limit: usize) -> Result<Vec<QueryRecord>> {
        Err(AgentError::PersistenceFailure("disk I/O error".into()))
    }
}

/// History store whose writes never complete
pub struct HangingHistoryStore {
    pub attempts: AtomicUsize,
}

impl HangingHistoryStore {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for HangingHistoryStore {
    async fn append(&self, _record: QueryRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn last_query(&self, _user_id: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn recent(&self, _user_id: &str, _limit: usize) -> Result<Vec<QueryRecord>> {
        Ok(Vec::new())
    }
}
