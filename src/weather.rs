//! Weather lookups
//!
//! `WeatherApi` is the raw transport (weatherapi.com over HTTP in production).
//! `WeatherClient` adds the contract on top: no key means a fixed message and
//! no network call, and any failure means a fixed degraded message.

use crate::config::AgentConfig;
use crate::error::{with_timeout, AgentError};
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

pub const WEATHER_NOT_CONFIGURED: &str =
    "天气查询功能未启用：未配置 WEATHER_API_KEY（可从 weatherapi.com 获取免费 Key）。";

pub const WEATHER_DEGRADED: &str = "抱歉，暂时无法获取天气信息，请稍后再试。";

/// Current conditions for one location
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub location: String,
    pub condition: String,
    pub temp_c: f64,
}

/// Trait for the weather data source
#[async_trait::async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current(&self, location: &str, api_key: &str) -> Result<WeatherReport>;
}

/// weatherapi.com `current.json` client
pub struct HttpWeatherApi {
    http: OnceLock<Client>,
    url: String,
}

impl HttpWeatherApi {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: OnceLock::new(),
            url: url.into(),
        }
    }

    /// Use a caller-built HTTP client instead of the lazily built default
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        let http = OnceLock::new();
        let _ = http.set(client);
        Self {
            http,
            url: url.into(),
        }
    }

    fn http(&self) -> &Client {
        self.http.get_or_init(|| {
            Client::builder()
                .pool_idle_timeout(Duration::from_secs(60))
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default()
        })
    }
}

#[async_trait::async_trait]
impl WeatherApi for HttpWeatherApi {
    async fn current(&self, location: &str, api_key: &str) -> Result<WeatherReport> {
        // the request URL carries the key; keep it out of error text
        let response = self
            .http()
            .get(&self.url)
            .query(&[("key", api_key), ("q", location), ("aqi", "no")])
            .send()
            .await
            .map_err(|e| AgentError::from(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Unreachable(format!(
                "Weather API returned {}: {}",
                status, body
            )));
        }

        let body: CurrentResponse = response.json().await.map_err(|e| {
            AgentError::MalformedOutput(format!("Invalid weather response: {}", e.without_url()))
        })?;

        Ok(WeatherReport {
            location: body
                .location
                .map(|l| l.name)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| location.to_string()),
            condition: body.current.condition.text,
            temp_c: body.current.temp_c,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    #[serde(default)]
    location: Option<LocationBody>,
    current: CurrentBody,
}

#[derive(Debug, Deserialize)]
struct LocationBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CurrentBody {
    temp_c: f64,
    condition: ConditionBody,
}

#[derive(Debug, Deserialize)]
struct ConditionBody {
    text: String,
}

/// How a weather answer came about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherOutcome {
    Reported,
    NotConfigured,
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherAnswer {
    pub text: String,
    pub outcome: WeatherOutcome,
}

pub struct WeatherClient {
    api: Arc<dyn WeatherApi>,
    api_key: Option<String>,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(api: Arc<dyn WeatherApi>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            api,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            Arc::new(HttpWeatherApi::new(config.weather_api_url.clone())),
            config.weather_api_key.clone(),
            config.weather_timeout,
        )
    }

    /// Look up current weather; never fails
    pub async fn lookup(&self, location: &str) -> WeatherAnswer {
        let Some(api_key) = self.api_key.as_deref() else {
            info!("Weather API key not configured, skipping lookup");
            return WeatherAnswer {
                text: WEATHER_NOT_CONFIGURED.to_string(),
                outcome: WeatherOutcome::NotConfigured,
            };
        };

        match with_timeout(self.timeout, self.api.current(location, api_key)).await {
            Ok(report) => {
                info!(location = %report.location, "Weather retrieved");
                WeatherAnswer {
                    text: format!(
                        "{}当前天气：{}，气温 {}℃",
                        report.location, report.condition, report.temp_c
                    ),
                    outcome: WeatherOutcome::Reported,
                }
            }
            Err(e) => {
                warn!(location, "Weather lookup failed: {}", e);
                WeatherAnswer {
                    text: WEATHER_DEGRADED.to_string(),
                    outcome: WeatherOutcome::Degraded,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingWeatherApi;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Instant;

    #[tokio::test]
    async fn test_no_key_skips_network() {
        let api = Arc::new(CountingWeatherApi::reporting("北京", "晴", 21.0));
        let client = WeatherClient::new(api.clone(), None, Duration::from_secs(1));

        let answer = client.lookup("北京").await;

        assert_eq!(answer.text, WEATHER_NOT_CONFIGURED);
        assert_eq!(answer.outcome, WeatherOutcome::NotConfigured);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_key_counts_as_missing() {
        let api = Arc::new(CountingWeatherApi::reporting("北京", "晴", 21.0));
        let client = WeatherClient::new(api.clone(), Some("  ".into()), Duration::from_secs(1));

        assert_eq!(client.lookup("北京").await.outcome, WeatherOutcome::NotConfigured);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_report_is_formatted() {
        let api = Arc::new(CountingWeatherApi::reporting("北京", "晴", 21.5));
        let client = WeatherClient::new(api.clone(), Some("key".into()), Duration::from_secs(1));

        let answer = client.lookup("北京").await;

        assert_eq!(answer.text, "北京当前天气：晴，气温 21.5℃");
        assert_eq!(answer.outcome, WeatherOutcome::Reported);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_degrades_within_bound() {
        let api = Arc::new(CountingWeatherApi::hanging());
        let timeout = Duration::from_millis(100);
        let client = WeatherClient::new(api.clone(), Some("key".into()), timeout);

        let started = Instant::now();
        let answer = client.lookup("上海").await;
        let elapsed = started.elapsed();

        assert_eq!(answer.text, WEATHER_DEGRADED);
        assert_eq!(answer.outcome, WeatherOutcome::Degraded);
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(900), "took {:?}", elapsed);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_api_error_degrades() {
        let api = Arc::new(CountingWeatherApi::failing());
        let client = WeatherClient::new(api, Some("key".into()), Duration::from_secs(1));

        assert_eq!(client.lookup("广州").await.outcome, WeatherOutcome::Degraded);
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{}/v1/current.json", addr)
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn test_http_api_parses_current_conditions() {
        let router = Router::new().route(
            "/v1/current.json",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("key").map(String::as_str), Some("secret"));
                assert_eq!(params.get("aqi").map(String::as_str), Some("no"));
                Json(json!({
                    "location": { "name": params.get("q").cloned().unwrap_or_default() },
                    "current": { "temp_c": 18.0, "condition": { "text": "多云" } }
                }))
            }),
        );
        let url = serve(router).await;

        let api = HttpWeatherApi::with_client(url, local_client());
        let report = api.current("Beijing", "secret").await.unwrap();

        assert_eq!(report.location, "Beijing");
        assert_eq!(report.condition, "多云");
        assert_eq!(report.temp_c, 18.0);
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        // bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpWeatherApi::with_client(
            format!("http://{}/v1/current.json", addr),
            local_client(),
        );
        let error = api.current("Beijing", "SECRETKEY123").await.unwrap_err();

        assert!(matches!(error, AgentError::Unreachable(_)));
        assert!(!error.to_string().contains("SECRETKEY123"), "{}", error);
    }

    #[tokio::test]
    async fn test_malformed_body_hides_api_key() {
        let router = Router::new().route("/v1/current.json", get(|| async { "not json" }));
        let url = serve(router).await;

        let api = HttpWeatherApi::with_client(url, local_client());
        let error = api.current("Beijing", "SECRETKEY123").await.unwrap_err();

        assert!(matches!(error, AgentError::MalformedOutput(_)));
        assert!(!error.to_string().contains("SECRETKEY123"), "{}", error);
    }

    #[tokio::test]
    async fn test_http_api_error_status() {
        let router = Router::new().route(
            "/v1/current.json",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "code": 2006, "message": "API key is invalid." } })),
                )
            }),
        );
        let url = serve(router).await;

        let api = HttpWeatherApi::with_client(url, local_client());
        let result = api.current("Beijing", "bad").await;

        assert!(matches!(result, Err(AgentError::Unreachable(msg)) if msg.contains("401")));
    }
}
