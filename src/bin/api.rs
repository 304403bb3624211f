use financial_agent_orchestrator::{
    agent::FinancialAgent,
    api::start_server,
    config::AgentConfig,
    history::build_history_store,
    knowledge::build_knowledge_store,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    let config = AgentConfig::from_env();

    if !config.weather_configured() {
        warn!("WEATHER_API_KEY not set, weather queries will get a notice instead of a forecast");
    }

    info!("Financial Agent - API Server");
    info!("Port: {}", config.api_port);
    info!("Model: {} at {}", config.model_name, config.ollama_base_url);

    let knowledge = build_knowledge_store(&config)?;
    let history = build_history_store(&config);
    let agent = Arc::new(FinancialAgent::from_config(&config, knowledge, history));

    info!("Agent initialized, starting API server");

    start_server(agent, config.api_port).await?;

    Ok(())
}
