use financial_agent_orchestrator::{
    agent::FinancialAgent,
    config::AgentConfig,
    history::build_history_store,
    knowledge::build_knowledge_store,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Demo queries run when no query is given on the command line
const SAMPLE_QUERIES: &[(&str, &str)] = &[
    ("customer_001", "我是保守型投资者，该选什么理财方式？"),
    ("customer_001", "解释一下什么是复利？"),
    ("customer_002", "北京今天的天气怎么样？"),
    ("customer_002", "货币基金和债券基金有什么区别？"),
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::from_env();

    info!("Financial agent starting");

    let knowledge = build_knowledge_store(&config)?;
    let history = build_history_store(&config);
    let agent = FinancialAgent::from_config(&config, knowledge, history);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let queries: Vec<(String, String)> = if args.is_empty() {
        SAMPLE_QUERIES
            .iter()
            .map(|(user, query)| (user.to_string(), query.to_string()))
            .collect()
    } else {
        vec![("cli_user".to_string(), args.join(" "))]
    };

    for (user_id, query) in &queries {
        let response = agent.handle_query(user_id, query).await;

        println!("\n=== {} ===", user_id);
        println!("Q: {}", query);
        println!("A: {}", response.text);
        if let Some(entry_id) = &response.matched_entry_id {
            println!("(knowledge entry: {})", entry_id);
        }
    }

    agent.shutdown().await;
    Ok(())
}
