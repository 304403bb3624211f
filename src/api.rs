//! REST API Server for the Financial Agent
//!
//! Exposes query handling, query history and knowledge appends over HTTP

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::agent::FinancialAgent;
use crate::error::AgentError;
use crate::models::KnowledgeEntry;

/// Used when a query request carries no user id
pub const ANONYMOUS_USER: &str = "anonymous";

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 100;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryRequest {
    pub user_id: Option<String>,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeRequest {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<FinancialAgent>,
}

fn error_status(error: &AgentError) -> StatusCode {
    match error {
        AgentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AgentError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: AgentError) -> (StatusCode, Json<ApiResponse>) {
    warn!("API request failed: {}", error);
    (error_status(&error), Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "knowledge_entries": state.agent.knowledge().len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Query Endpoint
/// =============================

async fn handle_query(
    State(state): State<ApiState>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = req
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(ANONYMOUS_USER);

    info!(user_id, "Received query request");

    let response = state.agent.handle_query(user_id, &req.query).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "user_id": user_id,
            "answer": response.text,
            "matched_entry_id": response.matched_entry_id,
        }))),
    )
}

/// =============================
/// History Endpoints
/// =============================

async fn recent_history(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> (StatusCode, Json<ApiResponse>) {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    match state.agent.history().recent(&user_id, limit).await {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::success(records))),
        Err(e) => failure(e),
    }
}

async fn last_query(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.agent.history().last_query(&user_id).await {
        Ok(Some(query)) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "user_id": user_id,
                "last_query": query,
            }))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("No queries recorded for {}", user_id))),
        ),
        Err(e) => failure(e),
    }
}

/// =============================
/// Knowledge Endpoint
/// =============================

async fn append_knowledge(
    State(state): State<ApiState>,
    Json(req): Json<KnowledgeRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let entry = KnowledgeEntry {
        id: req.id,
        text: req.text,
        tags: req.tags,
    };
    let entry_id = entry.id.clone();

    match state.agent.knowledge().append(entry).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(serde_json::json!({
                "id": entry_id,
                "total_entries": state.agent.knowledge().len().await,
            }))),
        ),
        Err(e) => failure(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<FinancialAgent>) -> Router {
    let state = ApiState { agent };

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(handle_query))
        .route("/api/history/:user_id", get(recent_history))
        .route("/api/history/:user_id/last", get(last_query))
        .route("/api/knowledge", post(append_knowledge))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<FinancialAgent>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
