use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use super::rate_limit::{FixedWindowLimiter, RateDecision};
use crate::core::error::GraphRagError;
use crate::llm::providers::ChatTurn;
use crate::retrieval::orchestrator::RetrievalOrchestrator;

/// Shared state for the HTTP surface. Everything inside is `Arc`'d and
/// safe for concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RetrievalOrchestrator>,
    pub limiter: Arc<FixedWindowLimiter>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    components: [&'static str; 4],
    timestamp: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn rate_limit_headers(decision: &RateDecision) -> [(&'static str, String); 3] {
    [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_in.as_secs().to_string()),
    ]
}

pub async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let caller = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("anonymous");

    let decision = state.limiter.check(caller);
    if !decision.allowed {
        warn!("Rate limit exceeded for caller {}", caller);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            rate_limit_headers(&decision),
            Json(ErrorBody {
                error: "Too many requests".to_string(),
            }),
        )
            .into_response();
    }

    let Some(query) = request.messages.last().map(|m| m.content.clone()) else {
        return error_response(StatusCode::BAD_REQUEST, "messages are required");
    };

    let history: Vec<ChatTurn> = request
        .messages
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role,
            content: m.content,
        })
        .collect();

    match state.orchestrator.answer(&query, &history).await {
        Ok(answer) => (
            StatusCode::OK,
            rate_limit_headers(&decision),
            Json(ChatResponse {
                id: Uuid::new_v4().to_string(),
                role: "assistant".to_string(),
                content: answer.content,
            }),
        )
            .into_response(),
        Err(GraphRagError::InvalidInput(message)) => {
            error_response(StatusCode::BAD_REQUEST, &message)
        }
        Err(e) => {
            // Internal detail stays in the log.
            error!("Chat request failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred processing your request",
            )
        }
    }
}

pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        components: ["embeddings", "vector-index", "graph-store", "completion"],
        timestamp: Utc::now().to_rfc3339(),
    })
}
