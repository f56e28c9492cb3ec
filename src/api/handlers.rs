//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ChatRequest, ChatResponse, ConversationResponse, ErrorResponse};
use super::AppState;
use crate::controller::SubmissionError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Conversation retrieval
        .route("/api/conversation", get(get_conversation))
        // SSE streaming
        .route("/api/conversation/stream", get(stream_conversation))
        // User actions
        .route("/api/conversation/chat", post(send_chat))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Conversation
// ============================================================

async fn get_conversation(State(state): State<AppState>) -> Json<ConversationResponse> {
    let conversation = &state.conversation;
    Json(ConversationResponse::new(
        conversation.conversation_id().to_string(),
        conversation.snapshot(),
    ))
}

async fn stream_conversation(State(state): State<AppState>) -> impl IntoResponse {
    let conversation = &state.conversation;
    let (snapshot, broadcast_rx) = conversation.subscribe_with_snapshot();
    let init = ConversationResponse::new(conversation.conversation_id().to_string(), snapshot);

    sse_stream(init, broadcast_rx, conversation.closed())
}

async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message_id = state.conversation.submit(&req.text)?;

    Ok(Json(ChatResponse {
        queued: true,
        message_id,
    }))
}

async fn get_version() -> &'static str {
    concat!("farm-assistant ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        match &err {
            SubmissionError::EmptyInput => AppError::BadRequest(err.to_string()),
            SubmissionError::SessionClosed => AppError::Conflict(err.to_string()),
            SubmissionError::InvalidMessage(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
