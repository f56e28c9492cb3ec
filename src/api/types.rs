//! API request and response types

use crate::conversation::{MessageId, Snapshot};
use serde::{Deserialize, Serialize};

/// Starter questions offered while the conversation holds only the greeting
pub const QUICK_SUGGESTIONS: &[&str] = &[
    "How often should I water tomatoes?",
    "Best time to plant lettuce?",
    "Organic pest control methods",
    "Soil pH for vegetables",
];

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Response for chat action
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub queued: bool,
    pub message_id: MessageId,
}

/// Response with the conversation history
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub suggestions: Vec<&'static str>,
}

impl ConversationResponse {
    pub fn new(conversation_id: String, snapshot: Snapshot) -> Self {
        let suggestions = if snapshot.history.len() == 1 {
            QUICK_SUGGESTIONS.to_vec()
        } else {
            Vec::new()
        };
        Self {
            conversation_id,
            snapshot,
            suggestions,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
