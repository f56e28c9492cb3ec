//! HTTP API for the farm assistant
//!
//! The UI-facing edge of the conversation: read the history, submit a
//! message, and stream changes over SSE.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::controller::ConversationController;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub conversation: Arc<ConversationController>,
}

impl AppState {
    pub fn new(conversation: Arc<ConversationController>) -> Self {
        Self { conversation }
    }
}
