//! Farm Assistant - rule-based farming helper
//!
//! Serves a single assistant conversation over HTTP. Replies are picked by
//! keyword rules and delivered after a short simulated thinking delay, in
//! the order the questions were asked.

mod api;
mod classifier;
mod config;
mod controller;
mod conversation;
mod scheduler;

use api::{create_router, AppState};
use config::AssistantConfig;
use controller::ConversationController;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farm_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AssistantConfig::from_env();
    tracing::info!(
        port = config.port,
        reply_delay_ms = u64::try_from(config.reply_delay.as_millis()).unwrap_or(u64::MAX),
        reply_jitter_ms = u64::try_from(config.reply_jitter.as_millis()).unwrap_or(u64::MAX),
        "Configuration loaded"
    );

    // One conversation for the lifetime of the process
    let conversation = Arc::new(ConversationController::new(&config));
    let state = AppState::new(Arc::clone(&conversation));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Farm assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&conversation)))
        .await?;

    Ok(())
}

/// Wait for Ctrl-C, then close the conversation so open SSE streams end.
async fn shutdown_signal(conversation: Arc<ConversationController>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown requested");
    let dropped = conversation.shutdown().await;
    if dropped > 0 {
        tracing::warn!(dropped, "Unanswered messages discarded at shutdown");
    }
}
