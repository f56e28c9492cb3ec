//! Server-Sent Events support

use super::types::ConversationResponse;
use crate::controller::ConversationEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert the conversation's broadcast stream to an SSE stream.
///
/// Starts with an `init` event carrying the full conversation and ends when
/// `closed` resolves.
pub fn sse_stream(
    init: ConversationResponse,
    broadcast_rx: tokio::sync::broadcast::Receiver<ConversationEvent>,
    closed: impl Future<Output = ()> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_event(&init)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(conversation_event_to_axum(&event))),
        Err(_) => None, // Skip lagged messages
    });

    let combined = futures::StreamExt::take_until(init.chain(broadcasts), closed);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(init: &ConversationResponse) -> Event {
    let mut data = serde_json::to_value(init).unwrap_or(Value::Null);
    if let Value::Object(fields) = &mut data {
        fields.insert("type".to_string(), json!("init"));
    }
    Event::default().event("init").data(data.to_string())
}

fn conversation_event_to_axum(event: &ConversationEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

fn event_payload(event: &ConversationEvent) -> (&'static str, Value) {
    match event {
        ConversationEvent::Message { message } => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        ConversationEvent::StateChange { busy, pending } => (
            "state_change",
            json!({
                "type": "state_change",
                "busy": busy,
                "pending": pending
            }),
        ),
    }
}
