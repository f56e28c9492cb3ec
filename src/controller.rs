//! Conversation controller
//!
//! Owns the store and the scheduler for one conversation. `submit` appends
//! the user message synchronously and queues the reply; the scheduler's
//! delivery task appends bot replies as they come due.
//!
//! Submission lifecycle: Submitted -> Classifying -> Scheduled -> Delivered.

use crate::classifier::FARMING;
use crate::config::AssistantConfig;
use crate::conversation::{ConversationStore, InvalidMessage, Message, MessageId, Sender, Snapshot};
use crate::scheduler::{DelayPolicy, ResponseScheduler, ScheduledReply};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a submission was not accepted
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("Conversation has been closed")]
    SessionClosed,
    #[error(transparent)]
    InvalidMessage(#[from] InvalidMessage),
}

/// Change notifications, published in the same order as the store mutations
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    Message { message: Message },
    StateChange { busy: bool, pending: usize },
}

/// State shared between the controller and the delivery task
struct Shared {
    conversation_id: Uuid,
    store: Mutex<ConversationStore>,
    events: broadcast::Sender<ConversationEvent>,
    pending: watch::Sender<usize>,
    cancel: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ConversationStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append under the held lock and publish the change.
    fn append(
        &self,
        store: &mut ConversationStore,
        sender: Sender,
        text: &str,
    ) -> Result<Message, InvalidMessage> {
        let message = store.append(sender, text)?;
        self.publish_message(&message);
        self.publish_state(store);
        Ok(message)
    }

    fn publish_message(&self, message: &Message) {
        // No subscribers is fine
        let _ = self.events.send(ConversationEvent::Message {
            message: message.clone(),
        });
    }

    fn publish_state(&self, store: &ConversationStore) {
        let pending = store.pending();
        self.pending.send_replace(pending);
        let _ = self.events.send(ConversationEvent::StateChange {
            busy: store.is_busy(),
            pending,
        });
    }

    fn deliver(&self, reply: &ScheduledReply) {
        let mut store = self.lock();
        // Teardown may have raced the delivery task to the lock
        if self.cancel.is_cancelled() {
            tracing::debug!(seq = reply.seq, "Dropping reply for closed conversation");
            return;
        }

        match self.append(&mut store, Sender::Bot, reply.text) {
            Ok(message) => tracing::info!(
                conv_id = %self.conversation_id,
                seq = reply.seq,
                message_id = %message.id,
                intent = reply.intent.as_str(),
                pending = store.pending(),
                "Reply delivered"
            ),
            Err(e) => contract_violation(&e),
        }
    }
}

fn contract_violation(error: &InvalidMessage) {
    tracing::error!(error = %error, "Conversation store rejected a message");
    if cfg!(debug_assertions) {
        panic!("conversation store contract violated: {error}");
    }
}

/// The single conversation of a session
pub struct ConversationController {
    shared: Arc<Shared>,
    scheduler: ResponseScheduler,
}

impl ConversationController {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &AssistantConfig) -> Self {
        Self::with_delay_policy(config.delay_policy())
    }

    pub fn with_delay_policy(delay: Arc<dyn DelayPolicy>) -> Self {
        let (events, _) = broadcast::channel(128);
        let (pending, _) = watch::channel(0);
        let cancel = CancellationToken::new();

        let shared = Arc::new(Shared {
            conversation_id: Uuid::new_v4(),
            store: Mutex::new(ConversationStore::new()),
            events,
            pending,
            cancel: cancel.clone(),
        });

        let scheduler = {
            let shared = Arc::clone(&shared);
            ResponseScheduler::start(&FARMING, delay, cancel, move |reply| shared.deliver(&reply))
        };

        tracing::info!(conv_id = %shared.conversation_id, "Conversation started");
        Self { shared, scheduler }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.shared.conversation_id
    }

    /// Accept user text. Returns once the user message is in the history;
    /// the reply follows asynchronously.
    pub fn submit(&self, raw_text: &str) -> Result<MessageId, SubmissionError> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(SubmissionError::EmptyInput);
        }

        // Held across append and enqueue so queue order matches history order
        let mut store = self.shared.lock();
        if self.scheduler.is_closed() {
            return Err(SubmissionError::SessionClosed);
        }

        let message = self
            .shared
            .append(&mut store, Sender::User, text)
            .map_err(|e| {
                contract_violation(&e);
                e
            })?;

        let seq = match self.scheduler.enqueue(text) {
            Ok(seq) => seq,
            Err(e) => {
                // Nothing will answer the open submissions now
                let dropped = store.discard_pending();
                self.shared.publish_state(&store);
                tracing::error!(error = %e, dropped, "Reply delivery stopped unexpectedly");
                return Err(SubmissionError::SessionClosed);
            }
        };

        tracing::info!(
            conv_id = %self.shared.conversation_id,
            seq,
            message_id = %message.id,
            pending = store.pending(),
            "Message submitted"
        );
        Ok(message.id)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.lock().snapshot()
    }

    #[allow(dead_code)] // API completeness
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot plus a receiver positioned right after it, so a client
    /// sees every later change exactly once.
    pub fn subscribe_with_snapshot(&self) -> (Snapshot, broadcast::Receiver<ConversationEvent>) {
        let store = self.shared.lock();
        (store.snapshot(), self.shared.events.subscribe())
    }

    /// Resolve once every submitted message has been answered (or discarded).
    #[allow(dead_code)] // Used by tests
    pub async fn wait_idle(&self) {
        let mut pending = self.shared.pending.subscribe();
        // Sender lives in `shared`, which outlives this borrow
        let _ = pending.wait_for(|count| *count == 0).await;
    }

    /// Resolves when the conversation is torn down.
    pub fn closed(&self) -> tokio_util::sync::WaitForCancellationFutureOwned {
        self.shared.cancel.clone().cancelled_owned()
    }

    /// Tear the conversation down. Replies not yet delivered are dropped;
    /// history is left as it is. Returns the number of dropped replies.
    pub async fn shutdown(&self) -> usize {
        let dropped = {
            let mut store = self.shared.lock();
            self.scheduler.close();
            let dropped = store.discard_pending();
            if dropped > 0 {
                self.shared.publish_state(&store);
            }
            dropped
        };

        self.scheduler.shutdown().await;
        tracing::info!(conv_id = %self.shared.conversation_id, dropped, "Conversation closed");
        dropped
    }
}
