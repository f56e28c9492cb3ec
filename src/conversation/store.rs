//! Append-only conversation store

use super::{InvalidMessage, InvalidMessageKind, Message, MessageId, Sender};
use chrono::Utc;
use serde::Serialize;

/// First message of every conversation
pub const GREETING: &str = "Hello! I'm your AI farming assistant. How can I help you today?";

/// Point-in-time view of the conversation handed to readers
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub history: Vec<Message>,
    pub busy: bool,
    pub pending: usize,
}

/// Ordered message history plus the count of unanswered submissions.
///
/// Each user message opens a submission and each bot reply closes the
/// oldest open one, so `pending` always equals the number of user
/// messages still waiting for a reply.
#[derive(Debug)]
pub struct ConversationStore {
    history: Vec<Message>,
    pending: usize,
    next_id: MessageId,
}

impl ConversationStore {
    pub fn new() -> Self {
        let greeting = Message {
            id: MessageId::FIRST,
            text: GREETING.to_string(),
            sender: Sender::Bot,
            timestamp: Utc::now(),
        };
        Self {
            history: vec![greeting],
            pending: 0,
            next_id: MessageId::FIRST.next(),
        }
    }

    /// Append a message and update the pending count in one step.
    pub fn append(
        &mut self,
        sender: Sender,
        text: impl Into<String>,
    ) -> Result<Message, InvalidMessage> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(InvalidMessage::new(sender, InvalidMessageKind::EmptyText));
        }

        match sender {
            Sender::User => {
                let last_is_user = self.history.last().map(|m| m.sender) == Some(Sender::User);
                if last_is_user && self.pending == 0 {
                    return Err(InvalidMessage::new(
                        sender,
                        InvalidMessageKind::ConsecutiveUser,
                    ));
                }
            }
            Sender::Bot => {
                if self.pending == 0 {
                    return Err(InvalidMessage::new(
                        sender,
                        InvalidMessageKind::UnsolicitedReply,
                    ));
                }
            }
        }

        // Wall clock may step backwards; history timestamps must not
        let now = Utc::now();
        let timestamp = self
            .history
            .last()
            .map_or(now, |last| last.timestamp.max(now));

        let message = Message {
            id: self.next_id,
            text,
            sender,
            timestamp,
        };
        self.next_id = self.next_id.next();
        self.history.push(message.clone());

        match sender {
            Sender::User => self.pending += 1,
            Sender::Bot => self.pending -= 1,
        }

        Ok(message)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            history: self.history.clone(),
            busy: self.is_busy(),
            pending: self.pending,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.pending > 0
    }

    #[allow(dead_code)] // API completeness
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Forget every open submission without appending replies.
    ///
    /// Used at teardown; returns how many submissions were dropped.
    pub fn discard_pending(&mut self) -> usize {
        std::mem::take(&mut self.pending)
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
