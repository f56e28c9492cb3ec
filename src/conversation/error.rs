//! Store contract violations

use super::Sender;
use thiserror::Error;

/// A message the store refused to append.
///
/// Never caused by user input: the controller validates text before it
/// reaches the store, so any of these means the controller is broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {sender} message: {kind}")]
pub struct InvalidMessage {
    pub sender: Sender,
    pub kind: InvalidMessageKind,
}

impl InvalidMessage {
    pub fn new(sender: Sender, kind: InvalidMessageKind) -> Self {
        Self { sender, kind }
    }
}

/// Why a message was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidMessageKind {
    /// Text is empty after trimming
    #[error("text is empty")]
    EmptyText,
    /// User message directly after a user message whose reply was discarded
    #[error("previous user message has no open submission")]
    ConsecutiveUser,
    /// Bot reply with no submission waiting for it
    #[error("no submission is waiting for a reply")]
    UnsolicitedReply,
}
