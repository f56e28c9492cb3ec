//! Conversation history and busy tracking
//!
//! The store is the only mutable state of the assistant. Readers get a
//! point-in-time [`Snapshot`]; writers go through [`ConversationStore::append`].

mod error;
mod message;
mod store;

#[cfg(test)]
mod proptests;

pub use error::{InvalidMessage, InvalidMessageKind};
pub use message::{Message, MessageId, Sender};
pub use store::{ConversationStore, Snapshot, GREETING};
