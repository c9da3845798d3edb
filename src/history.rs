//! Message storage
//!
//! `MessageLog` is the bounded per-room history; `PrivateLog` keeps private
//! conversations keyed by the unordered pair of participant names.

use std::collections::{HashMap, VecDeque};

use crate::chat::ChatMessage;
use crate::types::MessageId;

/// Default number of messages retained per room
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Bounded FIFO buffer of room messages, oldest first
///
/// Appending past capacity silently evicts the oldest entry.
#[derive(Debug)]
pub struct MessageLog {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl MessageLog {
    /// Create an empty log holding at most `capacity` messages (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest entry when full
    ///
    /// Returns a reference to the stored message.
    pub fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        // Just pushed, never empty here.
        &self.messages[self.messages.len() - 1]
    }

    pub fn find(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn find_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Snapshot of the retained messages, oldest first
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Conversation key: the two participant names in sorted order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String, String);

impl ConversationKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}

/// Unbounded store of private conversations
#[derive(Debug, Default)]
pub struct PrivateLog {
    conversations: HashMap<ConversationKey, Vec<ChatMessage>>,
}

impl PrivateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a private message under its sender/recipient pair
    ///
    /// Messages without a recipient are not private and are ignored.
    pub fn push(&mut self, message: ChatMessage) {
        let Some(recipient) = message.recipient.as_deref() else {
            return;
        };
        let key = ConversationKey::new(&message.sender, recipient);
        self.conversations.entry(key).or_default().push(message);
    }

    /// Messages exchanged between `a` and `b`, oldest first
    pub fn conversation(&self, a: &str, b: &str) -> Vec<ChatMessage> {
        self.conversations
            .get(&ConversationKey::new(a, b))
            .cloned()
            .unwrap_or_default()
    }
}
