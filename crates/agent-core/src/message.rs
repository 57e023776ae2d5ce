//! Conversation Messages
//!
//! Role-tagged messages and the transcript shown to the user and replayed
//! to the agent for context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model (never shown in the transcript)
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Additional message metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Model that generated this (for assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Number of tool calls the agent made to produce this reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<usize>,

    /// Marks the canned reply recorded after a failed turn
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token is a rough estimate
        u32::try_from(self.content.len() / 4).unwrap_or(u32::MAX).saturating_add(4) // +4 for role overhead
    }
}

/// Ordered, role-tagged chat history for one UI session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript holding a single assistant greeting
    pub fn seeded(seed: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Message::assistant(seed));
        transcript
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop everything and start again from a single assistant message
    pub fn reset(&mut self, seed: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::assistant(seed));
    }

    /// Replace the content of the only message, if there is exactly one
    pub(crate) fn replace_single(&mut self, content: impl Into<String>) {
        if let [only] = self.messages.as_mut_slice() {
            *only = Message::new(only.role, content);
        }
    }

    /// Estimate total tokens in the transcript
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Newest messages whose estimated size fits in `max_tokens`.
    pub fn window(&self, max_tokens: u32) -> &[Message] {
        newest_within(&self.messages, max_tokens)
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Longest suffix of `messages` whose estimated size fits in `max_tokens`.
///
/// The last message is always included, even if it alone is over budget.
pub fn newest_within(messages: &[Message], max_tokens: u32) -> &[Message] {
    let mut used = 0u32;
    let mut start = messages.len();
    for (idx, message) in messages.iter().enumerate().rev() {
        used = used.saturating_add(message.estimate_tokens());
        if used > max_tokens && start < messages.len() {
            break;
        }
        start = idx;
    }
    &messages[start..]
}
