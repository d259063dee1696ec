// ABOUTME: Ordered conversation log consumed by the streaming chat session
// ABOUTME: Holds at most one system message, always as the first element
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! Conversation history: the ordered list of role-tagged messages exchanged
//! with the model.

use crate::llm::{ChatMessage, MessageRole};

/// Ordered, insertion-order-significant message log for one chat session.
///
/// Invariant: the log holds at most one system message, and if present it is
/// always the first element. User and assistant messages only ever append.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history seeded with a system message
    #[must_use]
    pub fn with_system(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(content)],
        }
    }

    /// Set or replace the system message, keeping it as the first element
    pub fn set_system(&mut self, content: impl Into<String>) {
        match self.messages.first() {
            Some(first) if first.role == MessageRole::System => {
                self.messages[0] = ChatMessage::system(content);
            }
            _ => self.messages.insert(0, ChatMessage::system(content)),
        }
    }

    /// Append a user message
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Append an assistant message
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// All messages in order
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Last message, if any
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
