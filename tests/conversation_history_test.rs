// ABOUTME: Tests for the conversation history invariants
// ABOUTME: At most one system message, always first; user/assistant only append
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

#![allow(missing_docs)]

use fintel::chat::ConversationHistory;
use fintel::llm::MessageRole;

#[test]
fn test_starts_empty() {
    let history = ConversationHistory::new();
    assert!(history.is_empty());
    assert_eq!(history.len(), 0);
    assert!(history.last().is_none());
}

#[test]
fn test_system_message_is_first() {
    let mut history = ConversationHistory::with_system("be helpful");
    history.push_user("hi");
    history.push_assistant("hello");

    let messages = history.messages();
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[0].content, "be helpful");
    assert_eq!(messages[1].role, MessageRole::User);
    assert_eq!(messages[2].role, MessageRole::Assistant);
}

#[test]
fn test_set_system_replaces_existing() {
    let mut history = ConversationHistory::with_system("old prompt");
    history.push_user("hi");
    history.set_system("new prompt");

    let system_count = history
        .messages()
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .count();
    assert_eq!(system_count, 1);
    assert_eq!(history.messages()[0].content, "new prompt");
    assert_eq!(history.len(), 2);
}

#[test]
fn test_set_system_on_headless_history_inserts_first() {
    let mut history = ConversationHistory::new();
    history.push_user("hi");
    history.set_system("prompt");

    assert_eq!(history.messages()[0].role, MessageRole::System);
    assert_eq!(history.messages()[1].role, MessageRole::User);
}

#[test]
fn test_append_order_is_preserved() {
    let mut history = ConversationHistory::new();
    for i in 0..3 {
        history.push_user(format!("q{i}"));
        history.push_assistant(format!("a{i}"));
    }

    let contents: Vec<&str> = history
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["q0", "a0", "q1", "a1", "q2", "a2"]);
}
