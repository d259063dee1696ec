// ABOUTME: Integration tests for the streaming chat session against scripted providers
// ABOUTME: Covers delta delivery, terminal marker, history append, failure degradation, guard, and cancel
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

#![allow(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fintel::chat::{ChatOptions, ChatSession, TERMINAL_MARKER};
use fintel::errors::{AppError, ErrorCode};
use fintel::llm::sse_parser::sse_chunk_stream;
use fintel::llm::{
    parse_stream_frame, ChatRequest, ChatResponse, ChatStream, LlmProvider, MessageRole,
};
use futures_util::stream;

/// Provider that replays canned wire frames through the production SSE path
struct ScriptedProvider {
    frames: Vec<Vec<u8>>,
}

impl ScriptedProvider {
    fn new(frames: Vec<Vec<u8>>) -> Self {
        Self { frames }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        Err(AppError::internal("complete not scripted"))
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        let byte_stream = stream::iter(
            self.frames
                .clone()
                .into_iter()
                .map(|b| Ok::<Bytes, reqwest::Error>(Bytes::from(b))),
        );
        Ok(sse_chunk_stream(byte_stream, parse_stream_frame, "Test"))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

/// Provider whose streaming request always fails at establishment
struct UnreachableProvider;

#[async_trait]
impl LlmProvider for UnreachableProvider {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        Err(AppError::new(
            ErrorCode::ExternalServiceUnavailable,
            "cannot connect",
        ))
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        Err(AppError::new(
            ErrorCode::ExternalServiceUnavailable,
            "cannot connect",
        ))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(false)
    }
}

/// Provider whose stream never yields, for in-flight and cancel tests
struct StallingProvider;

#[async_trait]
impl LlmProvider for StallingProvider {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        Err(AppError::internal("complete not scripted"))
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        let stalled: ChatStream = Box::pin(stream::pending());
        Ok(stalled)
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

fn delta_frame(content: &str) -> Vec<u8> {
    format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}}}}]}}\n\n").into_bytes()
}

fn done_frame() -> Vec<u8> {
    b"data: [DONE]\n\n".to_vec()
}

async fn drain(handle: &mut fintel::chat::SendHandle) -> Vec<String> {
    let mut items = Vec::new();
    while let Some(delta) = handle.recv().await {
        items.push(delta);
    }
    items
}

#[tokio::test]
async fn test_single_delta_then_marker_and_history_append() {
    // One content frame, then DONE: the delivered sequence is exactly the
    // delta followed by the terminal marker, and the assistant entry equals
    // the delta
    let provider = Arc::new(ScriptedProvider::new(vec![
        delta_frame("Save more."),
        done_frame(),
    ]));
    let session = ChatSession::new(provider, ChatOptions::default());

    let mut handle = session.send("Any advice?").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );
    let items = drain(&mut handle).await;

    assert_eq!(items, vec!["Save more.".to_owned(), TERMINAL_MARKER.to_owned()]);

    let history = session.history_snapshot().await;
    let messages = history.messages();
    assert_eq!(messages.len(), 3, "system + user + assistant");
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[1].role, MessageRole::User);
    assert_eq!(messages[1].content, "Any advice?");
    assert_eq!(messages[2].role, MessageRole::Assistant);
    assert_eq!(messages[2].content, "Save more.");
}

#[tokio::test]
async fn test_multi_delta_concatenation() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        delta_frame("Reduce "),
        delta_frame("dining "),
        delta_frame("out."),
        done_frame(),
    ]));
    let session = ChatSession::new(provider, ChatOptions::default());

    let handle = session.send("ideas?").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );
    let text = handle.collect_text().await;

    assert_eq!(text, "Reduce dining out.");

    let history = session.history_snapshot().await;
    assert_eq!(
        history.last().map(|m| m.content.clone()),
        Some("Reduce dining out.".to_owned())
    );
}

#[tokio::test]
async fn test_stream_end_without_done_still_delivers_marker() {
    let provider = Arc::new(ScriptedProvider::new(vec![delta_frame("partial answer")]));
    let session = ChatSession::new(provider, ChatOptions::default());

    let mut handle = session.send("hello").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );
    let items = drain(&mut handle).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], "partial answer");
    assert_eq!(items[1], TERMINAL_MARKER);
}

#[tokio::test]
async fn test_transport_failure_degrades_to_error_delta_and_marker() {
    let session = ChatSession::new(Arc::new(UnreachableProvider), ChatOptions::default());

    let mut handle = session.send("hello").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );
    let items = drain(&mut handle).await;

    assert_eq!(items.len(), 2, "error delta plus marker: {items:?}");
    assert!(items[0].starts_with("Error:"), "human-readable error: {}", items[0]);
    assert_eq!(items[1], TERMINAL_MARKER);

    // Nothing appended on failure; the user message stays last
    let history = session.history_snapshot().await;
    assert_eq!(history.last().map(|m| m.role), Some(MessageRole::User));
}

#[tokio::test]
async fn test_second_send_while_in_flight_is_rejected() {
    let session = ChatSession::new(Arc::new(StallingProvider), ChatOptions::default());

    let mut first = session.send("one").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );

    let second = session.send("two").await;
    assert!(
        second.as_ref().is_err_and(|e| e.code == ErrorCode::ResourceLocked),
        "expected ResourceLocked, got {second:?}"
    );

    // Cancelling the first send frees the session for the next one
    first.cancel();
    let items = drain(&mut first).await;
    assert_eq!(items, vec![TERMINAL_MARKER.to_owned()]);

    let third = session.send("three").await;
    assert!(third.is_ok(), "session stays usable after cancel");
}

#[tokio::test]
async fn test_cancel_suppresses_deltas_but_delivers_marker() {
    let session = ChatSession::new(Arc::new(StallingProvider), ChatOptions::default());

    let mut handle = session.send("hello").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );
    handle.cancel();

    let items = drain(&mut handle).await;
    assert_eq!(items, vec![TERMINAL_MARKER.to_owned()]);

    // A cancelled send appends no assistant message
    let history = session.history_snapshot().await;
    assert_eq!(history.last().map(|m| m.role), Some(MessageRole::User));
}

#[tokio::test]
async fn test_salvaged_frame_flows_through_session() {
    // A malformed frame between well-formed ones is delivered as literal
    // content and does not abort the stream
    let provider = Arc::new(ScriptedProvider::new(vec![
        delta_frame("first "),
        b"data: not json at all\n\n".to_vec(),
        delta_frame(" last"),
        done_frame(),
    ]));
    let session = ChatSession::new(provider, ChatOptions::default());

    let handle = session.send("hello").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );
    let text = handle.collect_text().await;

    assert_eq!(text, "first not json at all last");
}

#[tokio::test]
async fn test_session_without_system_prompt() {
    let provider = Arc::new(ScriptedProvider::new(vec![delta_frame("ok"), done_frame()]));
    let options = ChatOptions {
        system_prompt: None,
        ..ChatOptions::default()
    };
    let session = ChatSession::new(provider, options);

    let handle = session.send("hi").await.map_or_else(
        |e| panic!("send failed: {e}"),
        |h| h,
    );
    let _ = handle.collect_text().await;

    let history = session.history_snapshot().await;
    assert_eq!(history.messages()[0].role, MessageRole::User);
}

#[tokio::test]
async fn test_sequential_sends_share_history() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        delta_frame("answer"),
        done_frame(),
    ]));
    let session = ChatSession::new(provider, ChatOptions::default());

    for _ in 0..2 {
        let handle = session.send("question").await.map_or_else(
            |e| panic!("send failed: {e}"),
            |h| h,
        );
        let _ = handle.collect_text().await;
    }

    let history = session.history_snapshot().await;
    // system + 2 * (user + assistant)
    assert_eq!(history.len(), 5);
}
