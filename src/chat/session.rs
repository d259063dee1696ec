// ABOUTME: Streaming chat session - send serialization, delta delivery, terminal marker, cancellation
// ABOUTME: Transport failures degrade to an error delta plus marker; consumers never see an exception
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # Chat Session
//!
//! [`ChatSession`] owns one [`ConversationHistory`] and runs streaming sends
//! against it on background tasks. Each send yields a [`SendHandle`] whose
//! bounded channel delivers zero or more content deltas followed by exactly
//! one final item that is (or ends with) [`TERMINAL_MARKER`], after which
//! the channel closes.
//!
//! ## Backpressure
//!
//! Deltas are forwarded through a bounded channel; when it fills, the
//! network read loop stalls until the consumer catches up. This is by
//! construction: delivery is in-order and rate-matched to the consumer, and
//! downstream code may rely on that.
//!
//! ## Serialization
//!
//! Only one send may be in flight per session. A second call while one is
//! active returns [`ErrorCode::ResourceLocked`](crate::errors::ErrorCode::ResourceLocked);
//! the history is never
//! mutated by two sends concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use super::history::ConversationHistory;
use super::TERMINAL_MARKER;
use crate::errors::{AppError, AppResult};
use crate::llm::{prompts, ChatRequest, LlmProvider};

/// Default bound of the delta channel
const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Options for a chat session
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// System prompt seeded into the history; `None` for no system message
    pub system_prompt: Option<String>,
    /// Model override; provider default when `None`
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per response
    pub max_tokens: u32,
    /// Capacity of the bounded delta channel
    pub channel_capacity: usize,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            system_prompt: Some(prompts::ADVISOR_SYSTEM_PROMPT.to_owned()),
            model: None,
            temperature: 0.7,
            max_tokens: 1024,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ChatOptions {
    /// Replace the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the model override
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the response token limit
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Handle to one in-flight send
///
/// Receives content deltas in order. The final item delivered is (or ends
/// with) [`TERMINAL_MARKER`]; afterwards [`recv`](Self::recv) returns `None`.
/// Dropping the handle cancels the send.
#[derive(Debug)]
pub struct SendHandle {
    request_id: Uuid,
    deltas: mpsc::Receiver<String>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl SendHandle {
    /// Id of this send, for log correlation
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Receive the next content delta; `None` once the channel closes
    pub async fn recv(&mut self) -> Option<String> {
        self.deltas.recv().await
    }

    /// Cancel the in-flight send.
    ///
    /// Closes the underlying stream and suppresses further ordinary deltas;
    /// a final [`TERMINAL_MARKER`] is still delivered so termination stays
    /// observable.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Drain the stream to completion, returning the concatenation of all
    /// ordinary deltas (the marker item is excluded).
    pub async fn collect_text(mut self) -> String {
        let mut assembled = String::new();
        while let Some(delta) = self.recv().await {
            if delta != TERMINAL_MARKER {
                assembled.push_str(&delta);
            }
        }
        assembled
    }
}

/// A chat session: one conversation history plus the provider to stream
/// responses from
pub struct ChatSession {
    provider: Arc<dyn LlmProvider>,
    history: Arc<Mutex<ConversationHistory>>,
    options: ChatOptions,
    in_flight: Arc<AtomicBool>,
}

impl ChatSession {
    /// Create a session with the given provider and options
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, options: ChatOptions) -> Self {
        let history = options.system_prompt.as_ref().map_or_else(
            ConversationHistory::new,
            ConversationHistory::with_system,
        );

        Self {
            provider,
            history: Arc::new(Mutex::new(history)),
            options,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the conversation history
    pub async fn history_snapshot(&self) -> ConversationHistory {
        self.history.lock().await.clone()
    }

    /// Send a user message and stream the assistant's reply.
    ///
    /// Appends `user_text` to the history, issues the streaming request on a
    /// background task, and returns a [`SendHandle`] delivering the reply
    /// incrementally. On successful completion the assembled reply is
    /// appended to the history as an assistant message; on transport failure
    /// one error-content delta is delivered, followed by the marker, and
    /// nothing is appended.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ResourceLocked`](crate::errors::ErrorCode::ResourceLocked)
    /// if a send is already in flight
    /// for this session.
    pub async fn send(&self, user_text: impl Into<String>) -> AppResult<SendHandle> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::resource_locked(
                "a send is already in flight for this session",
            ));
        }

        let request_id = Uuid::new_v4();
        let messages = {
            let mut history = self.history.lock().await;
            history.push_user(user_text);
            history.messages().to_vec()
        };

        let mut request = ChatRequest::new(messages)
            .with_streaming()
            .with_temperature(self.options.temperature)
            .with_max_tokens(self.options.max_tokens);
        if let Some(ref model) = self.options.model {
            request = request.with_model(model.clone());
        }

        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let (cancel_tx, cancel_rx) = oneshot::channel();

        debug!(%request_id, "dispatching streaming send");
        tokio::spawn(run_send(
            Arc::clone(&self.provider),
            request,
            Arc::clone(&self.history),
            tx,
            cancel_rx,
            Arc::clone(&self.in_flight),
            request_id,
        ));

        Ok(SendHandle {
            request_id,
            deltas: rx,
            cancel_tx: Some(cancel_tx),
        })
    }
}

/// How one send's stream ended
enum StreamOutcome {
    /// Stream finished; payload is the assembled assistant text
    Completed(String),
    /// Transport failed; payload is the human-readable error delta
    Failed(String),
    /// Cancelled by the handle
    Cancelled,
    /// Consumer dropped the receiver mid-stream
    Abandoned,
}

/// Clears the in-flight flag on every exit path
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run_send(
    provider: Arc<dyn LlmProvider>,
    request: ChatRequest,
    history: Arc<Mutex<ConversationHistory>>,
    tx: mpsc::Sender<String>,
    cancel_rx: oneshot::Receiver<()>,
    in_flight: Arc<AtomicBool>,
    request_id: Uuid,
) {
    let guard = InFlightGuard(in_flight);
    let outcome = drive_stream(provider.as_ref(), &request, &tx, cancel_rx, request_id).await;

    match outcome {
        StreamOutcome::Completed(assembled) => {
            // History append happens before the guard is released so the
            // next send always sees the completed exchange.
            history.lock().await.push_assistant(assembled);
            drop(guard);
            let _ = tx.send(TERMINAL_MARKER.to_owned()).await;
        }
        StreamOutcome::Failed(message) => {
            warn!(%request_id, "streaming send degraded: {message}");
            drop(guard);
            let _ = tx.send(message).await;
            let _ = tx.send(TERMINAL_MARKER.to_owned()).await;
        }
        StreamOutcome::Cancelled => {
            debug!(%request_id, "streaming send cancelled");
            drop(guard);
            let _ = tx.send(TERMINAL_MARKER.to_owned()).await;
        }
        StreamOutcome::Abandoned => {
            debug!(%request_id, "send handle dropped before completion");
        }
    }
}

async fn drive_stream(
    provider: &dyn LlmProvider,
    request: &ChatRequest,
    tx: &mpsc::Sender<String>,
    mut cancel_rx: oneshot::Receiver<()>,
    request_id: Uuid,
) -> StreamOutcome {
    let mut stream = match provider.complete_stream(request).await {
        Ok(stream) => stream,
        Err(e) => return StreamOutcome::Failed(format!("Error: {e}")),
    };

    let mut assembled = String::new();
    loop {
        tokio::select! {
            biased;
            _ = &mut cancel_rx => return StreamOutcome::Cancelled,
            item = stream.next() => match item {
                Some(Ok(chunk)) => {
                    let is_final = chunk.is_final;
                    if !chunk.delta.is_empty() {
                        assembled.push_str(&chunk.delta);
                        if tx.send(chunk.delta).await.is_err() {
                            return StreamOutcome::Abandoned;
                        }
                    }
                    if is_final {
                        return StreamOutcome::Completed(assembled);
                    }
                }
                Some(Err(e)) => {
                    warn!(%request_id, "stream read failed: {e}");
                    return StreamOutcome::Failed(format!("Error: {e}"));
                }
                // Stream end without [DONE] still completes normally
                None => return StreamOutcome::Completed(assembled),
            }
        }
    }
}
