// ABOUTME: Line-buffering SSE parser for streaming chat-completions responses
// ABOUTME: Handles partial lines across TCP boundaries, multiple frames per chunk, and retry policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # SSE Stream Parser
//!
//! The wire protocol is newline-delimited: content frames are
//! `"data: " + <json>`, stream end is the literal frame `"data: [DONE]"`.
//! TCP gives no alignment between network chunks and frame boundaries, so a
//! line buffer accumulates partial data until a complete line arrives, and a
//! single chunk may carry several complete frames.
//!
//! Frame-level recovery is supplied by the caller: [`sse_chunk_stream`]
//! takes a `parse_frame` closure that turns one raw frame into an optional
//! [`StreamChunk`]. Returning `None` skips the frame; a frame is never
//! allowed to abort the remaining read loop.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// One parsed frame of the wire protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` termination frame
    Done,
}

/// Line buffer that reassembles SSE frames across TCP chunk boundaries
///
/// Complete lines (terminated by `\n`) are extracted and parsed as frames;
/// any trailing partial line stays buffered for the next [`feed`](Self::feed).
#[derive(Debug, Default)]
pub struct SseFrameBuffer {
    buffer: String,
}

impl SseFrameBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a TCP chunk, returning any complete frames
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim_end_matches('\r').to_owned();
            self.buffer.drain(..=newline);

            if let Some(frame) = Self::frame_from_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush any remaining partial line as a final frame
    ///
    /// Called when the byte stream ends without a trailing newline.
    pub fn flush(&mut self) -> Option<SseFrame> {
        let remaining = mem::take(&mut self.buffer);
        Self::frame_from_line(&remaining)
    }

    /// Parse one complete line into a frame.
    ///
    /// Empty lines (frame separators) and non-data SSE fields (`event:`,
    /// `id:`, `retry:`, comments) yield `None`.
    fn frame_from_line(line: &str) -> Option<SseFrame> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == "data: [DONE]" {
            return Some(SseFrame::Done);
        }
        let data = trimmed.strip_prefix("data: ")?;
        if data.trim().is_empty() {
            return None;
        }
        Some(SseFrame::Data(data.to_owned()))
    }
}

/// Wrap a raw byte stream into a [`ChatStream`] of parsed chunks
///
/// `parse_frame` converts one raw frame payload into an optional chunk;
/// `None` skips the frame. The `[DONE]` frame is handled here and always
/// yields [`StreamChunk::terminal`], independent of `parse_frame`.
///
/// `service` names the upstream in read-error messages.
pub fn sse_chunk_stream<S, F>(byte_stream: S, parse_frame: F, service: &'static str) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = StreamState {
        framer: SseFrameBuffer::new(),
        pending: VecDeque::new(),
        ended: false,
    };

    // unfold keeps the framer alive across async iterations; each turn either
    // drains a pending chunk or reads the next TCP chunk.
    let stream = unfold(
        (
            Box::pin(byte_stream)
                as Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
            state,
            parse_frame,
        ),
        move |(mut bytes, mut state, parse_frame)| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, (bytes, state, parse_frame)));
                }
                if state.ended {
                    return None;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.framer.feed(&chunk) {
                            state.enqueue(frame, &parse_frame);
                        }
                    }
                    Some(Err(e)) => {
                        state.ended = true;
                        let err = AppError::external_service(
                            service,
                            format!("stream read error: {e}"),
                        );
                        return Some((Err(err), (bytes, state, parse_frame)));
                    }
                    None => {
                        state.ended = true;
                        if let Some(frame) = state.framer.flush() {
                            state.enqueue(frame, &parse_frame);
                        }
                        if let Some(item) = state.pending.pop_front() {
                            return Some((item, (bytes, state, parse_frame)));
                        }
                        return None;
                    }
                }
            }
        },
    );

    // Drop empty deltas unless terminal
    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}

struct StreamState {
    framer: SseFrameBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    ended: bool,
}

impl StreamState {
    fn enqueue<F>(&mut self, frame: SseFrame, parse_frame: &F)
    where
        F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
    {
        match frame {
            SseFrame::Data(raw) => {
                if let Some(result) = parse_frame(&raw) {
                    self.pending.push_back(result);
                }
            }
            SseFrame::Done => self.pending.push_back(Ok(StreamChunk::terminal())),
        }
    }
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Retry configuration for the initial streaming HTTP request
///
/// Retries only cover request establishment. Once bytes start flowing the
/// stream is not retried; the consumer may have already observed partial
/// output.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Initial delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,
    /// Maximum delay cap for exponential backoff (milliseconds)
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Default retry config: 3 retries, 500ms initial, 5s cap
    #[must_use]
    pub const fn default_config() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }

    /// Exponential backoff delay with jitter for a given attempt
    ///
    /// `delay = min(initial_ms * 2^attempt, max_ms) + jitter(0..100ms)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms.saturating_mul(1_u64 << attempt);
        let capped = base.min(self.max_delay_ms);
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::from(d.subsec_millis()))
            % 100;
        Duration::from_millis(capped + jitter)
    }
}

/// Check if an HTTP status code is a transient, retryable condition
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503)
}

/// Check if a request error is retryable (connection/timeout errors)
#[must_use]
pub fn is_retryable_request_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}
