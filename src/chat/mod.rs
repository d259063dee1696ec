// ABOUTME: Chat module root - conversation history and the streaming send pipeline
// ABOUTME: Defines the in-band terminal marker delivered as the final content of every send
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # Chat
//!
//! [`ConversationHistory`] holds the ordered role-tagged message log;
//! [`ChatSession`] owns one history and runs streaming sends against it,
//! delivering content deltas through a bounded channel.

mod history;
mod session;

pub use history::ConversationHistory;
pub use session::{ChatOptions, ChatSession, SendHandle};

/// Sentinel content delivered as the final item of every send, signaling
/// that no more deltas will arrive.
///
/// The marker travels in-band: genuine model output containing this exact
/// substring is indistinguishable from the synthesized terminator. This is a
/// known limitation carried over deliberately; the delta channel closing
/// right after the marker is an additional, unambiguous signal consumers can
/// rely on instead.
pub const TERMINAL_MARKER: &str = "\n\n__STREAM_DONE__";
