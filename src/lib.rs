// ABOUTME: Crate root for the Fintel advisor core library
// ABOUTME: Wires together the LLM transport, chat sessions, insight extraction, and categorization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # Fintel Advisor Core
//!
//! The AI subsystem of the Fintel budget application: a streaming
//! chat-completions client with incremental delta delivery, a
//! natural-language insight extractor, and a transaction categorization
//! service with strict output validation and deterministic fallback.
//!
//! ## Modules
//!
//! - [`llm`]: provider abstraction, wire types, and the SSE stream parser
//! - [`chat`]: conversation history and the streaming chat session
//! - [`insights`]: bullet-list extraction from assembled assistant text
//! - [`categorization`]: single and batch transaction categorization
//! - [`models`]: the closed category enumeration and transaction carrier
//! - [`config`], [`logging`], [`errors`]: environment configuration,
//!   structured logging, and the unified error type
//!
//! ## Failure degradation
//!
//! Nothing in this crate exposes a fatal condition to its callers: streaming
//! sends always terminate with an observable marker, and categorization
//! always yields a category, degrading to `Other` when the remote service is
//! unreachable or unvalidatable.

/// Transaction categorization with validation and deterministic fallback
pub mod categorization;
/// Conversation history and streaming chat sessions
pub mod chat;
/// Environment-driven configuration
pub mod config;
/// Unified error handling
pub mod errors;
/// Insight extraction from assistant responses
pub mod insights;
/// LLM provider abstraction and wire protocol handling
pub mod llm;
/// Structured logging setup
pub mod logging;
/// Core domain types
pub mod models;

pub use categorization::{BatchCategorizer, CategoryValidator, TransactionCategorizer};
pub use chat::{ChatOptions, ChatSession, ConversationHistory, SendHandle, TERMINAL_MARKER};
pub use config::LlmConfig;
pub use errors::{AppError, AppResult, ErrorCode};
pub use llm::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, LlmProvider, MessageRole,
    OpenAiCompatibleProvider, StreamChunk,
};
pub use models::{Category, Transaction};
