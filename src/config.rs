// ABOUTME: Environment-driven configuration for the LLM transport
// ABOUTME: Endpoint, credentials, model selection, and per-request timeouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # LLM Configuration
//!
//! Environment-only configuration for the chat-completions endpoint.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `FINTEL_LLM_BASE_URL` | `https://api.openai.com/v1` |
//! | `FINTEL_LLM_API_KEY` | unset (no `Authorization` header) |
//! | `FINTEL_LLM_MODEL` | `gpt-4o-mini` |
//! | `FINTEL_LLM_CONNECT_TIMEOUT_SECS` | `10` |
//! | `FINTEL_LLM_READ_TIMEOUT_SECS` | `30` |

use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable for the chat-completions base URL
pub const BASE_URL_ENV: &str = "FINTEL_LLM_BASE_URL";

/// Environment variable for the bearer token
pub const API_KEY_ENV: &str = "FINTEL_LLM_API_KEY";

/// Environment variable for the model identifier
pub const MODEL_ENV: &str = "FINTEL_LLM_MODEL";

/// Environment variable for the connect timeout (seconds)
pub const CONNECT_TIMEOUT_ENV: &str = "FINTEL_LLM_CONNECT_TIMEOUT_SECS";

/// Environment variable for the read timeout (seconds)
pub const READ_TIMEOUT_ENV: &str = "FINTEL_LLM_READ_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Configuration for the chat-completions transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Bearer token; `None` sends no `Authorization` header
    pub api_key: Option<String>,
    /// Default model identifier
    pub model: String,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds; expiry is treated as a transport failure
    pub read_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let api_key = env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        let model = env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_owned());

        Self {
            base_url,
            api_key,
            model,
            connect_timeout_secs: secs_from_env(CONNECT_TIMEOUT_ENV, DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout_secs: secs_from_env(READ_TIMEOUT_ENV, DEFAULT_READ_TIMEOUT_SECS),
        }
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

fn secs_from_env(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
