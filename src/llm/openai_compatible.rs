// ABOUTME: OpenAI-compatible chat-completions client used by the advisor and categorizers
// ABOUTME: Non-streaming and streaming completion over one reqwest client with typed error mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # `OpenAI`-Compatible Provider
//!
//! Implementation of [`LlmProvider`] for any endpoint speaking the `OpenAI`
//! chat-completions API (cloud or local). Configured via [`LlmConfig`],
//! typically from the environment.
//!
//! ## Streaming recovery
//!
//! A malformed JSON-shaped frame is dropped with a log; a non-JSON frame is
//! *salvaged* - its raw text (with any `data:` prefix stripped) is delivered
//! as literal content, unless it still contains the done-sentinel text
//! `[DONE]`, in which case it is dropped silently. See
//! [`parse_stream_frame`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use super::sse_parser::{
    is_retryable_request_error, is_retryable_status, sse_chunk_stream, RetryConfig,
};
use super::{ChatMessage, ChatRequest, ChatResponse, ChatStream, LlmProvider, StreamChunk};
use crate::config::LlmConfig;
use crate::errors::{AppError, ErrorCode};

/// Service name used in error messages
const SERVICE: &str = "ChatCompletions";

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for ApiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

/// Streaming chunk payload: `{"choices":[{"delta":{"content":"..."}}]}`
#[derive(Debug, Deserialize)]
struct StreamPayload {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Frame Parsing
// ============================================================================

/// Parse one raw streaming frame payload into an optional chunk.
///
/// Well-formed frames yield their `choices[0].delta.content` when present
/// and non-empty; a set `finish_reason` marks the chunk final.
///
/// Recovery is two-tiered. A JSON-shaped frame (starting with `{`) that
/// fails to parse is dropped with a log. Anything else is salvaged: the raw
/// text, with any leftover `data:` prefix stripped, is delivered as literal
/// content, unless it still contains the done-sentinel text `[DONE]`, in
/// which case it is dropped silently. A malformed frame never produces an
/// error: the read loop always continues.
#[must_use]
pub fn parse_stream_frame(raw: &str) -> Option<Result<StreamChunk, AppError>> {
    let text = raw
        .strip_prefix("data:")
        .map_or(raw, str::trim_start)
        .trim();

    if text.starts_with('{') {
        return match serde_json::from_str::<StreamPayload>(text) {
            Ok(payload) => {
                let choice = payload.choices.into_iter().next()?;
                let delta = choice.delta.content.unwrap_or_default();
                let is_final = choice.finish_reason.is_some();
                if delta.is_empty() && !is_final {
                    return None;
                }
                Some(Ok(StreamChunk {
                    delta,
                    is_final,
                    finish_reason: choice.finish_reason,
                }))
            }
            Err(e) => {
                debug!("dropping malformed JSON stream frame: {e}");
                None
            }
        };
    }

    if text.is_empty() || text.contains("[DONE]") {
        debug!("dropping unrecognized stream frame");
        return None;
    }

    debug!("salvaging non-JSON stream frame as literal content");
    Some(Ok(StreamChunk {
        delta: text.to_owned(),
        is_final: false,
        finish_reason: None,
    }))
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Chat-completions client for any `OpenAI`-compatible endpoint
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: LlmConfig,
    retry: RetryConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a provider with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: LlmConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            retry: RetryConfig::default_config(),
        })
    }

    /// Create a provider from environment variables (see [`LlmConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_env() -> Result<Self, AppError> {
        Self::new(LlmConfig::from_env())
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("Bearer {api_key}"))
        } else {
            request
        }
    }

    fn build_api_request(&self, request: &ChatRequest, stream: bool) -> ApiRequest {
        ApiRequest {
            model: request
                .model
                .as_deref()
                .unwrap_or(&self.config.model)
                .to_owned(),
            messages: request.messages.iter().map(ApiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(stream),
        }
    }

    fn connect_error(&self, e: &reqwest::Error) -> AppError {
        error!("failed to send request to {}: {e}", self.config.base_url);
        if e.is_connect() {
            AppError::new(
                ErrorCode::ExternalServiceUnavailable,
                format!("cannot connect to {}", self.config.base_url),
            )
        } else if e.is_timeout() {
            AppError::new(
                ErrorCode::ExternalServiceUnavailable,
                format!("request to {} timed out", self.config.base_url),
            )
        } else {
            AppError::external_service(SERVICE, format!("request failed: {e}"))
        }
    }

    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        if let Ok(response) = serde_json::from_str::<ErrorResponse>(body) {
            let error_type = response
                .error
                .error_type
                .unwrap_or_else(|| "unknown".to_owned());

            match status.as_u16() {
                401 | 403 => AppError::new(
                    ErrorCode::ExternalAuthFailed,
                    format!("API authentication failed: {}", response.error.message),
                ),
                429 => AppError::new(
                    ErrorCode::ExternalRateLimited,
                    format!("rate limited: {}", response.error.message),
                ),
                400 => AppError::invalid_input(format!(
                    "API validation error: {}",
                    response.error.message
                )),
                404 => AppError::not_found(format!(
                    "model or endpoint not found: {}",
                    response.error.message
                )),
                _ => AppError::external_service(
                    SERVICE,
                    format!("{error_type} - {}", response.error.message),
                ),
            }
        } else {
            match status.as_u16() {
                502..=504 => AppError::new(
                    ErrorCode::ExternalServiceUnavailable,
                    format!("upstream unavailable ({status})"),
                ),
                _ => AppError::external_service(
                    SERVICE,
                    format!(
                        "API error ({status}): {}",
                        body.chars().take(200).collect::<String>()
                    ),
                ),
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let api_request = self.build_api_request(request, false);

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&api_request);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.connect_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::external_service(SERVICE, format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let api_response: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            error!(
                "failed to parse API response: {e} - body: {}",
                &body[..body.len().min(500)]
            );
            AppError::serialization(format!("failed to parse response: {e}"))
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(SERVICE, "API returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();

        debug!(
            "received response: {} chars, finish_reason: {:?}",
            content.len(),
            choice.finish_reason
        );

        Ok(ChatResponse {
            content,
            model: api_response.model,
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.model)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let api_request = self.build_api_request(request, true);

        let mut last_error: Option<AppError> = None;

        // Retries cover request establishment only; once the byte stream is
        // handed out it is never replayed.
        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt - 1);
                warn!(
                    "retrying streaming request (attempt {attempt}/{}) after {delay:?}",
                    self.retry.max_retries
                );
                tokio::time::sleep(delay).await;
            }

            let http_request = self
                .client
                .post(self.api_url("chat/completions"))
                .header("Content-Type", "application/json")
                .json(&api_request);

            let response = match self.add_auth_header(http_request).send().await {
                Ok(response) => response,
                Err(e) => {
                    let retryable = is_retryable_request_error(&e);
                    last_error = Some(self.connect_error(&e));
                    if retryable {
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(Self::parse_error_response(status, &body));
                if is_retryable_status(status.as_u16()) {
                    continue;
                }
                break;
            }

            return Ok(sse_chunk_stream(
                response.bytes_stream(),
                parse_stream_frame,
                SERVICE,
            ));
        }

        Err(last_error
            .unwrap_or_else(|| AppError::external_service(SERVICE, "retry limit exceeded")))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        debug!("health check at {}", self.config.base_url);

        let http_request = self.client.get(self.api_url("models"));
        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.connect_error(&e))?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!("health check failed with status {}", response.status());
        }
        Ok(healthy)
    }
}
