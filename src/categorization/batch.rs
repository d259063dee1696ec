// ABOUTME: Multi-transaction categorization over one prompt with an ordinal-to-category JSON answer
// ABOUTME: Any parse failure degrades the whole batch to Other - partial results are disallowed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # Batch Categorization
//!
//! One prompt enumerates every transaction by 1-based ordinal; the model is
//! asked for a single JSON object `{"1": "<Category>", ...}`. The response
//! is parsed strictly as JSON first, then by brace extraction (first `{` to
//! last `}`) as a fallback. Missing or invalid entries default to `Other`;
//! if no object can be recovered at all, the whole batch degrades to
//! all-`Other` of the correct length. A mixed trustworthy/untrustworthy
//! result set is worse than a uniformly-flagged one.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::errors::AppError;
use crate::llm::{prompts, ChatMessage, ChatRequest, LlmProvider};
use crate::models::{Category, Transaction};

use super::CategoryValidator;

/// Categorizes whole transaction batches in a single request
pub struct BatchCategorizer {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
}

impl BatchCategorizer {
    /// Create a batch categorizer backed by the given provider
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: None,
        }
    }

    /// Override the model used for batch requests
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Categorize every transaction, returning one category per input.
    ///
    /// The result length always equals `transactions.len()`, even when the
    /// remote response is unparsable garbage.
    pub async fn categorize_all(&self, transactions: &[Transaction]) -> Vec<Category> {
        if transactions.is_empty() {
            return Vec::new();
        }

        let mapping = match self.request_mapping(transactions).await {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(
                    "batch categorization degraded to all-Other for {} transactions: {e}",
                    transactions.len()
                );
                return vec![Category::Other; transactions.len()];
            }
        };

        (1..=transactions.len())
            .map(|ordinal| {
                mapping
                    .get(&ordinal.to_string())
                    .and_then(Value::as_str)
                    .and_then(|name| CategoryValidator::member(name, &Category::ALL))
                    .unwrap_or(Category::Other)
            })
            .collect()
    }

    async fn request_mapping(
        &self,
        transactions: &[Transaction],
    ) -> Result<Map<String, Value>, AppError> {
        let prompt = prompts::batch_categorization_prompt(transactions, &Category::ALL);
        let mut request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(0.0)
            .with_max_tokens(512);
        if let Some(ref model) = self.model {
            request = request.with_model(model.clone());
        }

        let response = self.provider.complete(&request).await?;
        extract_category_map(&response.content)
    }
}

/// Recover the ordinal→category object from a model response.
///
/// Tries strict whole-payload JSON parsing first; on failure, extracts the
/// substring between the first `{` and the last `}` and parses that. The
/// brace heuristic is not a full JSON-in-text scanner; it exists to survive
/// models that wrap the object in prose or code fences.
///
/// # Errors
///
/// Returns a serialization error when neither path yields a JSON object.
pub fn extract_category_map(body: &str) -> Result<Map<String, Value>, AppError> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body.trim()) {
        return Ok(map);
    }

    let start = body
        .find('{')
        .ok_or_else(|| AppError::serialization("no JSON object in batch response"))?;
    let end = body
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| AppError::serialization("unterminated JSON object in batch response"))?;

    match serde_json::from_str::<Value>(&body[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::serialization(
            "batch response JSON is not an object",
        )),
        Err(e) => Err(AppError::serialization(format!(
            "failed to parse batch response: {e}"
        ))),
    }
}
