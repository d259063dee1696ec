// ABOUTME: Single-transaction categorization with closed-set validation and deterministic fallback
// ABOUTME: The membership invariant holds unconditionally - worst case is Other, never an error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # Transaction Categorization
//!
//! [`TransactionCategorizer`] maps a transaction description to exactly one
//! [`Category`] from a caller-supplied set:
//!
//! 1. Case-insensitive exact match against the set - no network call.
//! 2. Closed-set prompt to the model, validated by [`CategoryValidator`].
//! 3. On any failure, the deterministic keyword simulator: fixed-priority
//!    substring rules, first match wins, no match is `Other`.
//!
//! The result is always a member of the supplied set or `Other`; a keyword
//! hit outside the set is coerced to `Other` so the invariant holds even
//! against a narrowed set.

mod batch;

pub use batch::{extract_category_map, BatchCategorizer};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm::{prompts, ChatMessage, ChatRequest, LlmProvider};
use crate::models::Category;

/// Keyword rules for the deterministic simulator, scanned in order;
/// the first rule with a matching substring wins.
const KEYWORD_RULES: &[(&[&str], Category)] = &[
    (
        &["rent", "mortgage", "apartment", "lease", "landlord"],
        Category::Housing,
    ),
    (
        &["uber", "lyft", "taxi", "gas station", "fuel", "transit", "parking", "car payment"],
        Category::Transportation,
    ),
    (
        &[
            "grocery", "groceries", "restaurant", "coffee", "cafe", "dining", "pizza",
            "starbucks", "mcdonald", "supermarket", "food",
        ],
        Category::Food,
    ),
    (
        &["electric", "water bill", "internet", "phone bill", "utility", "utilities"],
        Category::Utilities,
    ),
    (&["insurance", "premium"], Category::Insurance),
    (
        &["hospital", "pharmacy", "doctor", "clinic", "dental", "medical"],
        Category::Healthcare,
    ),
    (&["savings", "emergency fund"], Category::Savings),
    (&["gym", "salon", "haircut", "barber"], Category::Personal),
    (
        &["netflix", "spotify", "cinema", "movie", "concert", "game"],
        Category::Entertainment,
    ),
    (
        &["tuition", "university", "course", "textbook", "school"],
        Category::Education,
    ),
    (
        &["clothing", "apparel", "shoes", "fashion"],
        Category::Clothing,
    ),
    (&["gift", "donation", "charity"], Category::Gifts),
    (
        &["hotel", "flight", "airline", "airbnb", "vacation", "travel"],
        Category::Travel,
    ),
    (
        &["salary", "payroll", "paycheck", "income", "refund"],
        Category::Income,
    ),
    (
        &["stock", "dividend", "brokerage", "crypto", "invest"],
        Category::Investment,
    ),
];

/// Validates model answers against a category set
pub struct CategoryValidator;

impl CategoryValidator {
    /// Case-insensitive membership check; returns the canonically-cased
    /// category on match.
    #[must_use]
    pub fn member(answer: &str, categories: &[Category]) -> Option<Category> {
        let trimmed = answer.trim();
        categories
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
    }

    /// Total form of [`member`](Self::member): any non-member answer
    /// validates to `Other`, so the result is always in
    /// `categories ∪ {Other}`.
    #[must_use]
    pub fn validate(answer: &str, categories: &[Category]) -> Category {
        Self::member(answer, categories).unwrap_or(Category::Other)
    }
}

/// Deterministic keyword classifier used when the remote call fails or the
/// answer does not validate.
///
/// Same input always yields the same output; no network involved. Hits
/// outside `categories` degrade to `Other` to preserve the membership
/// invariant.
#[must_use]
pub fn simulate_category(description: &str, categories: &[Category]) -> Category {
    let haystack = description.to_lowercase();
    for (keywords, category) in KEYWORD_RULES {
        if keywords.iter().any(|k| haystack.contains(k)) {
            if categories.contains(category) {
                return *category;
            }
            return Category::Other;
        }
    }
    Category::Other
}

/// Categorizes single transactions via the model with deterministic fallback
pub struct TransactionCategorizer {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
}

impl TransactionCategorizer {
    /// Create a categorizer backed by the given provider
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: None,
        }
    }

    /// Override the model used for categorization requests
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Categorize one transaction.
    ///
    /// The returned category is always a member of `categories ∪ {Other}`;
    /// every failure path degrades to the keyword simulator rather than an
    /// error.
    pub async fn categorize(
        &self,
        description: &str,
        amount: f64,
        categories: &[Category],
    ) -> Category {
        // Exact label match short-circuits without a network call
        if let Some(category) = CategoryValidator::member(description, categories) {
            return category;
        }

        match self.ask_model(description, amount, categories).await {
            Ok(Some(category)) => category,
            Ok(None) => {
                debug!("model answer did not validate, using keyword simulator");
                simulate_category(description, categories)
            }
            Err(e) => {
                warn!("categorization request failed ({e}), using keyword simulator");
                simulate_category(description, categories)
            }
        }
    }

    async fn ask_model(
        &self,
        description: &str,
        amount: f64,
        categories: &[Category],
    ) -> Result<Option<Category>, AppError> {
        let prompt = prompts::categorization_prompt(description, amount, categories);
        let mut request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(0.0)
            .with_max_tokens(16);
        if let Some(ref model) = self.model {
            request = request.with_model(model.clone());
        }

        let response = self.provider.complete(&request).await?;
        if response.content.trim().is_empty() {
            return Ok(None);
        }
        Ok(CategoryValidator::member(&response.content, categories))
    }
}
