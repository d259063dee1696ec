// ABOUTME: Prompt construction for the advisor chat and categorization requests
// ABOUTME: Closed-set categorization prompts forbid explanations to keep answers machine-checkable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! Prompt builders for the advisor and categorization services.

use crate::models::{Category, Transaction};

/// System prompt for the budget advisor chat
pub const ADVISOR_SYSTEM_PROMPT: &str = "You are a personal budget advisor. \
You analyze the user's spending and answer questions about their finances. \
When asked for advice or insights, respond with a short bullet list, one \
actionable insight per bullet, using the \u{2022} bullet character. Be \
concrete and avoid filler.";

/// Build the closed-set prompt for categorizing a single transaction.
///
/// The model is instructed to answer with exactly one label and nothing
/// else; the answer is validated against the set on return.
#[must_use]
pub fn categorization_prompt(description: &str, amount: f64, categories: &[Category]) -> String {
    let labels = category_labels(categories);
    format!(
        "Categorize this financial transaction into exactly one of the \
following categories: {labels}.\n\
Transaction: \"{description}\" (amount: {amount:.2})\n\
Respond with only the category name. Do not explain."
    )
}

/// Build the batch prompt enumerating transactions by 1-based ordinal.
///
/// The expected answer is a single JSON object mapping each ordinal to a
/// category name: `{"1": "Food", "2": "Housing", ...}`.
#[must_use]
pub fn batch_categorization_prompt(transactions: &[Transaction], categories: &[Category]) -> String {
    let labels = category_labels(categories);
    let mut prompt = format!(
        "Categorize each of the following financial transactions into exactly \
one of these categories: {labels}.\n\n"
    );
    for (i, txn) in transactions.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. \"{}\" (amount: {:.2})\n",
            i + 1,
            txn.description,
            txn.amount
        ));
    }
    prompt.push_str(
        "\nRespond with a single JSON object mapping each transaction number \
to its category name, like {\"1\": \"Food\", \"2\": \"Housing\"}. \
Respond with only the JSON object. Do not explain.",
    );
    prompt
}

fn category_labels(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
