// ABOUTME: Splits assembled assistant text into an ordered list of bullet insights
// ABOUTME: Layered fallback - bullet split, then line heuristics, then whole-text wrap
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

//! # Insight Extraction
//!
//! Turns a fully-assembled assistant response into discrete insight strings.
//! The layers are strictly ordered; each runs only if the previous produced
//! zero results:
//!
//! 1. Split on the bullet character `•`, discarding any preamble before the
//!    first bullet.
//! 2. Split on newlines, keeping pre-formatted list lines verbatim and
//!    bulleting the rest.
//! 3. Wrap the entire trimmed text as a single insight.
//!
//! Re-feeding joined output reproduces the same list only because
//! already-bulleted text matches layer 1 directly; this near-idempotence is
//! a property of typical inputs, not a guarantee.

use regex::Regex;
use std::sync::LazyLock;

/// The bullet character produced by the advisor prompt
const BULLET: char = '\u{2022}';

/// Prefix applied to extracted insights
const BULLET_PREFIX: &str = "\u{2022} ";

/// Matches numbered list prefixes like `1. ` or `12. `
static NUMBERED_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d+\.\s").ok());

/// Extract an ordered list of insights from assistant text.
///
/// Never empty for non-empty (after trimming) input; every insight has
/// non-empty trimmed content.
#[must_use]
pub fn extract(full_text: &str) -> Vec<String> {
    let trimmed = full_text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let insights = split_on_bullets(trimmed);
    if !insights.is_empty() {
        return insights;
    }

    let insights = split_on_lines(trimmed);
    if !insights.is_empty() {
        return insights;
    }

    vec![format!("{BULLET_PREFIX}{trimmed}")]
}

/// Layer 1: split on `•`, discarding the preamble segment
fn split_on_bullets(text: &str) -> Vec<String> {
    text.split(BULLET)
        .skip(1)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("{BULLET_PREFIX}{segment}"))
        .collect()
}

/// Layer 2: one insight per non-blank line
///
/// Lines already formatted as list items (bullet, dash, or `N. ` prefix) are
/// kept verbatim; everything else gets the bullet prefix.
fn split_on_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if is_list_line(line) {
                line.to_owned()
            } else {
                format!("{BULLET_PREFIX}{line}")
            }
        })
        .collect()
}

fn is_list_line(line: &str) -> bool {
    if line.starts_with(BULLET) || line.starts_with('-') {
        return true;
    }
    NUMBERED_LINE
        .as_ref()
        .is_some_and(|re| re.is_match(line))
}
