// ABOUTME: Tests for layered insight extraction from assistant text
// ABOUTME: Covers bullet splitting, line fallback, whole-text wrap, and near-idempotence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fintel Budget Intelligence

#![allow(missing_docs)]

use fintel::insights;

#[test]
fn test_bullet_separated_text_splits_into_insights() {
    let result = insights::extract("\u{2022} Reduce dining out.\u{2022} Increase savings.");
    assert_eq!(
        result,
        vec![
            "\u{2022} Reduce dining out.".to_owned(),
            "\u{2022} Increase savings.".to_owned(),
        ]
    );
}

#[test]
fn test_preamble_before_first_bullet_is_discarded() {
    let result = insights::extract(
        "Here are some ideas:\u{2022} Cancel unused subscriptions.\u{2022} Cook at home.",
    );
    assert_eq!(
        result,
        vec![
            "\u{2022} Cancel unused subscriptions.".to_owned(),
            "\u{2022} Cook at home.".to_owned(),
        ]
    );
}

#[test]
fn test_newline_fallback_bullets_plain_lines() {
    let result = insights::extract("Track your spending\nSet a weekly budget");
    assert_eq!(
        result,
        vec![
            "\u{2022} Track your spending".to_owned(),
            "\u{2022} Set a weekly budget".to_owned(),
        ]
    );
}

#[test]
fn test_newline_fallback_keeps_preformatted_lines_verbatim() {
    let result = insights::extract("- Dash item\n1. Numbered item\nplain item");
    assert_eq!(
        result,
        vec![
            "- Dash item".to_owned(),
            "1. Numbered item".to_owned(),
            "\u{2022} plain item".to_owned(),
        ]
    );
}

#[test]
fn test_blank_lines_are_skipped() {
    let result = insights::extract("first\n\n\nsecond\n");
    assert_eq!(result.len(), 2);
}

#[test]
fn test_single_plain_sentence_becomes_one_insight() {
    let result = insights::extract("Save more money this month.");
    assert_eq!(result, vec!["\u{2022} Save more money this month.".to_owned()]);
}

#[test]
fn test_empty_input_yields_no_insights() {
    assert!(insights::extract("").is_empty());
    assert!(insights::extract("   \n\t ").is_empty());
}

#[test]
fn test_nonempty_input_never_yields_empty_list() {
    let inputs = [
        "x",
        "\u{2022} one",
        "line one\nline two",
        "no bullets here at all",
        "prefix \u{2022} tail",
    ];
    for input in inputs {
        let result = insights::extract(input);
        assert!(!result.is_empty(), "no insights for {input:?}");
        for insight in &result {
            assert!(
                !insight.trim().is_empty(),
                "blank insight for {input:?}"
            );
        }
    }
}

#[test]
fn test_bulleted_output_has_prefix_and_content() {
    let result = insights::extract("Spend less on coffee.\u{2022} Walk to work.");
    for insight in &result {
        assert!(insight.starts_with("\u{2022} "), "missing prefix: {insight:?}");
        let content = insight.trim_start_matches("\u{2022} ").trim();
        assert!(!content.is_empty(), "empty content: {insight:?}");
    }
}

#[test]
fn test_rejoined_output_reproduces_same_list() {
    // Near-idempotence: already-bulleted text re-enters through layer 1
    let original = insights::extract("\u{2022} First tip.\u{2022} Second tip.\u{2022} Third tip.");
    let rejoined = original.join("");
    let reextracted = insights::extract(&rejoined);
    assert_eq!(original, reextracted);
}
