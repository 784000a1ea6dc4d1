//! Turning backend text into a vote.
//!
//! Backends are asked for a JSON object but often wrap it in prose or a
//! fenced code block. Anything that cannot be read becomes a neutral vote;
//! parsing never fails.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tribunal_core::{EvaluatorRole, Vote};

/// Score of the neutral vote recorded for unreadable responses.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Confidence used when the response omits one, and for neutral votes.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Raw text kept as feedback on a neutral vote.
pub const MAX_RAW_FEEDBACK: usize = 500;

pub const UNSTRUCTURED_REASONING: &str = "unstructured response";

lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").unwrap();
}

#[derive(Debug, Deserialize)]
struct ScoredResponse {
    score: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    reasoning: String,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// Parse a backend response into a vote for `role`.
pub fn parse_response(role: EvaluatorRole, raw: &str) -> Vote {
    match extract(raw) {
        Some(parsed) => Vote::new(
            role,
            parsed.score,
            parsed.confidence,
            parsed.feedback,
            parsed.reasoning,
        ),
        None => {
            tracing::debug!(role = %role, "Unstructured backend response, recording neutral vote");
            Vote::new(
                role,
                NEUTRAL_SCORE,
                DEFAULT_CONFIDENCE,
                truncate_chars(raw.trim(), MAX_RAW_FEEDBACK),
                UNSTRUCTURED_REASONING,
            )
        }
    }
}

fn extract(raw: &str) -> Option<ScoredResponse> {
    let trimmed = raw.trim();

    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Some(parsed);
    }

    if let Some(parsed) = FENCED_JSON
        .captures_iter(trimmed)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| serde_json::from_str(m.as_str()).ok())
    {
        return Some(parsed);
    }

    // Outermost braces inside prose.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROLE: EvaluatorRole = EvaluatorRole::Fact;

    #[test]
    fn test_bare_json() {
        let vote = parse_response(
            ROLE,
            r#"{"score": 85, "confidence": 0.9, "feedback": "Accurate.", "reasoning": "All facts check out."}"#,
        );
        assert_eq!(vote.score, 85.0);
        assert_eq!(vote.confidence, 0.9);
        assert_eq!(vote.feedback, "Accurate.");
        assert_eq!(vote.reasoning, "All facts check out.");
        assert_eq!(vote.evaluator_name, "FactChecker");
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let vote = parse_response(ROLE, r#"{"score": 70}"#);
        assert_eq!(vote.score, 70.0);
        assert_eq!(vote.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(vote.feedback, "");
        assert_eq!(vote.reasoning, "");
    }

    #[test]
    fn test_fenced_block() {
        let raw = "Here is my evaluation:\n```json\n{\"score\": 62, \"confidence\": 0.7}\n```\nThanks.";
        let vote = parse_response(ROLE, raw);
        assert_eq!(vote.score, 62.0);
        assert_eq!(vote.confidence, 0.7);
    }

    #[test]
    fn test_json_inside_prose() {
        let raw = "Sure! {\"score\": 91, \"feedback\": \"Strong {nested} braces.\"} Hope that helps.";
        let vote = parse_response(ROLE, raw);
        assert_eq!(vote.score, 91.0);
        assert_eq!(vote.feedback, "Strong {nested} braces.");
    }

    #[test]
    fn test_unreadable_becomes_neutral() {
        let vote = parse_response(ROLE, "The answer looks fine to me.");
        assert_eq!(vote.score, NEUTRAL_SCORE);
        assert_eq!(vote.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(vote.feedback, "The answer looks fine to me.");
        assert_eq!(vote.reasoning, UNSTRUCTURED_REASONING);
    }

    #[test]
    fn test_missing_score_becomes_neutral() {
        let vote = parse_response(ROLE, r#"{"confidence": 0.9, "feedback": "no score"}"#);
        assert_eq!(vote.score, NEUTRAL_SCORE);
        assert_eq!(vote.reasoning, UNSTRUCTURED_REASONING);
    }

    #[test]
    fn test_neutral_feedback_truncated() {
        let raw = "x".repeat(2000);
        let vote = parse_response(ROLE, &raw);
        assert_eq!(vote.feedback.chars().count(), MAX_RAW_FEEDBACK);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let vote = parse_response(ROLE, r#"{"score": 140, "confidence": 3}"#);
        assert_eq!(vote.score, 100.0);
        assert_eq!(vote.confidence, 1.0);
    }

    proptest! {
        #[test]
        fn prop_any_text_yields_a_bounded_vote(raw in ".{0,800}") {
            let vote = parse_response(ROLE, &raw);
            prop_assert!((0.0..=100.0).contains(&vote.score));
            prop_assert!((0.0..=1.0).contains(&vote.confidence));
        }

        #[test]
        fn prop_scored_json_in_prose_is_found(score in 0u32..=100, prefix in "[a-zA-Z ,.]{0,40}") {
            let raw = format!("{} {{\"score\": {}}} done", prefix, score);
            prop_assert_eq!(parse_response(ROLE, &raw).score, f64::from(score));
        }
    }
}
