//! Heuristic content scorers used by the integrity seat.
//!
//! A scorer maps text to a likelihood in [0, 100]. Scorers are strategy
//! objects: the integrity evaluator holds two of them (automated
//! authorship and duplication) and never looks inside.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Pluggable likelihood scorer.
pub trait HeuristicScorer: Send + Sync {
    /// Short name used in logs and status output.
    fn name(&self) -> &str;

    /// Likelihood in [0, 100]. Implementations may return out-of-range or
    /// non-finite values; callers must check.
    fn score(&self, text: &str) -> f64;
}

lazy_static! {
    /// Stock phrasing typical of machine-generated prose.
    static ref AUTOMATED_PHRASES: Vec<Regex> = [
        r"(?i)as an? (?:large )?language model",
        r"(?i)i cannot provide",
        r"(?i)it'?s worth noting",
        r"(?i)in conclusion,",
        r"(?i)furthermore,",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    /// Sentence boundary: terminal punctuation followed by whitespace.
    static ref SENTENCE_SPLIT: Regex = Regex::new(r"[.!?]+\s+").unwrap();

    static ref NON_WORD: Regex = Regex::new(r"[^a-z0-9 ]+").unwrap();
}

/// Points added per distinct phrase found.
pub const DEFAULT_POINTS_PER_PHRASE: f64 = 15.0;

/// Automated-authorship scorer: counts distinct stock phrases, each worth a
/// fixed number of points, capped at 100.
#[derive(Debug, Clone)]
pub struct PhrasePatternScorer {
    patterns: Vec<Regex>,
    points_per_phrase: f64,
}

impl PhrasePatternScorer {
    pub fn new() -> Self {
        Self {
            patterns: AUTOMATED_PHRASES.clone(),
            points_per_phrase: DEFAULT_POINTS_PER_PHRASE,
        }
    }

    /// Add a phrase pattern.
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn with_points_per_phrase(mut self, points: f64) -> Self {
        self.points_per_phrase = points;
        self
    }

    /// Number of distinct patterns present in `text`.
    pub fn matches(&self, text: &str) -> usize {
        self.patterns.iter().filter(|p| p.is_match(text)).count()
    }
}

impl Default for PhrasePatternScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicScorer for PhrasePatternScorer {
    fn name(&self) -> &str {
        "phrase_patterns"
    }

    fn score(&self, text: &str) -> f64 {
        (self.matches(text) as f64 * self.points_per_phrase).min(100.0)
    }
}

/// Duplication scorer: percentage of sentences that repeat an earlier
/// sentence of the same submission (case and punctuation insensitive).
#[derive(Debug, Clone)]
pub struct RepeatedSentenceScorer {
    /// Sentences with fewer words are ignored
    min_words: usize,
}

impl RepeatedSentenceScorer {
    pub fn new() -> Self {
        Self { min_words: 4 }
    }

    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = min_words;
        self
    }
}

impl Default for RepeatedSentenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicScorer for RepeatedSentenceScorer {
    fn name(&self) -> &str {
        "repeated_sentences"
    }

    fn score(&self, text: &str) -> f64 {
        let sentences: Vec<String> = SENTENCE_SPLIT
            .split(text)
            .map(|s| {
                let lower = s.to_lowercase();
                let cleaned = NON_WORD.replace_all(&lower, " ");
                cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
            })
            .filter(|s| s.split(' ').count() >= self.min_words)
            .collect();

        if sentences.len() < 2 {
            return 0.0;
        }

        let mut seen = HashSet::new();
        let repeated = sentences.iter().filter(|s| !seen.insert(s.as_str())).count();

        repeated as f64 / sentences.len() as f64 * 100.0
    }
}

/// Scorer that always returns the same value.
#[derive(Debug, Clone)]
pub struct FixedScorer {
    name: String,
    value: f64,
}

impl FixedScorer {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl HeuristicScorer for FixedScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, _text: &str) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_scores_zero() {
        let scorer = PhrasePatternScorer::new();
        assert_eq!(scorer.score("Photosynthesis converts light into chemical energy."), 0.0);
    }

    #[test]
    fn test_each_phrase_adds_fifteen() {
        let scorer = PhrasePatternScorer::new();
        let text = "It's worth noting that plants need light. Furthermore, they need water.";
        assert_eq!(scorer.matches(text), 2);
        assert_eq!(scorer.score(text), 30.0);
    }

    #[test]
    fn test_phrase_matching_is_case_insensitive() {
        let scorer = PhrasePatternScorer::new();
        assert_eq!(scorer.score("AS A LARGE LANGUAGE MODEL I think so."), 15.0);
    }

    #[test]
    fn test_phrase_score_is_capped() {
        let scorer = PhrasePatternScorer::new().with_points_per_phrase(40.0);
        let text = "As a language model, I cannot provide that. It's worth noting this. \
                    Furthermore, more. In conclusion, done.";
        assert_eq!(scorer.score(text), 100.0);
    }

    #[test]
    fn test_custom_pattern() {
        let scorer =
            PhrasePatternScorer::new().with_pattern(Regex::new(r"(?i)delve into").unwrap());
        assert_eq!(scorer.score("Let us delve into the topic."), 15.0);
    }

    #[test]
    fn test_no_repetition_scores_zero() {
        let scorer = RepeatedSentenceScorer::new();
        let text = "Water boils at one hundred degrees. Ice melts at zero degrees Celsius.";
        assert_eq!(scorer.score(text), 0.0);
    }

    #[test]
    fn test_repeated_sentences_detected() {
        let scorer = RepeatedSentenceScorer::new();
        let text = "The mitochondria is the powerhouse. The Mitochondria is the powerhouse! \
                    Cells divide by mitosis regularly. The mitochondria is the powerhouse.";
        // 4 sentences, 2 repeat the first
        assert_eq!(scorer.score(text), 50.0);
    }

    #[test]
    fn test_short_fragments_ignored() {
        let scorer = RepeatedSentenceScorer::new();
        assert_eq!(scorer.score("Yes. Yes. Yes. Yes."), 0.0);
    }

    #[test]
    fn test_fixed_scorer() {
        let scorer = FixedScorer::new("stub", 42.0);
        assert_eq!(scorer.name(), "stub");
        assert_eq!(scorer.score("anything"), 42.0);
    }
}
