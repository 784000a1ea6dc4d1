//! Core types for Tribunal evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Feedback recorded on every sentinel vote's `reasoning`.
pub const SENTINEL_REASONING: &str = "evaluation error";

/// The four council seats.
///
/// Declaration order is the canonical council order: fact, structure,
/// critical, integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorRole {
    /// Factual accuracy against the reference context
    Fact,
    /// Organization, grammar and clarity
    Structure,
    /// Bluffing, circular reasoning and fabrication
    Critical,
    /// Automated authorship and duplication
    Integrity,
}

impl EvaluatorRole {
    /// All roles in council order.
    pub const ALL: [EvaluatorRole; 4] = [
        EvaluatorRole::Fact,
        EvaluatorRole::Structure,
        EvaluatorRole::Critical,
        EvaluatorRole::Integrity,
    ];

    /// Name of the evaluator occupying this seat.
    pub fn evaluator_name(&self) -> &'static str {
        match self {
            EvaluatorRole::Fact => "FactChecker",
            EvaluatorRole::Structure => "StructureAnalyzer",
            EvaluatorRole::Critical => "CriticalDetector",
            EvaluatorRole::Integrity => "IntegrityGuard",
        }
    }

    /// Human-readable description of the seat.
    pub fn label(&self) -> &'static str {
        match self {
            EvaluatorRole::Fact => "Fact Verification",
            EvaluatorRole::Structure => "Structure & Grammar Analysis",
            EvaluatorRole::Critical => "Bluff & Fabrication Detection",
            EvaluatorRole::Integrity => "Automated Authorship & Duplication Detection",
        }
    }

    /// Position of this role in [`EvaluatorRole::ALL`].
    pub fn index(&self) -> usize {
        match self {
            EvaluatorRole::Fact => 0,
            EvaluatorRole::Structure => 1,
            EvaluatorRole::Critical => 2,
            EvaluatorRole::Integrity => 3,
        }
    }
}

impl fmt::Display for EvaluatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvaluatorRole::Fact => "fact",
            EvaluatorRole::Structure => "structure",
            EvaluatorRole::Critical => "critical",
            EvaluatorRole::Integrity => "integrity",
        };
        f.write_str(s)
    }
}

/// One evaluator's judgment of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Name of the evaluator that cast this vote
    pub evaluator_name: String,

    /// Seat the evaluator occupies
    pub role: EvaluatorRole,

    /// Score in [0, 100]
    pub score: f64,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Feedback addressed to the author of the submission
    pub feedback: String,

    /// Internal reasoning of the evaluator
    pub reasoning: String,

    /// Wall-clock time spent producing the vote
    #[serde(rename = "latency_ms", with = "duration_ms")]
    pub latency: Duration,

    /// When the vote was cast
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    /// Create a vote for `role`. Score and confidence are clamped into range;
    /// a non-finite value collapses to the lower bound.
    pub fn new(
        role: EvaluatorRole,
        score: f64,
        confidence: f64,
        feedback: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            evaluator_name: role.evaluator_name().to_string(),
            role,
            score: clamp_or_zero(score, 0.0, 100.0),
            confidence: clamp_or_zero(confidence, 0.0, 1.0),
            feedback: feedback.into(),
            reasoning: reasoning.into(),
            latency: Duration::ZERO,
            cast_at: Utc::now(),
        }
    }

    /// The zero-score, zero-confidence vote recorded when an evaluator fails.
    pub fn sentinel(role: EvaluatorRole, cause: &str) -> Self {
        Self::new(
            role,
            0.0,
            0.0,
            format!("Evaluation failed: {}", cause),
            SENTINEL_REASONING,
        )
    }

    /// Attach the measured latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

fn clamp_or_zero(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

/// Result of a single evaluator run.
///
/// Failures never escape an evaluator; they are carried here as a
/// sentinel vote together with the cause, so the council always has
/// a vote for every seat.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// The evaluator produced a judgment.
    Counted(Vote),

    /// The evaluator failed; `vote` is the sentinel recorded in its place.
    Sentinel { vote: Vote, cause: String },
}

impl VoteOutcome {
    /// Build a sentinel outcome for `role`.
    pub fn sentinel(role: EvaluatorRole, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self::Sentinel {
            vote: Vote::sentinel(role, &cause),
            cause,
        }
    }

    /// Borrow the vote regardless of outcome.
    pub fn vote(&self) -> &Vote {
        match self {
            VoteOutcome::Counted(vote) => vote,
            VoteOutcome::Sentinel { vote, .. } => vote,
        }
    }

    /// Consume into the vote regardless of outcome.
    pub fn into_vote(self) -> Vote {
        match self {
            VoteOutcome::Counted(vote) => vote,
            VoteOutcome::Sentinel { vote, .. } => vote,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, VoteOutcome::Sentinel { .. })
    }
}

/// The four votes of one council run, ordered by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilVotes {
    pub fact: Vote,
    pub structure: Vote,
    pub critical: Vote,
    pub integrity: Vote,

    /// Wall-clock duration of the whole concurrent batch
    #[serde(rename = "total_latency_ms", with = "duration_ms")]
    pub total_latency: Duration,
}

impl CouncilVotes {
    /// Votes in council order.
    pub fn iter(&self) -> impl Iterator<Item = &Vote> {
        [&self.fact, &self.structure, &self.critical, &self.integrity].into_iter()
    }

    /// The vote for a given seat.
    pub fn get(&self, role: EvaluatorRole) -> &Vote {
        match role {
            EvaluatorRole::Fact => &self.fact,
            EvaluatorRole::Structure => &self.structure,
            EvaluatorRole::Critical => &self.critical,
            EvaluatorRole::Integrity => &self.integrity,
        }
    }

    /// Clone the votes into a fixed array in council order.
    pub fn to_array(&self) -> [Vote; 4] {
        [
            self.fact.clone(),
            self.structure.clone(),
            self.critical.clone(),
            self.integrity.clone(),
        ]
    }
}

/// Letter grade on the A-F scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Map a numeric grade to a letter. Lower bounds are inclusive.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            LetterGrade::A
        } else if score >= 80.0 {
            LetterGrade::B
        } else if score >= 70.0 {
            LetterGrade::C
        } else if score >= 60.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        };
        f.write_str(s)
    }
}

/// How the final grade was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMethod {
    WeightedAverage,
    Veto,
}

/// The final, immutable outcome of one evaluation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalEvaluation {
    /// Final grade in [0, 100], one decimal
    pub final_grade: f64,

    pub letter_grade: LetterGrade,

    /// Composed feedback
    pub feedback: String,

    /// Votes in council order
    pub votes: [Vote; 4],

    pub consensus_method: ConsensusMethod,

    /// Integrity score fell below the integrity flag threshold
    pub integrity_flag: bool,

    /// Integrity score fell below the automated content flag threshold
    pub automated_content_flag: bool,

    /// Grade meets the policy's passing grade
    pub passed: bool,

    /// Seats whose confidence fell below the policy minimum
    pub low_confidence_roles: Vec<EvaluatorRole>,

    /// Profile used for weighting
    pub profile_id: String,

    pub evaluated_at: DateTime<Utc>,
}

impl FinalEvaluation {
    /// Whether the veto path produced this result.
    pub fn is_veto(&self) -> bool {
        self.consensus_method == ConsensusMethod::Veto
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom("latency must be a non-negative number"));
        }
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_clamps_out_of_range_values() {
        let vote = Vote::new(EvaluatorRole::Fact, 140.0, -0.2, "", "");
        assert_eq!(vote.score, 100.0);
        assert_eq!(vote.confidence, 0.0);

        let vote = Vote::new(EvaluatorRole::Fact, f64::NAN, f64::INFINITY, "", "");
        assert_eq!(vote.score, 0.0);
        assert_eq!(vote.confidence, 0.0);
    }

    #[test]
    fn test_sentinel_vote_shape() {
        let outcome = VoteOutcome::sentinel(EvaluatorRole::Critical, "all providers down");
        assert!(outcome.is_sentinel());

        let vote = outcome.into_vote();
        assert_eq!(vote.role, EvaluatorRole::Critical);
        assert_eq!(vote.evaluator_name, "CriticalDetector");
        assert_eq!(vote.score, 0.0);
        assert_eq!(vote.confidence, 0.0);
        assert_eq!(vote.reasoning, SENTINEL_REASONING);
        assert!(vote.feedback.contains("all providers down"));
    }

    #[test]
    fn test_role_order_and_index_agree() {
        for (i, role) in EvaluatorRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn test_letter_grade_boundaries() {
        assert_eq!(LetterGrade::from_score(100.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_score(95.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_score(90.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_score(89.9), LetterGrade::B);
        assert_eq!(LetterGrade::from_score(80.0), LetterGrade::B);
        assert_eq!(LetterGrade::from_score(79.9), LetterGrade::C);
        assert_eq!(LetterGrade::from_score(70.0), LetterGrade::C);
        assert_eq!(LetterGrade::from_score(69.9), LetterGrade::D);
        assert_eq!(LetterGrade::from_score(60.0), LetterGrade::D);
        assert_eq!(LetterGrade::from_score(59.9), LetterGrade::F);
        assert_eq!(LetterGrade::from_score(0.0), LetterGrade::F);
    }

    #[test]
    fn test_vote_latency_serializes_as_millis() {
        let vote = Vote::new(EvaluatorRole::Structure, 70.0, 0.8, "ok", "fine")
            .with_latency(Duration::from_millis(250));
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["latency_ms"], 250.0);
        assert_eq!(json["role"], "structure");

        let back: Vote = serde_json::from_value(json).unwrap();
        assert_eq!(back.latency, Duration::from_millis(250));
    }
}
