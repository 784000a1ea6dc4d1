//! Integrity seat: automated authorship and duplication.
//!
//! Runs entirely in-process. Two heuristic scorers each report a
//! likelihood in [0, 100]; the vote is `100 - max(automated, duplication)`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tribunal_core::{
    EvaluatorRole, HeuristicScorer, PhrasePatternScorer, RepeatedSentenceScorer, Vote,
    VoteOutcome,
};

use super::Evaluator;

/// Fixed confidence of heuristic votes.
pub const INTEGRITY_CONFIDENCE: f64 = 0.85;

const HIGH_CONCERN: f64 = 70.0;
const MODERATE_CONCERN: f64 = 40.0;

/// Heuristic integrity evaluator.
#[derive(Clone)]
pub struct IntegrityEvaluator {
    automated: Arc<dyn HeuristicScorer>,
    duplication: Arc<dyn HeuristicScorer>,
}

impl IntegrityEvaluator {
    pub fn new(automated: Arc<dyn HeuristicScorer>, duplication: Arc<dyn HeuristicScorer>) -> Self {
        Self {
            automated,
            duplication,
        }
    }

    /// Names of the two scorers, for status output.
    pub fn scorer_names(&self) -> (&str, &str) {
        (self.automated.name(), self.duplication.name())
    }

    fn score_text(&self, text: &str) -> Result<Vote, String> {
        let automated = self.automated.score(text);
        let duplication = self.duplication.score(text);

        for (scorer, value) in [(&self.automated, automated), (&self.duplication, duplication)] {
            if !value.is_finite() {
                return Err(format!(
                    "scorer '{}' returned a non-finite value",
                    scorer.name()
                ));
            }
        }

        let automated = automated.clamp(0.0, 100.0);
        let duplication = duplication.clamp(0.0, 100.0);
        let score = 100.0 - automated.max(duplication);

        Ok(Vote::new(
            EvaluatorRole::Integrity,
            score,
            INTEGRITY_CONFIDENCE,
            feedback(automated, duplication),
            format!(
                "automated={:.1} duplication={:.1}",
                automated, duplication
            ),
        ))
    }
}

impl Default for IntegrityEvaluator {
    fn default() -> Self {
        Self::new(
            Arc::new(PhrasePatternScorer::new()),
            Arc::new(RepeatedSentenceScorer::new()),
        )
    }
}

impl std::fmt::Debug for IntegrityEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (automated, duplication) = self.scorer_names();
        f.debug_struct("IntegrityEvaluator")
            .field("automated", &automated)
            .field("duplication", &duplication)
            .finish()
    }
}

fn feedback(automated: f64, duplication: f64) -> String {
    let automated_msg = if automated > HIGH_CONCERN {
        "High likelihood of AI-generated content detected."
    } else if automated > MODERATE_CONCERN {
        "Some patterns consistent with AI assistance detected."
    } else {
        "Content appears to be human-written."
    };

    let duplication_msg = if duplication > HIGH_CONCERN {
        "High similarity to known sources detected."
    } else if duplication > MODERATE_CONCERN {
        "Moderate similarity to existing content."
    } else {
        "No significant plagiarism detected."
    };

    format!("{} {}", automated_msg, duplication_msg)
}

#[async_trait]
impl Evaluator for IntegrityEvaluator {
    fn role(&self) -> EvaluatorRole {
        EvaluatorRole::Integrity
    }

    async fn evaluate(&self, text: &str, _context: Option<&str>) -> VoteOutcome {
        let start = Instant::now();
        let result = self.score_text(text);
        let latency = start.elapsed();

        match result {
            Ok(vote) => VoteOutcome::Counted(vote.with_latency(latency)),
            Err(cause) => {
                tracing::warn!(error = %cause, "Integrity scoring failed, recording sentinel vote");
                VoteOutcome::Sentinel {
                    vote: Vote::sentinel(EvaluatorRole::Integrity, &cause).with_latency(latency),
                    cause,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_core::FixedScorer;

    fn fixed(automated: f64, duplication: f64) -> IntegrityEvaluator {
        IntegrityEvaluator::new(
            Arc::new(FixedScorer::new("automated", automated)),
            Arc::new(FixedScorer::new("duplication", duplication)),
        )
    }

    #[tokio::test]
    async fn test_score_is_inverse_of_worst_signal() {
        let outcome = fixed(20.0, 55.0).evaluate("text", None).await;
        let vote = outcome.vote();

        assert_eq!(vote.score, 45.0);
        assert_eq!(vote.confidence, INTEGRITY_CONFIDENCE);
        assert_eq!(
            vote.feedback,
            "Content appears to be human-written. Moderate similarity to existing content."
        );
    }

    #[tokio::test]
    async fn test_high_concern_messages() {
        let vote = fixed(85.0, 90.0).evaluate("text", None).await.into_vote();
        assert_eq!(vote.score, 10.0);
        assert!(vote.feedback.contains("High likelihood of AI-generated content"));
        assert!(vote.feedback.contains("High similarity to known sources"));
    }

    #[tokio::test]
    async fn test_boundaries_are_strict() {
        let vote = fixed(70.0, 40.0).evaluate("text", None).await.into_vote();
        assert!(vote.feedback.contains("Some patterns consistent with AI assistance"));
        assert!(vote.feedback.contains("No significant plagiarism"));
    }

    #[tokio::test]
    async fn test_non_finite_scorer_gives_sentinel() {
        let outcome = fixed(f64::NAN, 10.0).evaluate("text", None).await;
        match outcome {
            VoteOutcome::Sentinel { vote, cause } => {
                assert_eq!(vote.score, 0.0);
                assert!(cause.contains("automated"));
            }
            other => panic!("expected sentinel, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_default_scorers_on_clean_text() {
        let vote = IntegrityEvaluator::default()
            .evaluate("Mitochondria produce ATP through oxidative phosphorylation.", None)
            .await
            .into_vote();
        assert_eq!(vote.score, 100.0);
        assert_eq!(vote.evaluator_name, "IntegrityGuard");
    }
}
