//! Consensus synthesis: turns the council's votes into one final grade.
//!
//! Rules, applied in order:
//! 1. If any enabled veto rule fires → grade 0, F, both flags raised
//! 2. Else → weighted sum of the four scores, clamped and rounded
//!
//! Flags, letter grade and feedback follow from the unrounded grade and the
//! integrity seat's score.

use chrono::Utc;
use thiserror::Error;

use crate::policy::{GradingPolicy, VetoAction, VetoRule};
use crate::profile::WeightingProfile;
use crate::types::{
    ConsensusMethod, CouncilVotes, EvaluatorRole, FinalEvaluation, LetterGrade, Vote,
};

/// Feedback recorded on every vetoed evaluation.
pub const VETO_FEEDBACK: &str = "Academic integrity violation detected.";

/// Maximum length (in characters) of the combined vote feedback.
pub const MAX_COMBINED_FEEDBACK: usize = 300;

/// Number of vote feedbacks folded into the final feedback.
pub const FEEDBACK_VOTES: usize = 3;

/// Errors from synthesis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("Invalid weighting profile '{profile_id}': {reason}")]
    InvalidProfile { profile_id: String, reason: String },
}

/// The ConsensusSynthesizer applies a grading policy to council votes.
#[derive(Debug, Clone)]
pub struct ConsensusSynthesizer {
    policy: GradingPolicy,
}

impl ConsensusSynthesizer {
    pub fn new(policy: GradingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    /// Synthesize the four votes into a final evaluation.
    ///
    /// # Arguments
    ///
    /// * `votes` - The council's votes in role order
    /// * `profile` - Weights to apply; omitted weights count as 0.25
    ///
    /// # Errors
    ///
    /// `SynthesisError::InvalidProfile` when a weight or the veto threshold
    /// override is negative or non-finite.
    pub fn synthesize(
        &self,
        votes: &CouncilVotes,
        profile: &WeightingProfile,
    ) -> Result<FinalEvaluation, SynthesisError> {
        self.check_profile(profile)?;

        let low_confidence_roles = self.low_confidence_roles(votes);

        if let Some((rule_name, rule)) = self.find_veto(votes, profile) {
            tracing::warn!(
                rule = rule_name,
                role = %rule.evaluator,
                score = votes.get(rule.evaluator).score,
                "Veto rule fired"
            );

            return Ok(match rule.action {
                VetoAction::ZeroScore => FinalEvaluation {
                    final_grade: 0.0,
                    letter_grade: LetterGrade::F,
                    feedback: VETO_FEEDBACK.to_string(),
                    votes: votes.to_array(),
                    consensus_method: ConsensusMethod::Veto,
                    integrity_flag: true,
                    automated_content_flag: true,
                    passed: false,
                    low_confidence_roles,
                    profile_id: profile.profile_id.clone(),
                    evaluated_at: Utc::now(),
                },
            });
        }

        // Letter, tier and pass/fail use the unrounded grade.
        let grade = self.weighted_sum(votes, profile).clamp(0.0, 100.0);
        let integrity = votes.integrity.score;

        Ok(FinalEvaluation {
            final_grade: round_one_decimal(grade),
            letter_grade: LetterGrade::from_score(grade),
            feedback: self.compose_feedback(votes, grade),
            votes: votes.to_array(),
            consensus_method: ConsensusMethod::WeightedAverage,
            integrity_flag: integrity < self.policy.flags.integrity_below,
            automated_content_flag: integrity < self.policy.flags.automated_content_below,
            passed: grade >= self.policy.thresholds.passing_grade,
            low_confidence_roles,
            profile_id: profile.profile_id.clone(),
            evaluated_at: Utc::now(),
        })
    }

    fn check_profile(&self, profile: &WeightingProfile) -> Result<(), SynthesisError> {
        let invalid = |reason: String| SynthesisError::InvalidProfile {
            profile_id: profile.profile_id.clone(),
            reason,
        };

        let weights = profile.resolved_weights();
        for role in EvaluatorRole::ALL {
            let w = weights.get(role);
            if !w.is_finite() || w < 0.0 {
                return Err(invalid(format!("{} weight is {}", role, w)));
            }
        }

        if let Some(threshold) = profile.veto_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(invalid(format!("veto threshold is {}", threshold)));
            }
        }

        Ok(())
    }

    /// First enabled veto rule whose seat scored below its threshold.
    fn find_veto<'a>(
        &'a self,
        votes: &CouncilVotes,
        profile: &WeightingProfile,
    ) -> Option<(&'a str, &'a VetoRule)> {
        self.policy.active_veto_rules().find(|(_, rule)| {
            let threshold = match (rule.evaluator, profile.veto_threshold) {
                (EvaluatorRole::Integrity, Some(overridden)) => overridden,
                _ => rule.threshold,
            };
            votes.get(rule.evaluator).score < threshold
        })
    }

    fn weighted_sum(&self, votes: &CouncilVotes, profile: &WeightingProfile) -> f64 {
        let weights = profile.resolved_weights();
        votes
            .iter()
            .map(|vote| vote.score * weights.get(vote.role))
            .sum()
    }

    fn low_confidence_roles(&self, votes: &CouncilVotes) -> Vec<EvaluatorRole> {
        let minimum = self.policy.thresholds.minimum_confidence;
        votes
            .iter()
            .filter(|v| v.confidence < minimum)
            .map(|v| v.role)
            .collect()
    }

    /// Tier prefix plus the first few non-empty vote feedbacks.
    fn compose_feedback(&self, votes: &CouncilVotes, grade: f64) -> String {
        let thresholds = &self.policy.thresholds;
        let prefix = if grade >= thresholds.excellent_grade {
            "Excellent work! "
        } else if grade >= thresholds.passing_grade {
            "Good effort. "
        } else {
            "This needs significant improvement. "
        };

        let combined = votes
            .iter()
            .map(|v: &Vote| v.feedback.as_str())
            .filter(|f| !f.trim().is_empty())
            .take(FEEDBACK_VOTES)
            .collect::<Vec<_>>()
            .join(" ");

        let truncated: String = combined.chars().take(MAX_COMBINED_FEEDBACK).collect();
        format!("{}{}", prefix, truncated)
    }
}

impl Default for ConsensusSynthesizer {
    fn default() -> Self {
        Self::new(GradingPolicy::default())
    }
}

/// One decimal, halves to even.
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
