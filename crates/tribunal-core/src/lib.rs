//! # tribunal-core
//!
//! Deterministic consensus synthesis for the Tribunal evaluation council.
//!
//! This crate holds everything that does not touch the network:
//! - the vote and result data model
//! - grading policies (weights per mode, veto rules, thresholds)
//! - weighting profiles
//! - heuristic content scorers
//! - the [`ConsensusSynthesizer`]
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same votes and profile give the same grade
//! 2. **Veto first**: an integrity veto overrides any weighted grade
//! 3. **Bounded**: final grades always lie in [0, 100]
//!
//! ## Example
//!
//! ```rust,ignore
//! use tribunal_core::{ConsensusSynthesizer, GradingPolicy};
//!
//! let policy = GradingPolicy::from_yaml_file("grading_policy.yaml")?;
//! let profile = policy.profile_for_mode("balanced")?;
//! let synthesizer = ConsensusSynthesizer::new(policy);
//! let result = synthesizer.synthesize(&votes, &profile)?;
//! println!("{} ({})", result.final_grade, result.letter_grade);
//! ```

pub mod heuristics;
pub mod policy;
pub mod profile;
pub mod synthesizer;
pub mod types;

pub use heuristics::{FixedScorer, HeuristicScorer, PhrasePatternScorer, RepeatedSentenceScorer};
pub use policy::{GradingPolicy, PolicyError, VetoAction, VetoRule};
pub use profile::{CategoryWeights, WeightingProfile};
pub use synthesizer::{ConsensusSynthesizer, SynthesisError};
pub use types::{
    ConsensusMethod, CouncilVotes, EvaluatorRole, FinalEvaluation, LetterGrade, Vote, VoteOutcome,
};
