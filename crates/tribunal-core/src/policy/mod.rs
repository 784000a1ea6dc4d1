//! Grading policy parsing and validation.
//!
//! A grading policy is structured data validated against JSON Schema and
//! then checked semantically (weights summing to one, ordered thresholds).

mod document;
mod schema;

pub use document::{
    FlagThresholds, GradingPolicy, ModeWeights, PolicyError, Thresholds, VetoAction, VetoRule,
    WEIGHT_SUM_TOLERANCE,
};
pub use schema::{policy_schema, validate_policy_schema};
