//! Weighting profiles: how one grader wants the four seats weighed.

use serde::{Deserialize, Serialize};

use crate::types::EvaluatorRole;

/// Weight applied to a seat the profile leaves unspecified.
pub const DEFAULT_WEIGHT: f64 = 0.25;

/// Profile id used when the persona provider cannot supply one.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// Resolved per-seat weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub fact_weight: f64,
    pub structure_weight: f64,
    pub critical_weight: f64,
    pub integrity_weight: f64,
}

impl CategoryWeights {
    /// Equal weights, 0.25 each.
    pub fn equal() -> Self {
        Self {
            fact_weight: DEFAULT_WEIGHT,
            structure_weight: DEFAULT_WEIGHT,
            critical_weight: DEFAULT_WEIGHT,
            integrity_weight: DEFAULT_WEIGHT,
        }
    }

    pub fn get(&self, role: EvaluatorRole) -> f64 {
        match role {
            EvaluatorRole::Fact => self.fact_weight,
            EvaluatorRole::Structure => self.structure_weight,
            EvaluatorRole::Critical => self.critical_weight,
            EvaluatorRole::Integrity => self.integrity_weight,
        }
    }

    pub fn sum(&self) -> f64 {
        EvaluatorRole::ALL.iter().map(|r| self.get(*r)).sum()
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self::equal()
    }
}

/// Style metadata carried along with a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStyle {
    /// Preferred feedback tone (e.g. "constructive")
    #[serde(default)]
    pub tone: Option<String>,

    /// Things this grader is known to penalize
    #[serde(default)]
    pub pet_peeves: Vec<String>,
}

/// A weighting profile as supplied by the persona provider.
///
/// Any weight may be omitted; the synthesizer substitutes
/// [`DEFAULT_WEIGHT`] for it and never assumes the weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingProfile {
    pub profile_id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Grading mode the weights were derived from, if any
    #[serde(default)]
    pub grading_mode: Option<String>,

    #[serde(default)]
    pub fact_weight: Option<f64>,

    #[serde(default)]
    pub structure_weight: Option<f64>,

    #[serde(default)]
    pub critical_weight: Option<f64>,

    #[serde(default)]
    pub integrity_weight: Option<f64>,

    /// Overrides the threshold of integrity veto rules
    #[serde(default)]
    pub veto_threshold: Option<f64>,

    #[serde(default)]
    pub style: ProfileStyle,
}

impl WeightingProfile {
    /// A profile with no explicit weights.
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            display_name: None,
            grading_mode: None,
            fact_weight: None,
            structure_weight: None,
            critical_weight: None,
            integrity_weight: None,
            veto_threshold: None,
            style: ProfileStyle::default(),
        }
    }

    /// The equal-weight fallback profile.
    pub fn equal_weights() -> Self {
        Self::new(DEFAULT_PROFILE_ID).with_weights(CategoryWeights::equal())
    }

    /// Set all four weights.
    pub fn with_weights(mut self, weights: CategoryWeights) -> Self {
        self.fact_weight = Some(weights.fact_weight);
        self.structure_weight = Some(weights.structure_weight);
        self.critical_weight = Some(weights.critical_weight);
        self.integrity_weight = Some(weights.integrity_weight);
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.grading_mode = Some(mode.into());
        self
    }

    pub fn with_veto_threshold(mut self, threshold: f64) -> Self {
        self.veto_threshold = Some(threshold);
        self
    }

    /// Weights with omitted entries replaced by [`DEFAULT_WEIGHT`].
    pub fn resolved_weights(&self) -> CategoryWeights {
        CategoryWeights {
            fact_weight: self.fact_weight.unwrap_or(DEFAULT_WEIGHT),
            structure_weight: self.structure_weight.unwrap_or(DEFAULT_WEIGHT),
            critical_weight: self.critical_weight.unwrap_or(DEFAULT_WEIGHT),
            integrity_weight: self.integrity_weight.unwrap_or(DEFAULT_WEIGHT),
        }
    }

    /// Fill the weights this profile leaves unspecified from `weights`.
    pub fn fill_missing(mut self, weights: &CategoryWeights) -> Self {
        self.fact_weight.get_or_insert(weights.fact_weight);
        self.structure_weight.get_or_insert(weights.structure_weight);
        self.critical_weight.get_or_insert(weights.critical_weight);
        self.integrity_weight.get_or_insert(weights.integrity_weight);
        self
    }
}
