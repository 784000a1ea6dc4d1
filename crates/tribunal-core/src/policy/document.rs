//! Grading policy parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_policy_schema;
use crate::profile::{CategoryWeights, WeightingProfile};
use crate::types::EvaluatorRole;

/// Policy shipped with the crate.
const BUILTIN_POLICY_YAML: &str = include_str!("../../../../config/grading_policy.yaml");

/// Tolerance on the sum of a mode's weights.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Errors that can occur when loading a grading policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Policy does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Policy validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown grading mode: {0}")]
    UnknownMode(String),
}

/// Weights of one grading mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeWeights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub weights: CategoryWeights,
}

/// What a triggered veto does to the grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoAction {
    /// Final grade 0, letter F, both flags raised
    ZeroScore,
}

/// Override rule: a seat scoring below `threshold` vetoes the weighted grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VetoRule {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seat whose score is checked
    pub evaluator: EvaluatorRole,

    /// Scores strictly below this trigger the veto
    pub threshold: f64,

    #[serde(default = "default_veto_action")]
    pub action: VetoAction,
}

fn default_true() -> bool {
    true
}

fn default_veto_action() -> VetoAction {
    VetoAction::ZeroScore
}

/// Grade thresholds for tiers and pass/fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_passing_grade")]
    pub passing_grade: f64,

    #[serde(default = "default_excellent_grade")]
    pub excellent_grade: f64,

    /// Votes below this confidence are reported as low-confidence
    #[serde(default = "default_minimum_confidence")]
    pub minimum_confidence: f64,
}

fn default_passing_grade() -> f64 {
    60.0
}

fn default_excellent_grade() -> f64 {
    80.0
}

fn default_minimum_confidence() -> f64 {
    0.5
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            passing_grade: default_passing_grade(),
            excellent_grade: default_excellent_grade(),
            minimum_confidence: default_minimum_confidence(),
        }
    }
}

/// Integrity-score thresholds for the two result flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagThresholds {
    #[serde(default = "default_integrity_below")]
    pub integrity_below: f64,

    #[serde(default = "default_automated_content_below")]
    pub automated_content_below: f64,
}

fn default_integrity_below() -> f64 {
    50.0
}

fn default_automated_content_below() -> f64 {
    70.0
}

impl Default for FlagThresholds {
    fn default() -> Self {
        Self {
            integrity_below: default_integrity_below(),
            automated_content_below: default_automated_content_below(),
        }
    }
}

/// A grading policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingPolicy {
    pub policy_version: String,

    /// Mode used when a profile names none
    pub default_mode: String,

    pub grading_modes: BTreeMap<String, ModeWeights>,

    #[serde(default)]
    pub veto_rules: BTreeMap<String, VetoRule>,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub flags: FlagThresholds,

    /// Profiles served by the policy-backed persona provider
    #[serde(default)]
    pub personas: BTreeMap<String, WeightingProfile>,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        fn mode(description: &str, f: f64, s: f64, c: f64, i: f64) -> ModeWeights {
            ModeWeights {
                description: Some(description.to_string()),
                weights: CategoryWeights {
                    fact_weight: f,
                    structure_weight: s,
                    critical_weight: c,
                    integrity_weight: i,
                },
            }
        }

        let mut grading_modes = BTreeMap::new();
        grading_modes.insert(
            "strict".to_string(),
            mode("Emphasizes factual accuracy and critical thinking", 0.40, 0.20, 0.30, 0.10),
        );
        grading_modes.insert(
            "balanced".to_string(),
            mode("Even emphasis across all evaluation criteria", 0.35, 0.25, 0.25, 0.15),
        );
        grading_modes.insert(
            "creative".to_string(),
            mode("Rewards original thinking over rigid structure", 0.20, 0.25, 0.35, 0.20),
        );
        grading_modes.insert(
            "lenient".to_string(),
            mode("Forgiving of minor errors, rewards effort", 0.30, 0.30, 0.20, 0.20),
        );

        let mut veto_rules = BTreeMap::new();
        veto_rules.insert(
            "integrity_veto".to_string(),
            VetoRule {
                enabled: true,
                evaluator: EvaluatorRole::Integrity,
                threshold: 30.0,
                action: VetoAction::ZeroScore,
            },
        );

        Self {
            policy_version: "1.0".to_string(),
            default_mode: "balanced".to_string(),
            grading_modes,
            veto_rules,
            thresholds: Thresholds::default(),
            flags: FlagThresholds::default(),
            personas: BTreeMap::new(),
        }
    }
}

impl GradingPolicy {
    /// Parse a policy from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a policy from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a policy from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a policy from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a policy file, choosing the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    /// The policy embedded in the crate.
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::from_yaml(BUILTIN_POLICY_YAML)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, PolicyError> {
        validate_policy_schema(&value).map_err(PolicyError::SchemaError)?;
        let policy: GradingPolicy = serde_json::from_value(value)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Semantic checks the schema cannot express.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.grading_modes.is_empty() {
            return Err(PolicyError::ValidationError(
                "at least one grading mode is required".to_string(),
            ));
        }

        for (name, mode) in &self.grading_modes {
            validate_weights(name, &mode.weights)?;
        }

        if !self.grading_modes.contains_key(&self.default_mode) {
            return Err(PolicyError::UnknownMode(self.default_mode.clone()));
        }

        for (name, rule) in &self.veto_rules {
            if !in_grade_range(rule.threshold) {
                return Err(PolicyError::ValidationError(format!(
                    "veto rule '{}' threshold {} is outside [0, 100]",
                    name, rule.threshold
                )));
            }
        }

        let t = &self.thresholds;
        if !in_grade_range(t.passing_grade) || !in_grade_range(t.excellent_grade) {
            return Err(PolicyError::ValidationError(
                "grade thresholds must lie in [0, 100]".to_string(),
            ));
        }
        if t.passing_grade > t.excellent_grade {
            return Err(PolicyError::ValidationError(format!(
                "passing_grade ({}) exceeds excellent_grade ({})",
                t.passing_grade, t.excellent_grade
            )));
        }
        if !(0.0..=1.0).contains(&t.minimum_confidence) {
            return Err(PolicyError::ValidationError(
                "minimum_confidence must lie in [0, 1]".to_string(),
            ));
        }

        if !in_grade_range(self.flags.integrity_below)
            || !in_grade_range(self.flags.automated_content_below)
        {
            return Err(PolicyError::ValidationError(
                "flag thresholds must lie in [0, 100]".to_string(),
            ));
        }

        for (key, persona) in &self.personas {
            if let Some(mode) = &persona.grading_mode {
                if !self.grading_modes.contains_key(mode) {
                    return Err(PolicyError::ValidationError(format!(
                        "persona '{}' names unknown grading mode '{}'",
                        key, mode
                    )));
                }
            }
        }

        Ok(())
    }

    /// Weights of a named mode.
    pub fn mode(&self, name: &str) -> Result<&CategoryWeights, PolicyError> {
        self.grading_modes
            .get(name)
            .map(|m| &m.weights)
            .ok_or_else(|| PolicyError::UnknownMode(name.to_string()))
    }

    /// Weights of the default mode.
    pub fn default_weights(&self) -> CategoryWeights {
        self.grading_modes
            .get(&self.default_mode)
            .map(|m| m.weights)
            .unwrap_or_default()
    }

    /// A profile carrying a mode's weights.
    pub fn profile_for_mode(&self, name: &str) -> Result<WeightingProfile, PolicyError> {
        let weights = *self.mode(name)?;
        Ok(WeightingProfile::new(name)
            .with_mode(name)
            .with_weights(weights))
    }

    /// Look up a persona, filling unspecified weights from its grading mode
    /// (or the default mode).
    pub fn persona(&self, profile_id: &str) -> Option<WeightingProfile> {
        let persona = self
            .personas
            .values()
            .find(|p| p.profile_id == profile_id)
            .or_else(|| self.personas.get(profile_id))?
            .clone();

        let base = persona
            .grading_mode
            .as_deref()
            .and_then(|m| self.grading_modes.get(m))
            .map(|m| m.weights)
            .unwrap_or_else(|| self.default_weights());

        Some(persona.fill_missing(&base))
    }

    /// Enabled veto rules, in name order.
    pub fn active_veto_rules(&self) -> impl Iterator<Item = (&str, &VetoRule)> {
        self.veto_rules
            .iter()
            .filter(|(_, rule)| rule.enabled)
            .map(|(name, rule)| (name.as_str(), rule))
    }
}

fn in_grade_range(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}

fn validate_weights(mode: &str, weights: &CategoryWeights) -> Result<(), PolicyError> {
    for role in EvaluatorRole::ALL {
        let w = weights.get(role);
        if !w.is_finite() || w < 0.0 {
            return Err(PolicyError::ValidationError(format!(
                "mode '{}' has invalid {} weight {}",
                mode, role, w
            )));
        }
    }

    let sum = weights.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(PolicyError::ValidationError(format!(
            "mode '{}' weights sum to {:.3}, expected 1.0",
            mode, sum
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_POLICY: &str = r#"
policy_version: "1.0"
default_mode: balanced
grading_modes:
  balanced:
    fact_weight: 0.35
    structure_weight: 0.25
    critical_weight: 0.25
    integrity_weight: 0.15
"#;

    #[test]
    fn test_builtin_policy_matches_default() {
        let builtin = GradingPolicy::builtin().unwrap();
        assert_eq!(builtin, GradingPolicy::default());
    }

    #[test]
    fn test_every_builtin_mode_sums_to_one() {
        let policy = GradingPolicy::builtin().unwrap();
        assert_eq!(policy.grading_modes.len(), 4);
        for (name, mode) in &policy.grading_modes {
            let sum = mode.weights.sum();
            assert!(
                (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
                "mode {} sums to {}",
                name,
                sum
            );
        }
    }

    #[test]
    fn test_minimal_policy_gets_defaults() {
        let policy = GradingPolicy::from_yaml(MINIMAL_POLICY).unwrap();
        assert!(policy.veto_rules.is_empty());
        assert_eq!(policy.thresholds.passing_grade, 60.0);
        assert_eq!(policy.flags.automated_content_below, 70.0);
    }

    #[test]
    fn test_weights_not_summing_to_one_rejected() {
        let yaml = MINIMAL_POLICY.replace("integrity_weight: 0.15", "integrity_weight: 0.45");
        let result = GradingPolicy::from_yaml(&yaml);
        assert!(matches!(result, Err(PolicyError::ValidationError(_))));
    }

    #[test]
    fn test_unknown_default_mode_rejected() {
        let yaml = MINIMAL_POLICY.replace("default_mode: balanced", "default_mode: harsh");
        let result = GradingPolicy::from_yaml(&yaml);
        assert!(matches!(result, Err(PolicyError::UnknownMode(m)) if m == "harsh"));
    }

    #[test]
    fn test_schema_violation_reported_before_deserialization() {
        let yaml = MINIMAL_POLICY.replace("fact_weight: 0.35", "fact_weight: high");
        let result = GradingPolicy::from_yaml(&yaml);
        assert!(matches!(result, Err(PolicyError::SchemaError(_))));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let yaml = format!(
            "{}thresholds:\n  passing_grade: 85\n  excellent_grade: 80\n",
            MINIMAL_POLICY
        );
        let result = GradingPolicy::from_yaml(&yaml);
        assert!(matches!(result, Err(PolicyError::ValidationError(_))));
    }

    #[test]
    fn test_json_policy_parses() {
        let json = r#"{
            "policy_version": "2.1",
            "default_mode": "even",
            "grading_modes": {
                "even": {
                    "fact_weight": 0.25,
                    "structure_weight": 0.25,
                    "critical_weight": 0.25,
                    "integrity_weight": 0.25
                }
            }
        }"#;
        let policy = GradingPolicy::from_json(json).unwrap();
        assert_eq!(policy.default_weights(), CategoryWeights::equal());
    }

    #[test]
    fn test_persona_fills_weights_from_its_mode() {
        let yaml = format!(
            "{}  strict:\n    fact_weight: 0.4\n    structure_weight: 0.2\n    critical_weight: 0.3\n    integrity_weight: 0.1\npersonas:\n  ms_rivera:\n    profile_id: instructor_042\n    grading_mode: strict\n    fact_weight: 0.5\n",
            MINIMAL_POLICY
        );
        let policy = GradingPolicy::from_yaml(&yaml).unwrap();

        let persona = policy.persona("instructor_042").unwrap();
        assert_eq!(persona.fact_weight, Some(0.5));
        assert_eq!(persona.critical_weight, Some(0.3));

        // Lookup by map key works too
        assert!(policy.persona("ms_rivera").is_some());
        assert!(policy.persona("nobody").is_none());
    }

    #[test]
    fn test_persona_with_unknown_mode_rejected() {
        let yaml = format!(
            "{}personas:\n  p:\n    profile_id: p1\n    grading_mode: harsh\n",
            MINIMAL_POLICY
        );
        let result = GradingPolicy::from_yaml(&yaml);
        assert!(matches!(result, Err(PolicyError::ValidationError(_))));
    }

    #[test]
    fn test_profile_for_mode() {
        let policy = GradingPolicy::default();
        let profile = policy.profile_for_mode("strict").unwrap();
        assert_eq!(profile.fact_weight, Some(0.40));
        assert_eq!(profile.grading_mode.as_deref(), Some("strict"));
        assert!(matches!(
            policy.profile_for_mode("harsh"),
            Err(PolicyError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_disabled_veto_rules_skipped() {
        let mut policy = GradingPolicy::default();
        assert_eq!(policy.active_veto_rules().count(), 1);
        if let Some(rule) = policy.veto_rules.get_mut("integrity_veto") {
            rule.enabled = false;
        }
        assert_eq!(policy.active_veto_rules().count(), 0);
    }
}
