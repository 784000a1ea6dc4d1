//! JSON Schema validation for grading policies.
//!
//! Policies are validated against schema/grading_policy.schema.json before
//! they are deserialized, so structural mistakes are reported with the
//! offending path instead of a bare serde message.

use std::sync::OnceLock;

/// Embedded policy schema (loaded at compile time).
const POLICY_SCHEMA_JSON: &str = include_str!("../../../../schema/grading_policy.schema.json");

/// Compiled validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(POLICY_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a policy document against the schema.
///
/// Returns every violation found, each suffixed with its instance path.
pub fn validate_policy_schema(policy_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(policy_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The raw schema text, for `tribunal policy show --schema`.
pub fn policy_schema() -> &'static str {
    POLICY_SCHEMA_JSON
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "policy_version": "1.0",
            "default_mode": "balanced",
            "grading_modes": {
                "balanced": {
                    "fact_weight": 0.25,
                    "structure_weight": 0.25,
                    "critical_weight": 0.25,
                    "integrity_weight": 0.25
                }
            }
        })
    }

    #[test]
    fn test_minimal_policy_passes_schema() {
        assert!(validate_policy_schema(&minimal()).is_ok());
    }

    #[test]
    fn test_missing_grading_modes_fails() {
        let value = json!({ "policy_version": "1.0", "default_mode": "balanced" });
        let errors = validate_policy_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_negative_weight_fails() {
        let mut value = minimal();
        value["grading_modes"]["balanced"]["fact_weight"] = json!(-0.1);
        let errors = validate_policy_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("fact_weight")));
    }

    #[test]
    fn test_unknown_veto_role_fails() {
        let mut value = minimal();
        value["veto_rules"] = json!({
            "style_veto": { "evaluator": "style", "threshold": 20 }
        });
        assert!(validate_policy_schema(&value).is_err());
    }

    #[test]
    fn test_veto_threshold_out_of_range_fails() {
        let mut value = minimal();
        value["veto_rules"] = json!({
            "integrity_veto": { "evaluator": "integrity", "threshold": 130 }
        });
        assert!(validate_policy_schema(&value).is_err());
    }

    #[test]
    fn test_additional_properties_fail() {
        let mut value = minimal();
        value["unknown_field"] = json!("should fail");
        assert!(validate_policy_schema(&value).is_err());
    }

    #[test]
    fn test_invalid_version_format_fails() {
        let mut value = minimal();
        value["policy_version"] = json!("latest");
        assert!(validate_policy_schema(&value).is_err());
    }
}
