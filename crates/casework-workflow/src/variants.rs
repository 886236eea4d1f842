//! Extra completeness rules for specific assessment variants.
//!
//! Applied to `submit_review` only, after the generic required-field check.

use serde_json::Value;

use crate::fields::resolve;
use crate::types::AssessmentVariant;

/// A sub-structure a variant must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantRule {
    /// Variant the rule applies to.
    pub variant: AssessmentVariant,
    /// Field that must be a non-null object.
    pub field: &'static str,
    /// Message shown when it is not.
    pub message: &'static str,
}

/// Every variant rule.
pub const VARIANT_RULES: &[VariantRule] = &[
    VariantRule {
        variant: AssessmentVariant::IhaForm1,
        field: "form1",
        message: "Form1 assessment data is required",
    },
    VariantRule {
        variant: AssessmentVariant::IhaCat,
        field: "cat",
        message: "CAT assessment data is required",
    },
    VariantRule {
        variant: AssessmentVariant::IhaCatSit,
        field: "cat",
        message: "CAT assessment data is required",
    },
];

/// The record's variant, if `assessmentType` names a known one.
pub fn variant_of(record: &Value) -> Option<AssessmentVariant> {
    record
        .get("assessmentType")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

/// The first rule `record` violates.
pub fn violated_rule(record: &Value) -> Option<&'static VariantRule> {
    let variant = variant_of(record)?;
    VARIANT_RULES
        .iter()
        .filter(|r| r.variant == variant)
        .find(|r| !matches!(resolve(record, r.field), Some(Value::Object(_))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form1_needs_form1_object() {
        let r = json!({"assessmentType": "IHA_FORM1"});
        assert_eq!(violated_rule(&r).unwrap().field, "form1");
        let r = json!({"assessmentType": "IHA_FORM1", "form1": {"section": 1}});
        assert!(violated_rule(&r).is_none());
    }

    #[test]
    fn cat_variants_need_cat_object() {
        for variant in ["IHA_CAT", "IHA_CAT_SIT"] {
            let r = json!({"assessmentType": variant, "cat": null});
            assert_eq!(violated_rule(&r).unwrap().message, "CAT assessment data is required");
        }
    }

    #[test]
    fn non_object_does_not_satisfy_rule() {
        let r = json!({"assessmentType": "IHA_CAT", "cat": "yes"});
        assert!(violated_rule(&r).is_some());
    }

    #[test]
    fn basic_and_unknown_variants_have_no_rule() {
        assert!(violated_rule(&json!({"assessmentType": "BASIC_IHA"})).is_none());
        assert!(violated_rule(&json!({"assessmentType": "SOMETHING_ELSE"})).is_none());
        assert!(violated_rule(&json!({})).is_none());
    }
}
