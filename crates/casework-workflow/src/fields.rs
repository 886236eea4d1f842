//! Required-field checks over a JSON case record.

use serde_json::Value;

/// Resolve a dotted path (`core.summary`) against `record`.
///
/// Only objects are descended into; any other intermediate value ends the
/// walk with `None`.
pub fn resolve<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |node, key| match node {
        Value::Object(map) => map.get(key),
        _ => None,
    })
}

/// Whether a resolved value counts as filled in.
///
/// Strings must be non-blank, arrays non-empty, objects non-null. Numbers
/// and booleans are always present; absent and null values never are.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_) | Value::Number(_) | Value::Bool(_)) => true,
    }
}

/// Every path in `paths` that is not present on `record`, in input order.
pub fn missing_fields(record: &Value, paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| !is_present(resolve(record, p)))
        .map(|p| (*p).to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- resolve --

    #[test]
    fn resolves_nested_paths() {
        let r = json!({"core": {"summary": {"text": "ok"}}});
        assert_eq!(resolve(&r, "core.summary.text"), Some(&json!("ok")));
        assert_eq!(resolve(&r, "core.missing"), None);
    }

    #[test]
    fn stops_at_non_objects() {
        let r = json!({"tags": ["a"], "name": "x"});
        assert_eq!(resolve(&r, "tags.0"), None);
        assert_eq!(resolve(&r, "name.length"), None);
    }

    // -- presence --

    #[test]
    fn blank_strings_are_missing() {
        assert!(!is_present(Some(&json!(""))));
        assert!(!is_present(Some(&json!("   \t"))));
        assert!(is_present(Some(&json!(" x "))));
    }

    #[test]
    fn empty_arrays_are_missing() {
        assert!(!is_present(Some(&json!([]))));
        assert!(is_present(Some(&json!([0]))));
    }

    #[test]
    fn null_and_absent_are_missing() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&Value::Null)));
    }

    #[test]
    fn scalars_and_objects_are_present() {
        assert!(is_present(Some(&json!(0))));
        assert!(is_present(Some(&json!(false))));
        assert!(is_present(Some(&json!({}))));
    }

    #[test]
    fn lists_every_missing_path() {
        let r = json!({"clientId": "c1", "location": " ", "core": null});
        assert_eq!(
            missing_fields(&r, &["clientId", "assessmentType", "location", "core"]),
            vec!["assessmentType", "location", "core"]
        );
    }
}
