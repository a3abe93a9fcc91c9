//! Credential and required-environment checks on the merged `containerEnv`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static CREDENTIAL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pass(word)?|secret|token").expect("credential pattern is valid"));

/// Whether an environment variable name looks like it holds a credential.
#[must_use]
pub fn is_credential_key(key: &str) -> bool {
    CREDENTIAL_KEY.is_match(key)
}

/// Warns about credential-like variables a sidecar introduced that still carry a
/// known default value in the merged configuration.
///
/// A variable is reported when its name looks like a credential, the sidecar's
/// value matches one of `defaults` (case-insensitively), and the merged
/// `containerEnv` still holds that same value.
#[must_use]
pub fn default_credential_notes(
    label: &str,
    sidecar_env: &BTreeMap<String, String>,
    merged_env: &Map<String, Value>,
    defaults: &[String],
) -> Vec<String> {
    sidecar_env
        .iter()
        .filter(|(key, _)| is_credential_key(key))
        .filter(|(_, value)| defaults.iter().any(|d| d.eq_ignore_ascii_case(value)))
        .filter(|(key, value)| merged_env.get(key.as_str()).and_then(Value::as_str) == Some(value.as_str()))
        .map(|(key, _)| format!("{label} uses default credential {key}; override it before sharing a workspace."))
        .collect()
}

/// Reports required variables that are absent or empty in the merged `containerEnv`.
#[must_use]
pub fn missing_required_env(label: &str, required: &[String], merged_env: &Map<String, Value>) -> Option<String> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|key| match merged_env.get(key.as_str()) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        None
    } else {
        Some(format!(
            "{label} requires environment variables not set in containerEnv: {}",
            missing.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> Vec<String> {
        crate::constants::DEFAULT_CREDENTIAL_VALUES.iter().map(|s| (*s).to_string()).collect()
    }

    fn env(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_credential_key_detection() {
        assert!(is_credential_key("NEKO_PASSWORD"));
        assert!(is_credential_key("kasm_pass"));
        assert!(is_credential_key("API_SECRET"));
        assert!(is_credential_key("ADMIN_TOKEN"));
        assert!(!is_credential_key("NEXT_DEV_PORT"));
    }

    #[test]
    fn test_default_credential_warned() {
        let sidecar = BTreeMap::from([("TEST_BROWSER_PASSWORD".to_string(), "student".to_string())]);
        let merged = env(json!({"TEST_BROWSER_PASSWORD": "student"}));
        let notes = default_credential_notes("Test Browser", &sidecar, &merged, &defaults());
        assert_eq!(
            notes,
            vec!["Test Browser uses default credential TEST_BROWSER_PASSWORD; override it before sharing a workspace."]
        );
    }

    #[test]
    fn test_overridden_credential_is_silent() {
        let sidecar = BTreeMap::from([("NEKO_PASSWORD".to_string(), "student".to_string())]);
        let merged = env(json!({"NEKO_PASSWORD": "s3cure"}));
        assert!(default_credential_notes("Neko", &sidecar, &merged, &defaults()).is_empty());
    }

    #[test]
    fn test_non_default_values_are_silent() {
        let sidecar = BTreeMap::from([
            ("NEKO_PASSWORD".to_string(), "generated-value".to_string()),
            ("NEKO_SCREEN".to_string(), "admin".to_string()),
        ]);
        let merged = env(json!({"NEKO_PASSWORD": "generated-value", "NEKO_SCREEN": "admin"}));
        assert!(default_credential_notes("Neko", &sidecar, &merged, &defaults()).is_empty());
    }

    #[test]
    fn test_default_match_ignores_case() {
        let sidecar = BTreeMap::from([("ADMIN_PASS".to_string(), "ChangeMe".to_string())]);
        let merged = env(json!({"ADMIN_PASS": "ChangeMe"}));
        assert_eq!(default_credential_notes("Kasm", &sidecar, &merged, &defaults()).len(), 1);
    }

    #[test]
    fn test_missing_required_env() {
        let merged = env(json!({"PRESENT": "yes", "EMPTY": ""}));
        let required = vec!["ADMIN_TOKEN".to_string(), "PRESENT".to_string(), "EMPTY".to_string()];
        let note = missing_required_env("Kasm Chrome", &required, &merged).unwrap();
        assert_eq!(note, "Kasm Chrome requires environment variables not set in containerEnv: ADMIN_TOKEN, EMPTY");
        assert!(missing_required_env("Kasm Chrome", &["PRESENT".to_string()], &merged).is_none());
    }
}
