//! Devcontainer configuration documents.
//!
//! A [`DevcontainerDocument`] is a `devcontainer.json` that has been through the
//! [`PlaceholderVault`]: its template directives are swapped for tokens so the
//! tree can be merged with `serde_json`, and [`DevcontainerDocument::render`] puts
//! them back once the merge is done.

pub mod merge;

pub use merge::{DevcontainerMerge, merge_devcontainer};

use serde_json::{Map, Value};

use crate::core::DevcError;
use crate::vault::{PlaceholderVault, SectionAnchor};

/// A parsed devcontainer configuration with its template sections.
#[derive(Debug, Clone)]
pub struct DevcontainerDocument {
    root: Map<String, Value>,
    sections: Vec<SectionAnchor>,
    file: String,
}

impl DevcontainerDocument {
    /// Protects and parses `text`.
    ///
    /// # Errors
    ///
    /// Propagates vault errors (unbalanced or unanchored sections, invalid JSON) and
    /// rejects documents whose top-level value is not an object.
    pub fn parse(text: &str, file: &str, vault: &mut PlaceholderVault) -> Result<Self, DevcError> {
        let protected = vault.protect(text, file)?;
        let Value::Object(root) = protected.value else {
            return Err(DevcError::InvalidTemplate {
                file: file.to_string(),
                reason: "top-level value must be a JSON object".to_string(),
            });
        };
        Ok(Self {
            root,
            sections: protected.sections,
            file: file.to_string(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn sections(&self) -> &[SectionAnchor] {
        &self.sections
    }

    /// Drops this document's conditional sections, returning them.
    pub fn take_sections(&mut self) -> Vec<SectionAnchor> {
        std::mem::take(&mut self.sections)
    }

    /// Copy of an array field; empty when missing or not an array.
    #[must_use]
    pub fn array(&self, key: &str) -> Vec<Value> {
        self.root.get(key).and_then(Value::as_array).cloned().unwrap_or_default()
    }

    /// Copy of an object field; empty when missing or not an object.
    #[must_use]
    pub fn object(&self, key: &str) -> Map<String, Value> {
        self.root.get(key).and_then(Value::as_object).cloned().unwrap_or_default()
    }

    /// Sets a top-level field, keeping its position when it already exists.
    pub fn set(&mut self, key: &str, value: Value) {
        self.root.insert(key.to_string(), value);
    }

    /// Merges another configuration tree into this one, returning policy warnings.
    pub fn merge_from(&mut self, addition: &Value) -> Vec<String> {
        let base = Value::Object(std::mem::take(&mut self.root));
        let result = merge_devcontainer(&base, addition);
        if let Value::Object(merged) = result.merged {
            self.root = merged;
        }
        result.warnings
    }

    /// Serializes as two-space indented JSON and restores template directives.
    ///
    /// The result always ends with a newline.
    ///
    /// # Errors
    ///
    /// Returns [`DevcError::SectionRestoreFailed`] when a conditional section can no
    /// longer be placed, or [`DevcError::LeakedPlaceholder`] if a token survives.
    pub fn render(&self, vault: &PlaceholderVault) -> Result<String, DevcError> {
        let serialized = serde_json::to_string_pretty(&self.root).map_err(|e| DevcError::Other {
            message: format!("Failed to serialize {}: {e}", self.file),
        })?;
        let mut restored = vault.restore(&serialized, &self.sections)?;
        if !restored.ends_with('\n') {
            restored.push('\n');
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEMPLATE: &str = r#"{
  "name": "{{templateOption.name}}",
{{#templateOption.usePrebuiltImage}}
  "image": "ghcr.io/example/dev-web:latest",
{{/templateOption.usePrebuiltImage}}
  "forwardPorts": [
    3000
  ]
}
"#;

    #[test]
    fn test_render_without_changes_is_identical() {
        let mut vault = PlaceholderVault::new();
        let document = DevcontainerDocument::parse(TEMPLATE, "devcontainer.json", &mut vault).unwrap();
        assert_eq!(document.render(&vault).unwrap(), TEMPLATE);
    }

    #[test]
    fn test_merge_then_render_keeps_directives() {
        let mut vault = PlaceholderVault::new();
        let mut document = DevcontainerDocument::parse(TEMPLATE, "devcontainer.json", &mut vault).unwrap();
        let warnings = document.merge_from(&json!({"forwardPorts": [45000], "runServices": ["browser"]}));
        assert!(warnings.is_empty());

        let rendered = document.render(&vault).unwrap();
        assert!(rendered.starts_with("{\n  \"name\": \"{{templateOption.name}}\",\n{{#templateOption.usePrebuiltImage}}\n"));
        assert!(rendered.contains("  \"forwardPorts\": [\n    3000,\n    45000\n  ],"));
        assert!(rendered.ends_with("  \"runServices\": [\n    \"browser\"\n  ]\n}\n"));
    }

    #[test]
    fn test_field_accessors() {
        let mut vault = PlaceholderVault::new();
        let mut document = DevcontainerDocument::parse(TEMPLATE, "devcontainer.json", &mut vault).unwrap();

        assert_eq!(document.array("forwardPorts"), vec![json!(3000)]);
        assert!(document.array("runServices").is_empty());
        assert!(document.object("containerEnv").is_empty());

        document.set("forwardPorts", json!([3000, 45000]));
        let keys: Vec<_> = document.root().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "image", "forwardPorts"]);
    }

    #[test]
    fn test_non_object_root_rejected() {
        let mut vault = PlaceholderVault::new();
        let err = DevcontainerDocument::parse("[1, 2]", "devcontainer.json", &mut vault).unwrap_err();
        assert!(matches!(err, DevcError::InvalidTemplate { .. }));
    }
}
