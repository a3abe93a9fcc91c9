//! Sidecar descriptors and the registry they are loaded from.
//!
//! A sidecar is an auxiliary container (a browser, a database, a helper service)
//! that can be merged into a base devcontainer template. Its descriptor names the
//! fragment directory to merge and the port, label and environment metadata that
//! the merge engine applies on top of the fragment.

pub mod registry;

pub use registry::{SelectionPolicy, SidecarRegistry, parse_selection};

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// Maturity level of a sidecar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    #[default]
    Stable,
    Experimental,
    Deprecated,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Experimental => write!(f, "experimental"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// Display metadata applied to a forwarded port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortLabel {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_auto_forward: Option<String>,
}

impl PortLabel {
    /// The `portsAttributes` entry for this label.
    #[must_use]
    pub fn to_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut attributes = serde_json::Map::new();
        attributes.insert("label".to_string(), self.label.clone().into());
        if let Some(action) = &self.on_auto_forward {
            attributes.insert("onAutoForward".to_string(), action.clone().into());
        }
        attributes
    }
}

/// Everything the merge engine needs to know about one sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarDescriptor {
    pub id: String,
    pub label: String,
    /// Fragment directory, relative to the catalog root
    pub template_path: PathBuf,
    /// Compose service the workspace should start alongside itself
    pub service_name: String,
    pub ports: Vec<u16>,
    pub port_labels: BTreeMap<u16, PortLabel>,
    pub container_env: BTreeMap<String, String>,
    pub required_env: Vec<String>,
    pub notes: Vec<String>,
    pub stability: Stability,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    id: String,
    label: Option<String>,
    template_path: PathBuf,
    service_name: Option<String>,
    #[serde(default)]
    ports: Vec<u16>,
    #[serde(default)]
    port_labels: BTreeMap<u16, PortLabel>,
    #[serde(default)]
    container_env: BTreeMap<String, String>,
    #[serde(default)]
    required_env: Vec<String>,
    #[serde(default)]
    notes: Vec<String>,
    #[serde(default)]
    stability: Stability,
}

impl<'de> Deserialize<'de> for SidecarDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawDescriptor::deserialize(deserializer)?;
        Ok(Self {
            label: raw.label.unwrap_or_else(|| raw.id.clone()),
            service_name: raw.service_name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            template_path: raw.template_path,
            ports: raw.ports,
            port_labels: raw.port_labels,
            container_env: raw.container_env,
            required_env: raw.required_env,
            notes: raw.notes,
            stability: raw.stability,
        })
    }
}

impl SidecarDescriptor {
    /// Descriptor with only the required fields set; the rest take their defaults.
    pub fn new(id: impl Into<String>, template_path: impl Into<PathBuf>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            service_name: id.clone(),
            id,
            template_path: template_path.into(),
            ports: Vec::new(),
            port_labels: BTreeMap::new(),
            container_env: BTreeMap::new(),
            required_env: Vec::new(),
            notes: Vec::new(),
            stability: Stability::Stable,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16, label: Option<PortLabel>) -> Self {
        self.ports.push(port);
        if let Some(label) = label {
            self.port_labels.insert(port, label);
        }
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.container_env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_required_env(mut self, key: impl Into<String>) -> Self {
        self.required_env.push(key.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    #[must_use]
    pub fn with_stability(mut self, stability: Stability) -> Self {
        self.stability = stability;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_applies_defaults() {
        let descriptor: SidecarDescriptor =
            serde_json::from_str(r#"{"id": "redis", "templatePath": "services/redis"}"#).unwrap();
        assert_eq!(descriptor.label, "redis");
        assert_eq!(descriptor.service_name, "redis");
        assert_eq!(descriptor.stability, Stability::Stable);
        assert!(descriptor.ports.is_empty());
    }

    #[test]
    fn test_deserialize_full_descriptor() {
        let json = r#"{
            "id": "neko-chrome",
            "label": "Neko Chrome",
            "templatePath": "sidecars/neko-chrome/.template",
            "serviceName": "neko",
            "ports": [8080, 59000],
            "portLabels": {"8080": {"label": "Neko UI", "onAutoForward": "openBrowser"}},
            "containerEnv": {"NEKO_PASSWORD": "student"},
            "requiredEnv": ["NEKO_ADMIN"],
            "stability": "experimental"
        }"#;
        let descriptor: SidecarDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.service_name, "neko");
        assert_eq!(descriptor.port_labels[&8080].on_auto_forward.as_deref(), Some("openBrowser"));
        assert_eq!(descriptor.container_env["NEKO_PASSWORD"], "student");
        assert_eq!(descriptor.stability, Stability::Experimental);
    }

    #[test]
    fn test_port_label_attributes() {
        let label = PortLabel {
            label: "Browser UI".to_string(),
            on_auto_forward: Some("openBrowser".to_string()),
        };
        let attributes = label.to_attributes();
        assert_eq!(attributes["label"], "Browser UI");
        assert_eq!(attributes["onAutoForward"], "openBrowser");
    }

    #[test]
    fn test_stability_display() {
        assert_eq!(Stability::Deprecated.to_string(), "deprecated");
    }
}
