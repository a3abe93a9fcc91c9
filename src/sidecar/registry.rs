//! Sidecar registry: built-in browser sidecars plus catalog overrides.
//!
//! The registry starts from the browser sidecars compiled into devc and overlays
//! `<catalog>/catalog/sidecars.json` when the catalog provides one:
//!
//! ```json
//! {
//!   "sidecars": [
//!     { "id": "redis", "templatePath": "services/redis", "ports": [6379] }
//!   ]
//! }
//! ```
//!
//! Catalog entries replace built-ins with the same id and are otherwise appended in
//! file order. Selection is gated by [`SelectionPolicy`]: stable sidecars are always
//! available, experimental and deprecated ones need an explicit opt-in.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use strsim::levenshtein;

use super::{PortLabel, SidecarDescriptor, Stability};
use crate::constants::SIDECAR_REGISTRY_FILE;
use crate::core::DevcError;

/// Maximum edit distance, as a percentage of the requested id, for "did you mean".
const SUGGESTION_THRESHOLD_PERCENT: usize = 50;

/// Which maturity levels a selection may include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub include_experimental: bool,
    pub include_deprecated: bool,
}

impl SelectionPolicy {
    /// Policy admitting every stability level.
    #[must_use]
    pub fn all() -> Self {
        Self {
            include_experimental: true,
            include_deprecated: true,
        }
    }

    #[must_use]
    pub fn allows(&self, stability: Stability) -> bool {
        match stability {
            Stability::Stable => true,
            Stability::Experimental => self.include_experimental,
            Stability::Deprecated => self.include_deprecated,
        }
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    sidecars: Vec<SidecarDescriptor>,
}

/// Known sidecars, in registration order.
#[derive(Debug, Clone)]
pub struct SidecarRegistry {
    sidecars: Vec<SidecarDescriptor>,
    source: Option<PathBuf>,
}

fn ui_label(label: &str) -> Option<PortLabel> {
    Some(PortLabel {
        label: label.to_string(),
        on_auto_forward: Some("openBrowser".to_string()),
    })
}

fn builtin_sidecars() -> Vec<SidecarDescriptor> {
    vec![
        SidecarDescriptor::new("neko-chrome", "sidecars/neko-chrome/.template")
            .with_label("Neko Chrome")
            .with_service_name("neko")
            .with_port(8080, ui_label("Neko Chrome UI"))
            .with_env("NEKO_PASSWORD", "student")
            .with_env("NEKO_PASSWORD_ADMIN", "admin")
            .with_note("Chrome streamed over WebRTC; UDP 59000-59100 must be reachable."),
        SidecarDescriptor::new("neko-firefox", "sidecars/neko-firefox/.template")
            .with_label("Neko Firefox")
            .with_service_name("neko-firefox")
            .with_port(8081, ui_label("Neko Firefox UI"))
            .with_env("NEKO_PASSWORD", "student")
            .with_env("NEKO_PASSWORD_ADMIN", "admin")
            .with_stability(Stability::Experimental),
        SidecarDescriptor::new("kasm-chrome", "sidecars/kasm-chrome/.template")
            .with_label("Kasm Chrome")
            .with_service_name("kasm-chrome")
            .with_port(6901, ui_label("Kasm Chrome UI"))
            .with_required_env("KASM_PASSWORD")
            .with_note("Kasm serves HTTPS with a self-signed certificate."),
    ]
}

impl Default for SidecarRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SidecarRegistry {
    /// Registry holding only the built-in sidecars.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            sidecars: builtin_sidecars(),
            source: None,
        }
    }

    /// Registry from an explicit list, used by tests and embedders.
    #[must_use]
    pub fn from_descriptors(sidecars: Vec<SidecarDescriptor>) -> Self {
        Self {
            sidecars,
            source: None,
        }
    }

    /// Built-ins overlaid with the catalog's registry file, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`DevcError::RegistryParseError`] when the file exists but cannot be
    /// read or parsed.
    pub fn load(catalog_root: Option<&Path>) -> Result<Self, DevcError> {
        let mut registry = Self::builtin();
        let Some(root) = catalog_root else {
            return Ok(registry);
        };

        let path = root.join(SIDECAR_REGISTRY_FILE);
        if !path.is_file() {
            tracing::debug!("No sidecar registry at {}", path.display());
            return Ok(registry);
        }

        let parse_error = |reason: String| DevcError::RegistryParseError {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(&path).map_err(|e| parse_error(e.to_string()))?;
        let file: RegistryFile = serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;

        let count = file.sidecars.len();
        for descriptor in file.sidecars {
            registry.register(descriptor);
        }
        tracing::debug!("Loaded {} sidecar(s) from {}", count, path.display());
        registry.source = Some(path);
        Ok(registry)
    }

    /// Adds a sidecar, replacing any existing entry with the same id in place.
    pub fn register(&mut self, descriptor: SidecarDescriptor) {
        match self.sidecars.iter_mut().find(|s| s.id == descriptor.id) {
            Some(existing) => *existing = descriptor,
            None => self.sidecars.push(descriptor),
        }
    }

    /// Registry file the catalog entries came from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SidecarDescriptor> {
        self.sidecars.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn all(&self) -> &[SidecarDescriptor] {
        &self.sidecars
    }

    /// Sidecars the policy admits, in registration order.
    #[must_use]
    pub fn filter_by_stability(&self, policy: SelectionPolicy) -> Vec<&SidecarDescriptor> {
        self.sidecars.iter().filter(|s| policy.allows(s.stability)).collect()
    }

    fn suggest(&self, id: &str) -> Option<String> {
        self.sidecars
            .iter()
            .map(|s| (s.id.as_str(), levenshtein(id, &s.id)))
            .filter(|(_, distance)| *distance <= id.len() * SUGGESTION_THRESHOLD_PERCENT / 100)
            .min_by_key(|(_, distance)| *distance)
            .map(|(candidate, _)| candidate.to_string())
    }

    /// Resolves requested ids to descriptors, in request order, without duplicates.
    ///
    /// # Errors
    ///
    /// - [`DevcError::UnknownSidecar`] for an id the registry does not know
    /// - [`DevcError::SidecarNotAllowed`] for a sidecar the policy excludes
    pub fn select<S: AsRef<str>>(
        &self,
        ids: &[S],
        policy: SelectionPolicy,
    ) -> Result<Vec<SidecarDescriptor>, DevcError> {
        let mut selected: Vec<SidecarDescriptor> = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if selected.iter().any(|s| s.id == id) {
                continue;
            }
            let descriptor = self.get(id).ok_or_else(|| DevcError::UnknownSidecar {
                id: id.to_string(),
                suggestion: self.suggest(id),
            })?;
            if !policy.allows(descriptor.stability) {
                return Err(DevcError::SidecarNotAllowed {
                    id: id.to_string(),
                    stability: descriptor.stability.to_string(),
                });
            }
            selected.push(descriptor.clone());
        }
        Ok(selected)
    }
}

/// Combines a comma-separated list and repeated single ids into one ordered,
/// de-duplicated selection. Blank entries are ignored.
#[must_use]
pub fn parse_selection(csv: Option<&str>, repeated: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let candidates = csv.into_iter().flat_map(|list| list.split(',')).chain(repeated.iter().map(String::as_str));
    for candidate in candidates {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() && !ids.iter().any(|id| id == trimmed) {
            ids.push(trimmed.to_string());
        }
    }
    ids
}
