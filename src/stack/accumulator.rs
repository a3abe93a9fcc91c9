//! The fold state threaded through the selected sidecars.
//!
//! [`MergeAccumulator`] owns everything one run mutates: the compose text, the
//! protected devcontainer tree, the vault holding its tokens, the port reconciler
//! and the plan notes. Each [`LoadedSidecar`] is applied in selection order and
//! [`MergeAccumulator::finish`] runs the checks that need the final state.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::plan::{PlanNote, PortPlan};
use crate::compose::{ComposeFragment, SkipReason, merge_fragment, rewrite_published_ports, validate_compose};
use crate::config::MergeConfig;
use crate::constants::COMPOSE_FILE;
use crate::core::DevcError;
use crate::devcontainer::DevcontainerDocument;
use crate::devcontainer::merge::merge_container_env;
use crate::ports::{PortAssignment, PortReconciler, default_credential_notes, missing_required_env, parse_port};
use crate::sidecar::SidecarDescriptor;
use crate::vault::PlaceholderVault;

/// A selected sidecar with its fragment files read from disk.
#[derive(Debug, Clone)]
pub struct LoadedSidecar {
    pub descriptor: SidecarDescriptor,
    pub compose: Option<String>,
    pub devcontainer: Option<String>,
}

impl LoadedSidecar {
    /// A sidecar contributing only its descriptor metadata.
    #[must_use]
    pub fn metadata_only(descriptor: SidecarDescriptor) -> Self {
        Self {
            descriptor,
            compose: None,
            devcontainer: None,
        }
    }
}

/// Merged file contents and notes produced by [`MergeAccumulator::finish`].
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub compose: String,
    pub devcontainer: String,
    pub ports: Vec<PortPlan>,
    pub notes: Vec<PlanNote>,
}

pub struct MergeAccumulator {
    compose: String,
    devcontainer: DevcontainerDocument,
    vault: PlaceholderVault,
    reconciler: PortReconciler,
    settings: MergeConfig,
    /// Applied sidecars with the `containerEnv` entries each one introduced
    applied: Vec<(SidecarDescriptor, BTreeMap<String, String>)>,
    ports: Vec<PortPlan>,
    notes: Vec<PlanNote>,
}

/// Host ports the base template already uses.
fn base_ports(devcontainer: &DevcontainerDocument, published: &[u16]) -> Vec<u16> {
    devcontainer
        .array("forwardPorts")
        .iter()
        .filter_map(parse_port)
        .chain(published.iter().copied())
        .collect()
}

/// Rewrites a `forwardPorts` entry to its assigned port, keeping number or string form.
fn remap_forward_port(value: &Value, map: &BTreeMap<u16, u16>) -> Value {
    match (parse_port(value), value) {
        (Some(port), Value::Number(_)) => map.get(&port).map_or_else(|| value.clone(), |p| Value::from(*p)),
        (Some(port), Value::String(_)) => map.get(&port).map_or_else(|| value.clone(), |p| Value::from(p.to_string())),
        _ => value.clone(),
    }
}

/// Moves declared ports in a fragment's `forwardPorts` and `portsAttributes` to
/// their assigned ports.
fn remap_fragment_ports(fragment: &mut Map<String, Value>, map: &BTreeMap<u16, u16>) {
    if map.iter().all(|(declared, assigned)| declared == assigned) {
        return;
    }

    if let Some(Value::Array(ports)) = fragment.get_mut("forwardPorts") {
        for port in ports.iter_mut() {
            *port = remap_forward_port(port, map);
        }
    }

    if let Some(Value::Object(attributes)) = fragment.get_mut("portsAttributes") {
        let remapped: Map<String, Value> = std::mem::take(attributes)
            .into_iter()
            .map(|(key, value)| {
                let key = key
                    .parse::<u16>()
                    .ok()
                    .and_then(|port| map.get(&port))
                    .map_or(key, u16::to_string);
                (key, value)
            })
            .collect();
        *attributes = remapped;
    }
}

impl MergeAccumulator {
    /// Starts a run from the base template's files.
    ///
    /// The reconciler is seeded with the base `forwardPorts` and the host ports
    /// published by the base compose file.
    ///
    /// # Errors
    ///
    /// Fails when the base devcontainer cannot be protected and parsed, or the
    /// base compose file is not valid YAML.
    pub fn new(compose: String, devcontainer: &str, settings: MergeConfig) -> Result<Self, DevcError> {
        let mut vault = PlaceholderVault::new();
        let document = DevcontainerDocument::parse(devcontainer, "devcontainer.json", &mut vault)?;
        let published = crate::compose::published_ports(&compose).map_err(|e| DevcError::InvalidCompose {
            file: COMPOSE_FILE.to_string(),
            reason: e.to_string(),
        })?;
        let seed = base_ports(&document, &published);
        tracing::debug!("Base template claims ports {:?}", seed);

        Ok(Self {
            compose,
            devcontainer: document,
            vault,
            reconciler: PortReconciler::new(settings.overflow_port_base, seed),
            settings,
            applied: Vec::new(),
            ports: Vec::new(),
            notes: Vec::new(),
        })
    }

    fn note_info(&mut self, message: impl Into<String>, sidecar: &str) {
        self.notes.push(PlanNote::info(message, Some(sidecar)));
    }

    fn note_warn(&mut self, message: impl Into<String>, sidecar: &str) {
        self.notes.push(PlanNote::warn(message, Some(sidecar)));
    }

    /// Folds one sidecar into the stack.
    ///
    /// # Errors
    ///
    /// Fails when the port space is exhausted or the sidecar's devcontainer
    /// fragment cannot be protected and parsed.
    pub fn apply(mut self, sidecar: &LoadedSidecar) -> Result<Self, DevcError> {
        let descriptor = &sidecar.descriptor;
        let id = descriptor.id.as_str();
        tracing::debug!("Merging sidecar '{}'", id);

        let assignment = self.reconciler.assign(&descriptor.label, &descriptor.ports)?;
        self.record_ports(descriptor, &assignment);
        let port_map = assignment.port_map();

        if let Some(compose) = &sidecar.compose {
            self.merge_compose_fragment(id, compose, &port_map);
        }
        let mut introduced = BTreeMap::new();
        if let Some(devcontainer) = &sidecar.devcontainer {
            self.merge_devcontainer_fragment(descriptor, devcontainer, &port_map, &mut introduced)?;
        }
        self.apply_descriptor(descriptor, &assignment, &mut introduced);

        for note in &descriptor.notes {
            self.note_info(note.clone(), id);
        }
        self.applied.push((descriptor.clone(), introduced));
        Ok(self)
    }

    fn record_ports(&mut self, descriptor: &SidecarDescriptor, assignment: &PortAssignment) {
        for note in &assignment.notes {
            self.notes.push(PlanNote::info(note.clone(), Some(descriptor.id.as_str())));
        }
        for mapping in &assignment.mappings {
            self.ports.push(PortPlan {
                sidecar: descriptor.id.clone(),
                declared: mapping.declared,
                assigned: mapping.assigned,
                label: descriptor.port_labels.get(&mapping.declared).map(|l| l.label.clone()),
            });
        }
    }

    fn merge_compose_fragment(&mut self, id: &str, text: &str, port_map: &BTreeMap<u16, u16>) {
        let fragment = ComposeFragment {
            sidecar: id.to_string(),
            text: rewrite_published_ports(text, port_map),
        };
        let merged = merge_fragment(&self.compose, &fragment, &self.settings.reserved_service);
        self.compose = merged.text;

        for skipped in merged.skipped {
            let message = match skipped.reason {
                SkipReason::Reserved => format!(
                    "Service '{}' is reserved for the workspace container; the sidecar's block was not added.",
                    skipped.name
                ),
                SkipReason::Duplicate => {
                    format!("Service '{}' already exists; the sidecar's block was not added.", skipped.name)
                }
            };
            self.note_warn(message, id);
        }
    }

    fn merge_devcontainer_fragment(
        &mut self,
        descriptor: &SidecarDescriptor,
        text: &str,
        port_map: &BTreeMap<u16, u16>,
        introduced: &mut BTreeMap<String, String>,
    ) -> Result<(), DevcError> {
        let file = format!("{}/devcontainer.json", descriptor.template_path.display());
        let mut fragment = DevcontainerDocument::parse(text, &file, &mut self.vault)?;
        if !fragment.take_sections().is_empty() {
            self.note_warn(
                format!("Conditional sections in {file} are not supported in fragments; their members were merged unconditionally."),
                &descriptor.id,
            );
        }

        let mut addition = fragment.root().clone();
        remap_fragment_ports(&mut addition, port_map);
        if let Some(Value::Object(env)) = addition.get("containerEnv") {
            for (key, value) in env {
                if let Some(value) = value.as_str() {
                    introduced.insert(key.clone(), value.to_string());
                }
            }
        }
        for warning in self.devcontainer.merge_from(&Value::Object(addition)) {
            self.note_warn(warning, &descriptor.id);
        }
        Ok(())
    }

    fn apply_descriptor(
        &mut self,
        descriptor: &SidecarDescriptor,
        assignment: &PortAssignment,
        introduced: &mut BTreeMap<String, String>,
    ) {
        let mut forward = self.devcontainer.array("forwardPorts");
        for mapping in &assignment.mappings {
            if !forward.iter().any(|p| parse_port(p) == Some(mapping.assigned)) {
                forward.push(Value::from(mapping.assigned));
            }
        }
        if !forward.is_empty() {
            self.devcontainer.set("forwardPorts", Value::Array(forward));
        }

        if !descriptor.port_labels.is_empty() {
            let mut attributes = self.devcontainer.object("portsAttributes");
            for (declared, label) in &descriptor.port_labels {
                let port = assignment.assigned_for(*declared).unwrap_or(*declared).to_string();
                let entry = attributes.entry(port).or_insert_with(|| Value::Object(Map::new()));
                match entry {
                    Value::Object(existing) => existing.extend(label.to_attributes()),
                    other => *other = Value::Object(label.to_attributes()),
                }
            }
            self.devcontainer.set("portsAttributes", Value::Object(attributes));
        }

        let service = self.vault.protect_str(&descriptor.service_name);
        let mut services = self.devcontainer.array("runServices");
        if !services.iter().any(|s| s.as_str() == Some(service.as_str())) {
            services.push(Value::from(service));
            self.devcontainer.set("runServices", Value::Array(services));
        }

        if !descriptor.container_env.is_empty() {
            let mut env = self.devcontainer.object("containerEnv");
            let mut warnings = Vec::new();
            let additions: Vec<(String, String)> = descriptor
                .container_env
                .iter()
                .map(|(key, value)| (key.clone(), self.vault.protect_str(value)))
                .collect();
            introduced.extend(additions.iter().cloned());
            merge_container_env(
                &mut env,
                additions.into_iter().map(|(key, value)| (key, Value::from(value))),
                &mut warnings,
            );
            self.devcontainer.set("containerEnv", Value::Object(env));
            for warning in warnings {
                self.note_warn(warning, &descriptor.id);
            }
        }
    }

    /// Runs the final-state checks and renders both merged files.
    ///
    /// # Errors
    ///
    /// Fails when the merged compose text is not valid YAML or the devcontainer
    /// directives cannot be restored.
    pub fn finish(mut self) -> Result<MergeOutcome, DevcError> {
        let env = self.devcontainer.object("containerEnv");
        let applied = std::mem::take(&mut self.applied);
        for (descriptor, introduced) in &applied {
            let credentials = default_credential_notes(
                &descriptor.label,
                introduced,
                &env,
                &self.settings.default_credentials,
            );
            for note in credentials {
                self.note_warn(note, &descriptor.id);
            }
            if let Some(note) = missing_required_env(&descriptor.label, &descriptor.required_env, &env) {
                self.note_warn(note, &descriptor.id);
            }
        }

        // Group notes by sidecar in selection order; the sort is stable within a sidecar
        let position = |note: &PlanNote| {
            note.sidecar
                .as_deref()
                .and_then(|id| applied.iter().position(|(descriptor, _)| descriptor.id == id))
        };
        self.notes.sort_by_key(position);

        let mut notes: Vec<PlanNote> = Vec::with_capacity(self.notes.len());
        for note in self.notes {
            if !notes.iter().any(|n| n.level == note.level && n.message == note.message) {
                notes.push(note);
            }
        }
        for note in notes.iter().filter(|n| n.level >= super::plan::NoteLevel::Warn) {
            tracing::warn!("{}", note.message);
        }

        validate_compose(&self.compose, COMPOSE_FILE)?;
        let devcontainer = self.devcontainer.render(&self.vault)?;

        Ok(MergeOutcome {
            compose: self.compose,
            devcontainer,
            ports: self.ports,
            notes,
        })
    }
}
