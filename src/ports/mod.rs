//! Host port reconciliation across the base template and its sidecars.
//!
//! Every forwarded or published host port in the merged stack must be unique. The
//! [`PortReconciler`] starts from the ports the base template already uses and
//! walks the sidecars in selection order: a declared port is kept when free and
//! otherwise replaced by the next unused port at or above the overflow base.
//! Overflow ports are handed out in increasing order and never reused in a run.

pub mod credentials;

pub use credentials::{default_credential_notes, missing_required_env};

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::core::DevcError;

/// Declared port and the host port it ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub declared: u16,
    pub assigned: u16,
}

impl PortMapping {
    #[must_use]
    pub fn is_remapped(&self) -> bool {
        self.declared != self.assigned
    }
}

/// Port decisions for one sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortAssignment {
    pub mappings: Vec<PortMapping>,
    /// Informational notes for every remapped port
    pub notes: Vec<String>,
}

impl PortAssignment {
    /// Host port assigned to a declared port, if the sidecar declared it.
    #[must_use]
    pub fn assigned_for(&self, declared: u16) -> Option<u16> {
        self.mappings.iter().find(|m| m.declared == declared).map(|m| m.assigned)
    }

    /// Declared-to-assigned lookup table.
    #[must_use]
    pub fn port_map(&self) -> BTreeMap<u16, u16> {
        self.mappings.iter().map(|m| (m.declared, m.assigned)).collect()
    }
}

/// Tracks claimed host ports for one merge run.
#[derive(Debug, Clone)]
pub struct PortReconciler {
    claimed: BTreeSet<u16>,
    overflow_base: u16,
    next_overflow: Option<u16>,
}

impl PortReconciler {
    /// Creates a reconciler with `seed` already claimed.
    pub fn new(overflow_base: u16, seed: impl IntoIterator<Item = u16>) -> Self {
        Self {
            claimed: seed.into_iter().collect(),
            overflow_base,
            next_overflow: Some(overflow_base),
        }
    }

    #[must_use]
    pub fn is_claimed(&self, port: u16) -> bool {
        self.claimed.contains(&port)
    }

    pub fn claimed(&self) -> impl Iterator<Item = u16> + '_ {
        self.claimed.iter().copied()
    }

    fn next_free_overflow(&mut self) -> Result<u16, DevcError> {
        let mut candidate = self.next_overflow.ok_or(DevcError::PortRangeExhausted {
            base: self.overflow_base,
        })?;
        while self.claimed.contains(&candidate) {
            candidate = candidate.checked_add(1).ok_or(DevcError::PortRangeExhausted {
                base: self.overflow_base,
            })?;
        }
        self.next_overflow = candidate.checked_add(1);
        Ok(candidate)
    }

    /// Assigns host ports for one sidecar's declared ports, in order.
    ///
    /// Duplicate declarations collapse to one mapping. `label` prefixes the notes.
    ///
    /// # Errors
    ///
    /// Returns [`DevcError::PortRangeExhausted`] when no port at or above the
    /// overflow base is left.
    pub fn assign(&mut self, label: &str, declared: &[u16]) -> Result<PortAssignment, DevcError> {
        let mut assignment = PortAssignment::default();
        for &port in declared {
            if assignment.assigned_for(port).is_some() {
                continue;
            }

            let assigned = if self.claimed.contains(&port) {
                let replacement = self.next_free_overflow()?;
                let note = format!("{label}: port {port} reassigned to {replacement}");
                tracing::info!("{}", note);
                assignment.notes.push(note);
                replacement
            } else {
                tracing::debug!("{}: port {} is free", label, port);
                port
            };

            self.claimed.insert(assigned);
            assignment.mappings.push(PortMapping {
                declared: port,
                assigned,
            });
        }
        Ok(assignment)
    }
}

/// Reads a port number from a `forwardPorts` entry or compose port value.
///
/// Accepts integers, all-digit strings and objects carrying `port`, `localPort`
/// or `published`. Host-qualified strings such as `"db:5432"` yield `None`.
#[must_use]
pub fn parse_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        Value::Object(map) => ["port", "localPort", "published"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(parse_port),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_free_ports_kept() {
        let mut reconciler = PortReconciler::new(45000, [3000]);
        let assignment = reconciler.assign("Browser", &[8080, 59000]).unwrap();
        assert_eq!(assignment.port_map(), BTreeMap::from([(8080, 8080), (59000, 59000)]));
        assert!(assignment.notes.is_empty());
    }

    #[test]
    fn test_collision_draws_from_overflow() {
        let mut reconciler = PortReconciler::new(45000, [3000]);
        let assignment = reconciler.assign("Browser", &[3000, 59000]).unwrap();

        assert_eq!(assignment.assigned_for(3000), Some(45000));
        assert_eq!(assignment.assigned_for(59000), Some(59000));
        assert_eq!(assignment.notes, vec!["Browser: port 3000 reassigned to 45000"]);
    }

    #[test]
    fn test_overflow_never_reused() {
        let mut reconciler = PortReconciler::new(45000, [3000, 45001]);
        let first = reconciler.assign("A", &[3000]).unwrap();
        let second = reconciler.assign("B", &[3000]).unwrap();
        let third = reconciler.assign("C", &[45000]).unwrap();

        assert_eq!(first.assigned_for(3000), Some(45000));
        assert_eq!(second.assigned_for(3000), Some(45002));
        assert_eq!(third.assigned_for(45000), Some(45003));
    }

    #[test]
    fn test_sidecars_claim_in_order() {
        let mut reconciler = PortReconciler::new(45000, Vec::<u16>::new());
        let first = reconciler.assign("Chrome", &[8080]).unwrap();
        let second = reconciler.assign("Firefox", &[8080]).unwrap();
        assert!(!first.mappings[0].is_remapped());
        assert_eq!(second.assigned_for(8080), Some(45000));
        assert!(reconciler.is_claimed(45000));
    }

    #[test]
    fn test_duplicate_declarations_collapse() {
        let mut reconciler = PortReconciler::new(45000, Vec::<u16>::new());
        let assignment = reconciler.assign("A", &[8080, 8080]).unwrap();
        assert_eq!(assignment.mappings.len(), 1);
    }

    #[test]
    fn test_exhausted_range() {
        let mut reconciler = PortReconciler::new(u16::MAX, [80, u16::MAX]);
        let err = reconciler.assign("A", &[80]).unwrap_err();
        assert!(matches!(err, DevcError::PortRangeExhausted { base: u16::MAX }));
    }

    #[test]
    fn test_parse_port_shapes() {
        assert_eq!(parse_port(&json!(3000)), Some(3000));
        assert_eq!(parse_port(&json!("3000")), Some(3000));
        assert_eq!(parse_port(&json!({"localPort": 8080})), Some(8080));
        assert_eq!(parse_port(&json!({"published": "5432"})), Some(5432));
        assert_eq!(parse_port(&json!("db:5432")), None);
        assert_eq!(parse_port(&json!(70000)), None);
        assert_eq!(parse_port(&json!(null)), None);
    }
}
