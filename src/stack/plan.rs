//! Merge plans: what a stack generation run wrote (or would write).

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// How a planned file relates to the base template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    /// Copied verbatim from the base template
    Create,
    /// Rewritten by the merge
    Modify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    /// Path relative to the output directory, always with `/` separators
    pub path: String,
    pub op: FileOp,
}

/// Host port decision for one declared sidecar port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortPlan {
    pub sidecar: String,
    pub declared: u16,
    pub assigned: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for NoteLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanNote {
    pub level: NoteLevel,
    pub message: String,
    /// Sidecar the note is about, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<String>,
}

impl PlanNote {
    pub fn info(message: impl Into<String>, sidecar: Option<&str>) -> Self {
        Self {
            level: NoteLevel::Info,
            message: message.into(),
            sidecar: sidecar.map(str::to_string),
        }
    }

    pub fn warn(message: impl Into<String>, sidecar: Option<&str>) -> Self {
        Self {
            level: NoteLevel::Warn,
            message: message.into(),
            sidecar: sidecar.map(str::to_string),
        }
    }
}

/// Outcome of one stack generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePlan {
    pub template: String,
    pub output: PathBuf,
    pub files: Vec<PlannedFile>,
    pub ports: Vec<PortPlan>,
    /// Notes grouped by sidecar in selection order
    pub notes: Vec<PlanNote>,
    pub dry_run: bool,
}

impl MergePlan {
    /// Notes at warning level or above.
    pub fn warnings(&self) -> impl Iterator<Item = &PlanNote> {
        self.notes.iter().filter(|note| note.level >= NoteLevel::Warn)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Port decisions that moved a declared port.
    pub fn remapped_ports(&self) -> impl Iterator<Item = &PortPlan> {
        self.ports.iter().filter(|port| port.declared != port.assigned)
    }

    #[must_use]
    pub fn file(&self, path: &str) -> Option<&PlannedFile> {
        self.files.iter().find(|file| file.path == path)
    }
}
