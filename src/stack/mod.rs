//! Stack generation: merging sidecars into a base devcontainer template.
//!
//! [`generate_stack`] is the entry point. It resolves the base template, reads
//! every selected sidecar's fragment files, folds them through a
//! [`MergeAccumulator`] and only writes the output directory once the whole merge
//! has succeeded. With no sidecars the template is copied unchanged.
//!
//! # Output layout
//!
//! The output directory receives every file of the template payload. The merged
//! `docker-compose.yml` and `.devcontainer/devcontainer.json` then replace their
//! copies. Sidecar fragment directories are never copied wholesale.
//!
//! # Example
//!
//! ```rust,no_run
//! use devc_stack::config::MergeConfig;
//! use devc_stack::sidecar::SidecarRegistry;
//! use devc_stack::stack::{StackRequest, generate_stack};
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = SidecarRegistry::load(Some("/srv/catalog".as_ref()))?;
//! let sidecars = registry.select(&["neko-chrome"], Default::default())?;
//! let plan = generate_stack(&StackRequest {
//!     template: "web".to_string(),
//!     template_dir: None,
//!     catalog_root: Some("/srv/catalog".into()),
//!     output: "generated/web".into(),
//!     sidecars,
//!     force: false,
//!     dry_run: true,
//!     strict: false,
//!     settings: MergeConfig::default(),
//! })?;
//! println!("{} warning(s)", plan.warning_count());
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod plan;

pub use accumulator::{LoadedSidecar, MergeAccumulator, MergeOutcome};
pub use plan::{FileOp, MergePlan, NoteLevel, PlanNote, PlannedFile, PortPlan};

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::MergeConfig;
use crate::constants::{COMPOSE_FILE, DEVCONTAINER_DIR, DEVCONTAINER_FILE, TEMPLATE_PAYLOAD_DIR, TEMPLATES_DIR};
use crate::core::DevcError;
use crate::sidecar::SidecarDescriptor;
use crate::utils::fs::{copy_dir, list_files, prepare_output_dir, read_text_file, safe_write};

/// Everything one stack generation run needs.
#[derive(Debug, Clone)]
pub struct StackRequest {
    /// Template identifier, used for lookup and reporting
    pub template: String,
    /// Explicit template payload directory, bypassing catalog lookup
    pub template_dir: Option<PathBuf>,
    pub catalog_root: Option<PathBuf>,
    pub output: PathBuf,
    /// Selected sidecars in merge order
    pub sidecars: Vec<SidecarDescriptor>,
    pub force: bool,
    pub dry_run: bool,
    /// Fail when any warning is produced
    pub strict: bool,
    pub settings: MergeConfig,
}

/// Payload directory of the requested template.
///
/// # Errors
///
/// Returns [`DevcError::TemplateNotFound`] when the directory does not exist, or
/// [`DevcError::ConfigError`] when neither an explicit directory nor a catalog
/// root is available.
pub fn resolve_template_dir(request: &StackRequest) -> Result<PathBuf, DevcError> {
    let dir = match (&request.template_dir, &request.catalog_root) {
        (Some(dir), _) => dir.clone(),
        (None, Some(root)) => root.join(TEMPLATES_DIR).join(&request.template).join(TEMPLATE_PAYLOAD_DIR),
        (None, None) => {
            return Err(DevcError::ConfigError {
                message: format!(
                    "No catalog root found to look up template '{}'; pass --catalog-root or --template-dir",
                    request.template
                ),
            });
        }
    };

    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(DevcError::TemplateNotFound {
            template: request.template.clone(),
            path: dir.display().to_string(),
        })
    }
}

fn sidecar_dir(descriptor: &SidecarDescriptor, catalog_root: Option<&Path>) -> Result<PathBuf, DevcError> {
    let dir = if descriptor.template_path.is_absolute() {
        descriptor.template_path.clone()
    } else {
        let root = catalog_root.ok_or_else(|| DevcError::ConfigError {
            message: format!("No catalog root found to locate sidecar '{}'", descriptor.id),
        })?;
        root.join(&descriptor.template_path)
    };

    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(DevcError::ConfigError {
            message: format!("Sidecar '{}' fragment directory not found: {}", descriptor.id, dir.display()),
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, DevcError> {
    if path.is_file() {
        read_text_file(path).map(Some)
    } else {
        Ok(None)
    }
}

/// Reads a sidecar's fragment files. Either file may be absent.
///
/// # Errors
///
/// Fails when the fragment directory cannot be located or a present file cannot
/// be read.
pub fn load_sidecar(descriptor: &SidecarDescriptor, catalog_root: Option<&Path>) -> Result<LoadedSidecar, DevcError> {
    let dir = sidecar_dir(descriptor, catalog_root)?;
    let compose = read_optional(&dir.join(COMPOSE_FILE))?;
    let devcontainer = read_optional(&dir.join(DEVCONTAINER_DIR).join(DEVCONTAINER_FILE))?;
    tracing::debug!(
        "Loaded sidecar '{}' from {} (compose: {}, devcontainer: {})",
        descriptor.id,
        dir.display(),
        compose.is_some(),
        devcontainer.is_some()
    );
    Ok(LoadedSidecar {
        descriptor: descriptor.clone(),
        compose,
        devcontainer,
    })
}

fn devcontainer_relative() -> String {
    format!("{DEVCONTAINER_DIR}/{DEVCONTAINER_FILE}")
}

fn plan_files(template_dir: &Path, merged: bool) -> Result<Vec<PlannedFile>> {
    let modified = [COMPOSE_FILE.to_string(), devcontainer_relative()];
    let files = list_files(template_dir)?
        .into_iter()
        .map(|relative| {
            let path = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
            let op = if merged && modified.contains(&path) {
                FileOp::Modify
            } else {
                FileOp::Create
            };
            PlannedFile {
                path,
                op,
            }
        })
        .collect();
    Ok(files)
}

/// Generates a stack from a base template and the requested sidecars.
///
/// Nothing is written when `dry_run` is set or when any step fails.
///
/// # Errors
///
/// Returns configuration errors ([`DevcError`]) for a missing template, missing
/// fragments, malformed inputs, exhausted ports, an occupied output directory, or
/// warnings in strict mode. IO failures while writing are returned as-is.
pub fn generate_stack(request: &StackRequest) -> Result<MergePlan> {
    let template_dir = resolve_template_dir(request)?;
    tracing::debug!("Using template '{}' from {}", request.template, template_dir.display());

    if request.sidecars.is_empty() {
        let plan = MergePlan {
            template: request.template.clone(),
            output: request.output.clone(),
            files: plan_files(&template_dir, false)?,
            ports: Vec::new(),
            notes: Vec::new(),
            dry_run: request.dry_run,
        };
        if !request.dry_run {
            prepare_output_dir(&request.output, request.force)?;
            copy_dir(&template_dir, &request.output)?;
            tracing::info!("Copied template '{}' to {}", request.template, request.output.display());
        }
        return Ok(plan);
    }

    let compose = read_text_file(&template_dir.join(COMPOSE_FILE))?;
    let devcontainer = read_text_file(&template_dir.join(DEVCONTAINER_DIR).join(DEVCONTAINER_FILE))?;

    let catalog_root = request.catalog_root.as_deref();
    let sidecars = request
        .sidecars
        .iter()
        .map(|descriptor| load_sidecar(descriptor, catalog_root))
        .collect::<Result<Vec<_>, _>>()?;

    let accumulator = MergeAccumulator::new(compose, &devcontainer, request.settings.clone())?;
    let outcome = sidecars.iter().try_fold(accumulator, MergeAccumulator::apply)?.finish()?;

    let plan = MergePlan {
        template: request.template.clone(),
        output: request.output.clone(),
        files: plan_files(&template_dir, true)?,
        ports: outcome.ports,
        notes: outcome.notes,
        dry_run: request.dry_run,
    };

    let warnings = plan.warning_count();
    if warnings > 0 && (request.strict || request.settings.warnings_as_errors) {
        for note in plan.warnings() {
            tracing::error!("{}", note.message);
        }
        return Err(DevcError::WarningsAsErrors {
            count: warnings,
        }
        .into());
    }

    if !request.dry_run {
        prepare_output_dir(&request.output, request.force)?;
        copy_dir(&template_dir, &request.output)?;
        safe_write(&request.output.join(COMPOSE_FILE), &outcome.compose)?;
        safe_write(&request.output.join(DEVCONTAINER_DIR).join(DEVCONTAINER_FILE), &outcome.devcontainer)?;
    }

    tracing::info!(
        "Merged {} sidecar(s) into '{}': {} port(s), {} warning(s){}",
        request.sidecars.len(),
        request.template,
        plan.ports.len(),
        warnings,
        if request.dry_run { " (dry run)" } else { "" }
    );
    Ok(plan)
}
