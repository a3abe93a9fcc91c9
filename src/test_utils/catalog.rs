//! Throwaway catalog directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::constants::{
    COMPOSE_FILE, DEVCONTAINER_DIR, DEVCONTAINER_FILE, SIDECAR_REGISTRY_FILE, TEMPLATE_PAYLOAD_DIR, TEMPLATES_DIR,
};
use crate::sidecar::SidecarDescriptor;

/// A catalog root in a temporary directory, removed on drop.
pub struct CatalogFixture {
    temp: TempDir,
}

impl CatalogFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: TempDir::new().context("Failed to create temp directory")?,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Payload directory of template `id`.
    pub fn template_dir(&self, id: &str) -> PathBuf {
        self.root().join(TEMPLATES_DIR).join(id).join(TEMPLATE_PAYLOAD_DIR)
    }

    /// A path under the catalog root that does not exist yet.
    pub fn output_dir(&self, name: &str) -> PathBuf {
        self.root().join("generated").join(name)
    }

    /// Writes a base template with both merge inputs.
    pub fn add_template(&self, id: &str, compose: &str, devcontainer: &str) -> Result<PathBuf> {
        let dir = self.template_dir(id);
        write_fragment(&dir, Some(compose), Some(devcontainer))?;
        Ok(dir)
    }

    /// Writes an extra file into a template's payload.
    pub fn add_template_file(&self, id: &str, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.template_dir(id).join(relative);
        write(&path, content)?;
        Ok(path)
    }

    /// Writes a sidecar fragment directory at `template_path` below the root.
    pub fn add_sidecar(
        &self,
        template_path: &str,
        compose: Option<&str>,
        devcontainer: Option<&str>,
    ) -> Result<PathBuf> {
        let dir = self.root().join(template_path);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        write_fragment(&dir, compose, devcontainer)?;
        Ok(dir)
    }

    /// Writes `catalog/sidecars.json` listing `descriptors`.
    pub fn write_registry(&self, descriptors: &[SidecarDescriptor]) -> Result<PathBuf> {
        let path = self.root().join(SIDECAR_REGISTRY_FILE);
        let body = serde_json::to_string_pretty(&serde_json::json!({ "sidecars": descriptors }))?;
        write(&path, &body)?;
        Ok(path)
    }
}

fn write_fragment(dir: &Path, compose: Option<&str>, devcontainer: Option<&str>) -> Result<()> {
    if let Some(compose) = compose {
        write(&dir.join(COMPOSE_FILE), compose)?;
    }
    if let Some(devcontainer) = devcontainer {
        write(&dir.join(DEVCONTAINER_DIR).join(DEVCONTAINER_FILE), devcontainer)?;
    }
    Ok(())
}

fn write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
