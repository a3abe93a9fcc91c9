//! Common helpers for devc integration tests.

// Not every helper is used by every test file
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use devc_stack::test_utils::CatalogFixture;
use devc_stack::test_utils::fixtures::{
    BASE_COMPOSE, BASE_DEVCONTAINER, BROWSER_COMPOSE, BROWSER_DEVCONTAINER, BROWSER_TEMPLATE_PATH, TEMPLATE_ID,
    browser_descriptor,
};

/// A catalog with the demo template and the test browser sidecar registered.
pub struct TestCatalog {
    pub catalog: CatalogFixture,
    config_path: PathBuf,
}

impl TestCatalog {
    pub fn new() -> Result<Self> {
        Self::with_devcontainer(BASE_DEVCONTAINER)
    }

    pub fn with_devcontainer(devcontainer: &str) -> Result<Self> {
        let catalog = CatalogFixture::new()?;
        catalog.add_template(TEMPLATE_ID, BASE_COMPOSE, devcontainer)?;
        catalog.add_sidecar(BROWSER_TEMPLATE_PATH, Some(BROWSER_COMPOSE), Some(BROWSER_DEVCONTAINER))?;
        catalog.write_registry(&[browser_descriptor()])?;

        let config_path = catalog.root().join("devc.toml");
        fs::write(&config_path, "")?;
        Ok(Self {
            catalog,
            config_path,
        })
    }

    pub fn root(&self) -> &Path {
        self.catalog.root()
    }

    pub fn output(&self) -> PathBuf {
        self.catalog.output_dir("stack")
    }

    /// Overwrites the configuration file passed to every command.
    pub fn write_config(&self, content: &str) -> Result<()> {
        fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// `devc` isolated from the user's configuration, pointed at this catalog.
    pub fn devc(&self) -> Command {
        let mut cmd = Command::cargo_bin("devc").expect("devc binary is built");
        cmd.current_dir(self.root())
            .env("DEVC_CONFIG", &self.config_path)
            .env("DEVC_CATALOG_ROOT", self.root())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn read_output(&self, relative: &str) -> String {
        fs::read_to_string(self.output().join(relative)).expect("output file exists")
    }
}
