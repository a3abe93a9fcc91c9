//! Configuration for devc.
//!
//! Settings live in an optional TOML file. Every field has a default, so an absent
//! file and an empty file behave the same.
//!
//! # Location
//!
//! 1. `--config <PATH>` on the command line
//! 2. `DEVC_CONFIG` environment variable
//! 3. `~/.devc/config.toml` (`%LOCALAPPDATA%\devc\config.toml` on Windows)
//!
//! # Format
//!
//! ```toml
//! catalog_root = "/srv/devcontainers-catalog"
//!
//! [merge]
//! overflow_port_base = 45000
//! reserved_service = "devcontainer"
//! default_credentials = ["student", "admin", "changeme", "password"]
//! warnings_as_errors = false
//!
//! [registry]
//! include_experimental = false
//! include_deprecated = false
//! ```
//!
//! # Catalog root
//!
//! The catalog root holds `templates/` and `catalog/sidecars.json`. It is taken
//! from `--catalog-root`, then `DEVC_CATALOG_ROOT`, then `catalog_root` in the
//! file, and finally discovered by walking up from the working directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{
    CATALOG_DISCOVERY_DEPTH, CATALOG_ROOT_ENV, CONFIG_PATH_ENV, DEFAULT_CREDENTIAL_VALUES,
    DEFAULT_OVERFLOW_PORT_BASE, RESERVED_WORKSPACE_SERVICE, SIDECAR_REGISTRY_FILE, TEMPLATES_DIR,
};
use crate::core::DevcError;
use crate::sidecar::SelectionPolicy;

/// Merge engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// First port handed out when a declared sidecar port is taken
    pub overflow_port_base: u16,
    /// Compose service name of the workspace container
    pub reserved_service: String,
    /// Credential values that trigger a warning when left unchanged
    pub default_credentials: Vec<String>,
    /// Fail the run when any warning is produced
    pub warnings_as_errors: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            overflow_port_base: DEFAULT_OVERFLOW_PORT_BASE,
            reserved_service: RESERVED_WORKSPACE_SERVICE.to_string(),
            default_credentials: DEFAULT_CREDENTIAL_VALUES.iter().map(|s| (*s).to_string()).collect(),
            warnings_as_errors: false,
        }
    }
}

/// Sidecar availability settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub include_experimental: bool,
    pub include_deprecated: bool,
}

impl RegistryConfig {
    #[must_use]
    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            include_experimental: self.include_experimental,
            include_deprecated: self.include_deprecated,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevcConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_root: Option<PathBuf>,
    pub merge: MergeConfig,
    pub registry: RegistryConfig,
}

impl DevcConfig {
    /// Loads configuration from `path`, `DEVC_CONFIG`, or the default location.
    ///
    /// A missing file at the default location yields the defaults. A path given
    /// explicitly must exist.
    ///
    /// # Errors
    ///
    /// Returns an error when an explicit file is missing, a file cannot be read or
    /// parsed, or the settings are out of range.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let explicit = path.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(DevcError::ConfigError {
                        message: format!("Configuration file not found: {}", path.display()),
                    }
                    .into());
                }
                Self::load_from(&path).await?
            }
            None => match Self::default_path() {
                Ok(path) if path.exists() => Self::load_from(&path).await?,
                _ => Self::default(),
            },
        };
        Ok(config)
    }

    /// Loads and validates a specific configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or fails
    /// [`DevcConfig::validate`].
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Platform default path of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("devc")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".devc")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`DevcError::ConfigError`] for a zero overflow base or an empty
    /// reserved service name.
    pub fn validate(&self) -> Result<(), DevcError> {
        if self.merge.overflow_port_base == 0 {
            return Err(DevcError::ConfigError {
                message: "merge.overflow_port_base must be between 1 and 65535".to_string(),
            });
        }
        if self.merge.reserved_service.trim().is_empty() {
            return Err(DevcError::ConfigError {
                message: "merge.reserved_service must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the catalog root from the command line, environment, file, or by
    /// discovery from the working directory, in that order.
    #[must_use]
    pub fn resolve_catalog_root(&self, cli_root: Option<PathBuf>) -> Option<PathBuf> {
        cli_root
            .or_else(|| std::env::var_os(CATALOG_ROOT_ENV).map(PathBuf::from))
            .or_else(|| self.catalog_root.clone())
            .or_else(|| std::env::current_dir().ok().and_then(|cwd| discover_catalog_root(&cwd)))
    }
}

/// Walks up from `start` looking for a directory with `templates/` or a sidecar
/// registry file.
#[must_use]
pub fn discover_catalog_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(CATALOG_DISCOVERY_DEPTH + 1)
        .find(|dir| dir.join(TEMPLATES_DIR).is_dir() || dir.join(SIDECAR_REGISTRY_FILE).is_file())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = DevcConfig::default();
        assert_eq!(config.merge.overflow_port_base, 45000);
        assert_eq!(config.merge.reserved_service, "devcontainer");
        assert!(config.merge.default_credentials.contains(&"student".to_string()));
        assert!(!config.registry.include_experimental);
        assert!(config.catalog_root.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: DevcConfig = toml::from_str("[merge]\noverflow_port_base = 50000\n").unwrap();
        assert_eq!(config.merge.overflow_port_base, 50000);
        assert_eq!(config.merge.reserved_service, "devcontainer");
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "catalog_root = \"/srv/catalog\"\n[merge]\nwarnings_as_errors = true\n[registry]\ninclude_experimental = true\n",
        )
        .unwrap();

        let config = DevcConfig::load_from(&path).await.unwrap();
        assert_eq!(config.catalog_root, Some(PathBuf::from("/srv/catalog")));
        assert!(config.merge.warnings_as_errors);
        assert!(config.registry.policy().include_experimental);
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[merge]\nreserved_service = \"\"\n").unwrap();
        assert!(DevcConfig::load_from(&path).await.is_err());

        std::fs::write(&path, "[merge\n").unwrap();
        assert!(DevcConfig::load_from(&path).await.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let result = DevcConfig::load(Some(temp.path().join("missing.toml"))).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_discover_catalog_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("templates")).unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(discover_catalog_root(&nested), Some(temp.path().to_path_buf()));
    }

    #[test]
    #[serial]
    fn test_cli_root_takes_precedence() {
        let config = DevcConfig {
            catalog_root: Some(PathBuf::from("/from/file")),
            ..DevcConfig::default()
        };
        assert_eq!(
            config.resolve_catalog_root(Some(PathBuf::from("/from/cli"))),
            Some(PathBuf::from("/from/cli"))
        );
    }
}
