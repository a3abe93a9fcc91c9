//! Command-line interface for devc.
//!
//! # Commands
//!
//! - `generate` - merge sidecars into a base template and write the stack
//! - `sidecars` - list and inspect the sidecar registry
//!
//! # Global options
//!
//! - `--verbose` / `-v`: debug logging
//! - `--quiet` / `-q`: errors only, and no informational notes
//! - `--config <PATH>`: configuration file (also `DEVC_CONFIG`)
//! - `--catalog-root <DIR>`: catalog holding `templates/` and `catalog/sidecars.json`
//!   (also `DEVC_CATALOG_ROOT`)
//!
//! Logging goes to stderr. `RUST_LOG` overrides the level chosen by the flags.
//!
//! # Examples
//!
//! ```bash
//! devc generate web --out generated/web --with-browser neko-chrome
//! devc --catalog-root ../catalog generate web -o out --with-browsers neko-chrome,kasm-chrome --dry-run
//! devc sidecars list --all --format json
//! devc sidecars show kasm-chrome
//! ```

mod generate;
mod sidecars;


pub use generate::GenerateCommand;
pub use sidecars::SidecarsCommand;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::DevcConfig;
use crate::constants::{CATALOG_ROOT_ENV, CONFIG_PATH_ENV};

/// Output format shared by the commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored output
    #[default]
    Text,
    /// Pretty-printed JSON for scripts
    Json,
}

/// Settings derived from the global flags, passed to every command.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Tracing filter; `None` means `RUST_LOG` or errors only
    pub log_level: Option<String>,
    pub quiet: bool,
    pub config_path: Option<PathBuf>,
    pub catalog_root: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the stderr tracing subscriber. Later calls are ignored.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Loads the configuration file this invocation points at.
    ///
    /// # Errors
    ///
    /// See [`DevcConfig::load`].
    pub async fn load_config(&self) -> Result<DevcConfig> {
        DevcConfig::load(self.config_path.clone()).await
    }
}

/// Devcontainer stack generator.
#[derive(Parser)]
#[command(
    name = "devc",
    about = "Generate devcontainer stacks from a base template and sidecar fragments",
    version,
    long_about = "devc merges sidecar containers (browsers, helper services) into a base devcontainer \
                  template, keeping compose comments and template directives intact."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(long, global = true, env = CONFIG_PATH_ENV, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Catalog root holding templates/ and catalog/sidecars.json
    #[arg(long, global = true, env = CATALOG_ROOT_ENV, value_name = "DIR")]
    catalog_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge sidecars into a base template and write the stack
    Generate(GenerateCommand),

    /// Inspect the sidecar registry
    Sidecars(SidecarsCommand),
}

impl Cli {
    /// Executes the parsed command.
    ///
    /// # Errors
    ///
    /// Returns whatever error the command produced.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Builds the [`CliConfig`] for the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            quiet: self.quiet,
            config_path: self.config.clone(),
            catalog_root: self.catalog_root.clone(),
        }
    }

    /// Executes the command with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns whatever error the command produced.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Generate(cmd) => cmd.execute(&config).await,
            Commands::Sidecars(cmd) => cmd.execute(&config).await,
        }
    }
}
