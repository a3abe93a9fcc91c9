//! devc: devcontainer stack generation.
//!
//! devc builds classroom and workspace devcontainer stacks. A base template
//! directory (a `docker-compose.yml` plus `.devcontainer/devcontainer.json`) is
//! combined with any number of sidecar fragments, such as browser containers, into
//! one output directory.
//!
//! # Architecture
//!
//! - [`vault`] shields `{{...}}` template directives from the JSON parser and puts
//!   them back after merging
//! - [`compose`] splices compose service blocks as text, keeping comments
//! - [`devcontainer`] merges devcontainer configuration trees field by field
//! - [`ports`] keeps host ports unique across the base template and its sidecars
//! - [`sidecar`] describes sidecars and loads the registry
//! - [`stack`] folds the selected sidecars into a base template and writes the result
//! - [`config`] reads the optional TOML configuration file
//! - [`cli`] is the `devc` command-line interface
//!
//! # Example
//!
//! ```bash
//! devc generate web --out generated/web --with-browser neko-chrome
//! devc generate web --out generated/web --with-browsers neko-chrome,kasm-chrome --dry-run --format json
//! devc sidecars list --all
//! ```

pub mod cli;
pub mod compose;
pub mod config;
pub mod constants;
pub mod core;
pub mod devcontainer;
pub mod ports;
pub mod sidecar;
pub mod stack;
pub mod utils;
pub mod vault;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
