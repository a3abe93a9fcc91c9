//! Test utilities for devc
//!
//! Helpers for building throwaway catalogs on disk and for turning on logging in
//! tests. Available to unit tests and, behind the `test-utils` feature, to the
//! integration tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use devc_stack::test_utils::{CatalogFixture, fixtures};
//!
//! let catalog = CatalogFixture::new().unwrap();
//! catalog.add_template("demo-stack", fixtures::BASE_COMPOSE, fixtures::BASE_DEVCONTAINER).unwrap();
//! catalog.add_sidecar("sidecars/browser/.template", Some(fixtures::BROWSER_COMPOSE), None).unwrap();
//! ```

pub mod catalog;
pub mod fixtures;

pub use catalog::CatalogFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`. With neither, logging stays off.
///
/// ```bash
/// RUST_LOG=devc_stack=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
