//! Integration test suite for devc
//!
//! End-to-end tests driving the `devc` binary against throwaway catalogs.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **generate**: stack generation, dry runs, strict mode, output handling
//! - **sidecars**: registry listing and inspection

#[path = "../common/mod.rs"]
mod common;

mod generate;
mod sidecars;
