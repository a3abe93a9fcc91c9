//! Utility functions shared across devc.

pub mod fs;

pub use fs::{atomic_write, copy_dir, ensure_dir, list_files, prepare_output_dir, read_text_file, safe_write};
