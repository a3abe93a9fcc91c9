//! Core types and error handling shared across devc.
//!
//! - [`DevcError`] - configuration errors that abort a merge run
//! - [`ErrorContext`] - user-facing wrapper with details and suggestions
//! - [`user_friendly_error`] - conversion from any `anyhow::Error` for CLI display

pub mod error;

pub use error::{DevcError, ErrorContext, user_friendly_error};
