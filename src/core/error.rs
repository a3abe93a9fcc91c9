//! Error handling for devc
//!
//! This module provides the error types and user-friendly error reporting for the
//! stack generator. Two principles drive the design:
//! 1. **Strongly-typed errors** for the configuration failures that abort a merge run
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Templates**: [`DevcError::TemplateNotFound`], [`DevcError::InvalidTemplate`],
//!   [`DevcError::InvalidCompose`], [`DevcError::FileUnreadable`]
//! - **Directives**: [`DevcError::UnbalancedSection`], [`DevcError::UnanchoredSection`],
//!   [`DevcError::SectionRestoreFailed`], [`DevcError::LeakedPlaceholder`]
//! - **Sidecars**: [`DevcError::UnknownSidecar`], [`DevcError::SidecarNotAllowed`],
//!   [`DevcError::RegistryParseError`]
//! - **Ports**: [`DevcError::PortRangeExhausted`]
//! - **Output**: [`DevcError::OutputExists`], [`DevcError::WarningsAsErrors`]
//!
//! Policy warnings (port reassignment, credential collisions, missing required
//! environment) are never errors; they are collected as plan notes by the stack engine.
//!
//! # Examples
//!
//! ```rust,no_run
//! use devc_stack::core::{DevcError, ErrorContext, user_friendly_error};
//!
//! let error = DevcError::UnknownSidecar {
//!     id: "neko-chrom".to_string(),
//!     suggestion: Some("neko-chrome".to_string()),
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for stack generation
///
/// Every variant is a configuration error in the sense of the merge engine: it aborts
/// the run before any output is written.
#[derive(Error, Debug)]
pub enum DevcError {
    /// Base template directory does not exist
    #[error("Template '{template}' not found at {path}")]
    TemplateNotFound {
        /// Template identifier as requested by the user
        template: String,
        /// Directory that was searched
        path: String,
    },

    /// A required input file could not be read
    #[error("Failed to read {path}: {reason}")]
    FileUnreadable {
        /// Offending file
        path: String,
        /// Underlying reason
        reason: String,
    },

    /// Devcontainer JSON is malformed after placeholder protection
    #[error("Invalid template '{file}': {reason}")]
    InvalidTemplate {
        /// Offending file
        file: String,
        /// Parser message
        reason: String,
    },

    /// Compose document is not valid YAML
    #[error("Invalid compose document '{file}': {reason}")]
    InvalidCompose {
        /// Offending file
        file: String,
        /// Parser message
        reason: String,
    },

    /// A conditional section marker has no matching partner
    #[error("Unbalanced template section {directive} in '{file}'")]
    UnbalancedSection {
        /// The marker text as written in the template
        directive: String,
        /// File containing the marker
        file: String,
    },

    /// A conditional section does not wrap whole members of a single JSON object
    #[error("Template section {directive} in '{file}' does not wrap whole JSON object members")]
    UnanchoredSection {
        /// The opening marker text
        directive: String,
        /// File containing the marker
        file: String,
    },

    /// A conditional section could not be re-inserted after merging
    #[error("Failed to restore template section {directive}: {reason}")]
    SectionRestoreFailed {
        /// The opening marker text
        directive: String,
        /// Why the anchor could not be located
        reason: String,
    },

    /// A placeholder token survived restoration
    #[error("Placeholder token {token} leaked into the output")]
    LeakedPlaceholder {
        /// The synthetic token
        token: String,
    },

    /// Sidecar identifier is not in the registry
    #[error("Unknown sidecar: {id}")]
    UnknownSidecar {
        /// Requested identifier
        id: String,
        /// Closest known identifier, if any
        suggestion: Option<String>,
    },

    /// Sidecar is gated behind an opt-in flag
    #[error("Sidecar '{id}' is {stability} and disabled by default")]
    SidecarNotAllowed {
        /// Requested identifier
        id: String,
        /// Stability tag of the sidecar
        stability: String,
    },

    /// Sidecar registry file is malformed
    #[error("Invalid sidecar registry {path}: {reason}")]
    RegistryParseError {
        /// Registry file
        path: String,
        /// Parser message
        reason: String,
    },

    /// No free port remains above the overflow base
    #[error("No free host port available at or above {base}")]
    PortRangeExhausted {
        /// Configured overflow base
        base: u16,
    },

    /// Output directory already exists
    #[error("Refusing to overwrite existing directory: {path}")]
    OutputExists {
        /// Output directory
        path: String,
    },

    /// Strict mode turned warnings into a failure
    #[error("{count} warning(s) reported in strict mode")]
    WarningsAsErrors {
        /// Number of warnings
        count: usize,
    },

    /// Configuration file problems
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for DevcError {
    fn clone(&self) -> Self {
        match self {
            Self::TemplateNotFound {
                template,
                path,
            } => Self::TemplateNotFound {
                template: template.clone(),
                path: path.clone(),
            },
            Self::FileUnreadable {
                path,
                reason,
            } => Self::FileUnreadable {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::InvalidTemplate {
                file,
                reason,
            } => Self::InvalidTemplate {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::InvalidCompose {
                file,
                reason,
            } => Self::InvalidCompose {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::UnbalancedSection {
                directive,
                file,
            } => Self::UnbalancedSection {
                directive: directive.clone(),
                file: file.clone(),
            },
            Self::UnanchoredSection {
                directive,
                file,
            } => Self::UnanchoredSection {
                directive: directive.clone(),
                file: file.clone(),
            },
            Self::SectionRestoreFailed {
                directive,
                reason,
            } => Self::SectionRestoreFailed {
                directive: directive.clone(),
                reason: reason.clone(),
            },
            Self::LeakedPlaceholder {
                token,
            } => Self::LeakedPlaceholder {
                token: token.clone(),
            },
            Self::UnknownSidecar {
                id,
                suggestion,
            } => Self::UnknownSidecar {
                id: id.clone(),
                suggestion: suggestion.clone(),
            },
            Self::SidecarNotAllowed {
                id,
                stability,
            } => Self::SidecarNotAllowed {
                id: id.clone(),
                stability: stability.clone(),
            },
            Self::RegistryParseError {
                path,
                reason,
            } => Self::RegistryParseError {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::PortRangeExhausted {
                base,
            } => Self::PortRangeExhausted {
                base: *base,
            },
            Self::OutputExists {
                path,
            } => Self::OutputExists {
                path: path.clone(),
            },
            Self::WarningsAsErrors {
                count,
            } => Self::WarningsAsErrors {
                count: *count,
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // io::Error is not Clone
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show:
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context about the error in yellow (optional)
/// 3. **Suggestion**: Actionable steps to resolve the issue in green (optional)
///
/// ```rust,no_run
/// use devc_stack::core::{DevcError, ErrorContext};
///
/// let context = ErrorContext::new(DevcError::OutputExists { path: "out".into() })
///     .with_suggestion("Pass --force to replace the directory");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: DevcError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: DevcError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// The error chain is walked so that a [`DevcError`] wrapped by `anyhow` context is
/// still recognised. Anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(devc_error) = cause.downcast_ref::<DevcError>() {
            return create_error_context(devc_error.clone());
        }
        if let Some(context) = cause.downcast_ref::<ErrorContext>() {
            return ErrorContext {
                error: context.error.clone(),
                suggestion: context.suggestion.clone(),
                details: context.details.clone(),
            };
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(DevcError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check ownership and permissions of the output directory");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(DevcError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(DevcError::Other {
        message,
    })
}

fn create_error_context(error: DevcError) -> ErrorContext {
    match &error {
        DevcError::TemplateNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'devc generate' from the catalog root or pass --catalog-root / --template-dir")
            .with_details("Templates are read from <catalog>/templates/<id>/.template/"),

        DevcError::InvalidTemplate { .. } => ErrorContext::new(error)
            .with_suggestion("Check the devcontainer.json syntax; directives must use {{...}} delimiters")
            .with_details("The file must be valid JSON once template directives are substituted"),

        DevcError::InvalidCompose { .. } => ErrorContext::new(error)
            .with_suggestion("Service keys under 'services:' must use exactly two spaces of indentation"),

        DevcError::UnbalancedSection { .. } => ErrorContext::new(error)
            .with_suggestion("Every {{#name}} or {{^name}} needs a matching {{/name}}"),

        DevcError::UnanchoredSection { .. } | DevcError::SectionRestoreFailed { .. } => {
            ErrorContext::new(error)
                .with_suggestion("Wrap whole \"key\": value members of one object in each conditional section")
                .with_details("Sections are re-inserted around the object members they enclosed before merging")
        }

        DevcError::UnknownSidecar { suggestion, .. } => {
            let hint = match suggestion {
                Some(candidate) => format!("Did you mean '{candidate}'? Run 'devc sidecars list' to see available sidecars"),
                None => "Run 'devc sidecars list' to see available sidecars".to_string(),
            };
            ErrorContext::new(error).with_suggestion(hint)
        }

        DevcError::SidecarNotAllowed { stability, .. } => {
            let flag = if stability == "deprecated" {
                "--include-deprecated"
            } else {
                "--include-experimental"
            };
            let hint = format!("Pass {flag} to opt in");
            ErrorContext::new(error).with_suggestion(hint)
        }

        DevcError::OutputExists { .. } => ErrorContext::new(error)
            .with_suggestion("Pass --force to replace the directory contents"),

        DevcError::WarningsAsErrors { .. } => ErrorContext::new(error)
            .with_suggestion("Resolve the warnings above or run without --strict"),

        DevcError::PortRangeExhausted { .. } => ErrorContext::new(error)
            .with_suggestion("Lower merge.overflow_port_base in the configuration file"),

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_display() {
        let error = DevcError::SidecarNotAllowed {
            id: "neko-firefox".to_string(),
            stability: "experimental".to_string(),
        };
        assert_eq!(error.to_string(), "Sidecar 'neko-firefox' is experimental and disabled by default");
    }

    #[test]
    fn test_user_friendly_error_walks_context_chain() {
        let result: anyhow::Result<()> = Err(DevcError::UnknownSidecar {
            id: "kasm".to_string(),
            suggestion: Some("kasm-chrome".to_string()),
        })
        .context("Failed to select sidecars");

        let context = user_friendly_error(result.unwrap_err());
        assert!(matches!(context.error, DevcError::UnknownSidecar { .. }));
        assert!(context.suggestion.unwrap().contains("kasm-chrome"));
    }

    #[test]
    fn test_deprecated_suggests_matching_flag() {
        let context = user_friendly_error(anyhow::Error::from(DevcError::SidecarNotAllowed {
            id: "old".to_string(),
            stability: "deprecated".to_string(),
        }));
        assert!(context.suggestion.unwrap().contains("--include-deprecated"));
    }

    #[test]
    fn test_generic_error_includes_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let context = user_friendly_error(error);
        let text = context.to_string();
        assert!(text.contains("outer"));
        assert!(text.contains("root cause"));
    }

    #[test]
    fn test_io_error_clones_to_other() {
        let error = DevcError::IoError(std::io::Error::other("disk"));
        assert!(matches!(error.clone(), DevcError::Other { .. }));
    }
}
