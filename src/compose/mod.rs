//! Comment-preserving handling of `docker-compose.yml` documents.
//!
//! Compose documents are never re-serialized. Service blocks and shared top-level
//! entries are lifted out of sidecar fragments as verbatim text and spliced into the
//! base document, so comments, quoting and blank lines stay exactly as authored.
//! `serde_yaml` is only used to read published ports and to check that the merged
//! text still parses.
//!
//! - [`blocks`] - locating sections and extracting named entries
//! - [`merge`] - splicing fragments into a base document
//! - [`ports`] - rewriting and collecting published host ports

pub mod blocks;
pub mod merge;
pub mod ports;

pub use blocks::{TextBlock, TextBlocks, extract_blocks, extract_section_entries, locate_section};
pub use merge::{
    ComposeFragment, ComposeMerge, SkipReason, SkippedService, merge_compose, merge_fragment,
    merge_top_level_sections,
};
pub use ports::{published_ports, rewrite_published_ports};

use crate::core::DevcError;

/// Checks that merged compose text is still valid YAML.
///
/// # Errors
///
/// Returns [`DevcError::InvalidCompose`] naming `file` when parsing fails.
pub fn validate_compose(text: &str, file: &str) -> Result<(), DevcError> {
    serde_yaml::from_str::<serde_yaml::Value>(text).map(|_| ()).map_err(|e| {
        DevcError::InvalidCompose {
            file: file.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_compose() {
        assert!(validate_compose("services:\n  web:\n    image: a\n", "docker-compose.yml").is_ok());

        let err = validate_compose("services:\n  web: [\n", "docker-compose.yml").unwrap_err();
        assert!(matches!(err, DevcError::InvalidCompose { ref file, .. } if file == "docker-compose.yml"));
    }
}
