//! Text-level merge of sidecar compose fragments into a base compose document.

use super::blocks::{TextBlock, expand_inline_header, extract_blocks, extract_section_entries, locate_section};
use crate::constants::SHARED_COMPOSE_SECTIONS;

/// Why a fragment service was not added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Name of the primary workspace service
    Reserved,
    /// A service of that name is already present
    Duplicate,
}

/// A fragment service left out of the merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedService {
    pub name: String,
    pub reason: SkipReason,
}

/// A compose fragment contributed by one sidecar, with ports already rewritten.
#[derive(Debug, Clone)]
pub struct ComposeFragment {
    pub sidecar: String,
    pub text: String,
}

/// Outcome of merging one or more fragments.
#[derive(Debug, Clone, Default)]
pub struct ComposeMerge {
    pub text: String,
    pub added: Vec<String>,
    pub skipped: Vec<SkippedService>,
}

fn with_single_newline(text: &str) -> String {
    let mut text = text.trim_end_matches(['\n', '\r']).to_string();
    text.push('\n');
    text
}

fn insert_services(text: &str, blocks: &[&TextBlock]) -> String {
    if blocks.is_empty() {
        return text.to_string();
    }

    let text = expand_inline_header(text, "services");
    let rendered: String = blocks.iter().map(|block| format!("\n{}", block.text)).collect();

    match locate_section(&text, "services") {
        Some(region) => {
            let mut merged = String::with_capacity(text.len() + rendered.len() + 1);
            merged.push_str(&text[..region.insert_at]);
            if !merged.ends_with('\n') {
                merged.push('\n');
            }
            if region.insert_at == region.body_start {
                // Empty section: no blank line between header and first block
                merged.push_str(&rendered[1..]);
            } else {
                merged.push_str(&rendered);
            }
            merged.push_str(&text[region.insert_at..]);
            merged
        }
        None => {
            let mut merged = text.trim_end().to_string();
            if !merged.is_empty() {
                merged.push_str("\n\n");
            }
            merged.push_str("services:");
            merged.push_str(&rendered);
            merged
        }
    }
}

/// Unions one top-level section of `fragment` into `base` by entry name.
fn merge_section(base: &str, fragment: &str, section: &str) -> String {
    let additions = extract_section_entries(fragment, section);
    if additions.is_empty() {
        return base.to_string();
    }

    let existing = extract_section_entries(base, section);
    let missing: String = additions
        .iter()
        .filter(|entry| !existing.contains(&entry.name))
        .map(|entry| entry.text.as_str())
        .collect();
    if missing.is_empty() {
        return base.to_string();
    }

    let base = expand_inline_header(base, section);
    match locate_section(&base, section) {
        Some(region) => {
            let mut merged = String::with_capacity(base.len() + missing.len() + 1);
            merged.push_str(&base[..region.insert_at]);
            if !merged.ends_with('\n') {
                merged.push('\n');
            }
            merged.push_str(&missing);
            merged.push_str(&base[region.insert_at..]);
            merged
        }
        None => {
            let mut merged = base.trim_end().to_string();
            if !merged.is_empty() {
                merged.push_str("\n\n");
            }
            merged.push_str(section);
            merged.push_str(":\n");
            merged.push_str(&missing);
            merged
        }
    }
}

/// Unions the `volumes`, `networks`, `configs` and `secrets` entries of
/// `fragment` into `base`. Entries already present in `base` win.
#[must_use]
pub fn merge_top_level_sections(base: &str, fragment: &str) -> String {
    SHARED_COMPOSE_SECTIONS
        .iter()
        .fold(base.to_string(), |text, section| merge_section(&text, fragment, section))
}

/// Merges one fragment's services and shared sections into `base`.
///
/// Services named `reserved`, and services whose name is already present, are
/// skipped. New blocks are appended at the end of the `services:` section, each
/// preceded by a blank line.
#[must_use]
pub fn merge_fragment(base: &str, fragment: &ComposeFragment, reserved: &str) -> ComposeMerge {
    let present = extract_blocks(base);
    let mut added = Vec::new();
    let mut skipped = Vec::new();
    let mut blocks: Vec<&TextBlock> = Vec::new();

    let fragment_blocks = extract_blocks(&fragment.text);
    for block in &fragment_blocks {
        let reason = if block.name == reserved {
            Some(SkipReason::Reserved)
        } else if present.contains(&block.name) || added.contains(&block.name) {
            Some(SkipReason::Duplicate)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::debug!(
                    "Skipping service '{}' from {}: {:?}",
                    block.name,
                    fragment.sidecar,
                    reason
                );
                skipped.push(SkippedService {
                    name: block.name.clone(),
                    reason,
                });
            }
            None => {
                tracing::debug!("Adding service '{}' from {}", block.name, fragment.sidecar);
                added.push(block.name.clone());
                blocks.push(block);
            }
        }
    }

    let text = insert_services(base, &blocks);
    let text = merge_top_level_sections(&text, &fragment.text);

    ComposeMerge {
        text: with_single_newline(&text),
        added,
        skipped,
    }
}

/// Merges every fragment into `base` in order. The first writer of a service name wins.
#[must_use]
pub fn merge_compose(base: &str, fragments: &[ComposeFragment], reserved: &str) -> ComposeMerge {
    fragments.iter().fold(
        ComposeMerge {
            text: base.to_string(),
            ..ComposeMerge::default()
        },
        |mut acc, fragment| {
            let step = merge_fragment(&acc.text, fragment, reserved);
            acc.text = step.text;
            acc.added.extend(step.added);
            acc.skipped.extend(step.skipped);
            acc
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "\
services:
  devcontainer:
    image: dev/base
    ports:
      - \"3000:3000\"

  # Existing API service should be preserved
  api:
    image: dev/api
    ports:
      - \"4000:4000\"

volumes:
  data: {}
";

    const BROWSER: &str = "\
services:
  # Browser sidecar comment should survive merge
  browser:
    image: test/browser:latest
    ports:
      - \"3000:3000\"
    volumes:
      - browser-data:/data

volumes:
  browser-data: {}
";

    fn fragment(sidecar: &str, text: &str) -> ComposeFragment {
        ComposeFragment {
            sidecar: sidecar.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_block_inserted_at_end_of_services() {
        let merged = merge_fragment(BASE, &fragment("browser", BROWSER), "devcontainer");
        assert_eq!(merged.added, vec!["browser".to_string()]);
        assert!(merged.text.contains(
            "      - \"4000:4000\"\n\n  # Browser sidecar comment should survive merge\n  browser:\n"
        ));

        let services_end = merged.text.find("\nvolumes:").unwrap();
        assert!(merged.text.find("  browser:").unwrap() < services_end);
    }

    #[test]
    fn test_shared_sections_unioned() {
        let merged = merge_fragment(BASE, &fragment("browser", BROWSER), "devcontainer");
        assert!(merged.text.ends_with("volumes:\n  data: {}\n  browser-data: {}\n"));

        let doc: serde_yaml::Value = serde_yaml::from_str(&merged.text).unwrap();
        assert!(doc["volumes"].get("data").is_some());
        assert!(doc["volumes"].get("browser-data").is_some());
        assert!(doc["services"].get("browser").is_some());
    }

    #[test]
    fn test_reserved_and_duplicate_services_skipped() {
        let extra = "services:\n  devcontainer:\n    image: other\n  api:\n    image: other/api\n";
        let merged = merge_fragment(BASE, &fragment("extra", extra), "devcontainer");

        assert!(merged.added.is_empty());
        assert_eq!(
            merged.skipped,
            vec![
                SkippedService {
                    name: "devcontainer".to_string(),
                    reason: SkipReason::Reserved,
                },
                SkippedService {
                    name: "api".to_string(),
                    reason: SkipReason::Duplicate,
                },
            ]
        );
        assert!(!merged.text.contains("other"));
    }

    #[test]
    fn test_same_fragment_twice_adds_once() {
        let fragments = vec![fragment("browser", BROWSER), fragment("browser", BROWSER)];
        let merged = merge_compose(BASE, &fragments, "devcontainer");

        assert_eq!(merged.text.matches("  browser:\n").count(), 1);
        assert_eq!(merged.text.matches("browser-data: {}").count(), 1);
        assert_eq!(merged.skipped.len(), 1);
    }

    #[test]
    fn test_services_section_created_when_absent() {
        let merged = merge_fragment("volumes:\n  data: {}\n", &fragment("browser", BROWSER), "devcontainer");
        assert!(merged.text.starts_with("volumes:\n  data: {}\n  browser-data: {}\n"));
        assert!(merged.text.contains("\n\nservices:\n  # Browser sidecar comment"));
        let doc: serde_yaml::Value = serde_yaml::from_str(&merged.text).unwrap();
        assert!(doc["services"].get("browser").is_some());
    }

    #[test]
    fn test_empty_services_section_filled() {
        let merged = merge_fragment("services: {}\n", &fragment("browser", BROWSER), "devcontainer");
        assert!(merged.text.starts_with("services:\n  # Browser sidecar comment"));
    }

    #[test]
    fn test_output_ends_with_single_newline() {
        let base = "services:\n  web:\n    image: a";
        let merged = merge_fragment(base, &fragment("browser", BROWSER), "devcontainer");
        assert!(merged.text.ends_with('\n'));
        assert!(!merged.text.ends_with("\n\n"));
        assert!(merged.text.contains("    image: a\n\n  # Browser sidecar comment"));
    }

    #[test]
    fn test_untouched_base_keeps_trailing_spaces() {
        let base = "services:\n  web:\n    image: a  \n\n";
        let merged = merge_fragment(base, &fragment("dup", "services:\n  web:\n    image: b\n"), "devcontainer");
        assert!(merged.added.is_empty());
        assert_eq!(merged.text, "services:\n  web:\n    image: a  \n");
    }

    #[test]
    fn test_networks_section_created() {
        let fragment_text = "services:\n  cache:\n    image: redis\nnetworks:\n  backend:\n    driver: bridge\n";
        let merged = merge_fragment(BASE, &fragment("cache", fragment_text), "devcontainer");
        assert!(merged.text.ends_with("\n\nnetworks:\n  backend:\n    driver: bridge\n"));
    }
}
