//! Text-region extraction for compose documents.
//!
//! Compose files are handled as text so that comments, blank lines and quoting
//! survive a merge untouched. A *section* is a top-level key such as `services:`
//! written at column 0; its *entries* are the lines indented by exactly two spaces
//! that open a nested key. Each entry's block runs until the next entry (or the end
//! of the section) and includes any two-space `#` comment lines directly above it.

use std::sync::LazyLock;

use regex::Regex;

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^  (?:"([^"]+)"|'([^']+)'|([A-Za-z0-9_.\-]+))\s*:(?:\s|$)"#)
        .expect("entry pattern is valid")
});

/// One named entry of a compose section, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    /// Entry key with any quotes removed
    pub name: String,
    /// Entry text including leading comments, always newline-terminated
    pub text: String,
}

/// Ordered entries of one compose section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlocks {
    blocks: Vec<TextBlock>,
}

impl TextBlocks {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TextBlock> {
        self.blocks.iter().find(|block| block.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|block| block.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TextBlock> {
        self.blocks.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl<'a> IntoIterator for &'a TextBlocks {
    type Item = &'a TextBlock;
    type IntoIter = std::slice::Iter<'a, TextBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// Byte region of a top-level section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRegion {
    /// Offset of the header line
    pub header_start: usize,
    /// Offset of the first line after the header
    pub body_start: usize,
    /// Offset of the first line after the section
    pub end: usize,
    /// Offset just past the section's last indented content line
    pub insert_at: usize,
    /// Header written in flow style, e.g. `volumes: {}`
    pub inline_empty: bool,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    end: usize,
    content: &'a str,
}

fn lines(text: &str) -> Vec<Line<'_>> {
    let mut result = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let end = text[start..].find('\n').map_or(text.len(), |i| start + i + 1);
        result.push(Line {
            start,
            end,
            content: text[start..end].trim_end_matches(['\n', '\r']),
        });
        start = end;
    }
    result
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_indented(line: &str) -> bool {
    line.starts_with([' ', '\t'])
}

fn is_entry_comment(line: &str) -> bool {
    line.strip_prefix("  ").is_some_and(|rest| rest.starts_with('#'))
}

/// Parses a column-0 `name:` header, returning whether it is written as `name: {}`.
fn header_kind(line: &str, section: &str) -> Option<bool> {
    let rest = line.strip_prefix(section)?.strip_prefix(':')?;
    let rest = rest.split_once('#').map_or(rest, |(before, _)| before).trim();
    match rest {
        "" => Some(false),
        "{}" => Some(true),
        _ => None,
    }
}

/// Finds the top-level `section:` header and the extent of its body.
///
/// The body ends at the first non-blank line written at column 0 that is not a
/// comment. Returns `None` when the document has no such header.
#[must_use]
pub fn locate_section(text: &str, section: &str) -> Option<SectionRegion> {
    let all = lines(text);
    let (header_index, inline_empty) = all
        .iter()
        .enumerate()
        .find_map(|(i, line)| header_kind(line.content, section).map(|inline| (i, inline)))?;

    let header = all[header_index];
    let mut end = text.len();
    let mut insert_at = header.end;
    for line in &all[header_index + 1..] {
        if is_blank(line.content) {
            continue;
        }
        if !is_indented(line.content) {
            if line.content.starts_with('#') {
                continue;
            }
            end = line.start;
            break;
        }
        insert_at = line.end;
    }

    Some(SectionRegion {
        header_start: header.start,
        body_start: header.end,
        end,
        insert_at,
        inline_empty,
    })
}

/// Extracts the entries of a top-level section in document order.
///
/// A missing section, or one written as `name: {}`, yields no entries.
#[must_use]
pub fn extract_section_entries(text: &str, section: &str) -> TextBlocks {
    let Some(region) = locate_section(text, section) else {
        return TextBlocks::default();
    };
    if region.inline_empty {
        return TextBlocks::default();
    }

    let body: Vec<Line<'_>> = lines(text)
        .into_iter()
        .filter(|line| line.start >= region.body_start && line.start < region.end)
        .collect();

    let mut starts = Vec::new();
    for (i, line) in body.iter().enumerate() {
        if let Some(captures) = ENTRY.captures(line.content) {
            let name = captures
                .get(1)
                .or_else(|| captures.get(2))
                .or_else(|| captures.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();

            let mut first = i;
            while first > 0 && is_entry_comment(body[first - 1].content) {
                first -= 1;
            }
            starts.push((first, name));
        }
    }

    let mut blocks = Vec::with_capacity(starts.len());
    for (k, (first, name)) in starts.iter().enumerate() {
        let mut last = starts.get(k + 1).map_or(body.len(), |(next, _)| *next);
        while last > *first + 1 {
            let content = body[last - 1].content;
            if is_blank(content) || !is_indented(content) {
                last -= 1;
            } else {
                break;
            }
        }

        let mut block = text[body[*first].start..body[last - 1].end].to_string();
        if !block.ends_with('\n') {
            block.push('\n');
        }
        tracing::trace!("Extracted {}.{} ({} bytes)", section, name, block.len());
        blocks.push(TextBlock {
            name: name.clone(),
            text: block,
        });
    }

    TextBlocks {
        blocks,
    }
}

/// Extracts the service blocks of a compose document.
#[must_use]
pub fn extract_blocks(text: &str) -> TextBlocks {
    extract_section_entries(text, "services")
}

/// Rewrites a `name: {}` header to block style so entries can be appended.
#[must_use]
pub fn expand_inline_header(text: &str, section: &str) -> String {
    match locate_section(text, section) {
        Some(region) if region.inline_empty => format!(
            "{}{section}:\n{}",
            &text[..region.header_start],
            &text[region.body_start..]
        ),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = "\
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

    #[test]
    fn test_extract_blocks_in_order() {
        let blocks = extract_blocks(COMPOSE);
        let names: Vec<_> = blocks.names().collect();
        assert_eq!(names, vec!["devcontainer", "api"]);
    }

    #[test]
    fn test_leading_comment_belongs_to_following_block() {
        let blocks = extract_blocks(COMPOSE);
        let api = blocks.get("api").unwrap();
        assert!(api.text.starts_with("  # Existing API service should be preserved\n  api:\n"));

        let devcontainer = blocks.get("devcontainer").unwrap();
        assert!(!devcontainer.text.contains("Existing API"));
        assert!(devcontainer.text.ends_with("      - \"3000:3000\"\n"));
    }

    #[test]
    fn test_trailing_blank_lines_excluded() {
        let blocks = extract_blocks(COMPOSE);
        assert!(!blocks.get("devcontainer").unwrap().text.ends_with("\n\n"));
        assert!(blocks.get("api").unwrap().text.ends_with("- \"4000:4000\"\n"));
    }

    #[test]
    fn test_quoted_service_names() {
        let text = "services:\n  \"web-app\":\n    image: a\n  'worker':\n    image: b\n";
        let names: Vec<_> = extract_blocks(text).names().map(str::to_string).collect();
        assert_eq!(names, vec!["web-app", "worker"]);
    }

    #[test]
    fn test_no_services_header() {
        assert!(extract_blocks("version: \"3\"\nvolumes:\n  data: {}\n").is_empty());
        assert!(extract_blocks("").is_empty());
    }

    #[test]
    fn test_nested_keys_are_not_entries() {
        let text = "services:\n  web:\n    environment:\n      KEY: value\n    volumes:\n      - data:/data\n";
        let blocks = extract_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert!(blocks.get("web").unwrap().text.contains("KEY: value"));
    }

    #[test]
    fn test_section_entries_for_volumes() {
        let entries = extract_section_entries(COMPOSE, "volumes");
        assert_eq!(entries.names().collect::<Vec<_>>(), vec!["data"]);
        assert_eq!(entries.get("data").unwrap().text, "  data: {}\n");
    }

    #[test]
    fn test_locate_section_bounds() {
        let region = locate_section(COMPOSE, "services").unwrap();
        assert_eq!(region.header_start, 0);
        assert!(COMPOSE[region.end..].starts_with("volumes:"));
        assert!(COMPOSE[..region.insert_at].ends_with("- \"4000:4000\"\n"));
        assert!(!region.inline_empty);

        let volumes = locate_section(COMPOSE, "volumes").unwrap();
        assert_eq!(volumes.end, COMPOSE.len());
        assert!(locate_section(COMPOSE, "networks").is_none());
    }

    #[test]
    fn test_column_zero_comment_does_not_end_section() {
        let text = "services:\n  a:\n    image: a\n# shared\n  b:\n    image: b\n";
        assert_eq!(extract_blocks(text).len(), 2);
    }

    #[test]
    fn test_expand_inline_header() {
        let text = "services:\n  a:\n    image: a\nvolumes: {}\n";
        let expanded = expand_inline_header(text, "volumes");
        assert_eq!(expanded, "services:\n  a:\n    image: a\nvolumes:\n");
        assert_eq!(expand_inline_header(COMPOSE, "volumes"), COMPOSE);
    }
}
