//! Placeholder vault for template directives embedded in devcontainer JSON.
//!
//! Devcontainer templates carry mustache-style directives that make them invalid
//! JSON until a templating step runs:
//!
//! ```text
//! {
//!   "name": "{{templateOption.name}}",
//! {{#templateOption.usePrebuiltImage}}
//!   "image": "ghcr.io/example/dev-web:latest",
//! {{/templateOption.usePrebuiltImage}}
//!   "forwardPorts": [{{templateOption.port}}]
//! }
//! ```
//!
//! The vault makes such text parseable, lets the caller merge the parsed tree, and
//! puts every directive back afterwards:
//!
//! - **Inline tags** become synthetic tokens. Inside a string the token is spliced
//!   in as-is; outside a string the vault wraps it in quotes and remembers that it
//!   did ([`PlaceholderToken::quoted`]).
//! - **Conditional markers** (`{{#x}}`, `{{^x}}`, `{{/x}}`, `{{else}}`) are removed.
//!   Each section is anchored to the object members it wraps: the path of the
//!   parent object plus the ordered member keys. On restore the members are
//!   located in the new text and the markers re-inserted around them.
//!
//! Anchors survive any merge that keeps the wrapped members in the same object and
//! adjacent to each other. Removing a wrapped member, or inserting a new key between
//! two wrapped members, makes restoration fail with
//! [`DevcError::SectionRestoreFailed`].

mod spans;


use serde_json::Value;

use crate::constants::PLACEHOLDER_PREFIX;
use crate::core::DevcError;

pub use spans::PathSegment;
use spans::{DisplayPath, SpanIndex};

/// A directive replaced by a synthetic token during protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    /// Synthetic identifier injected into the text
    pub token: String,
    /// Verbatim directive text
    pub original: String,
    /// Whether the vault added its own quotation marks around the token
    pub quoted: bool,
}

/// A conditional section anchored to members of one JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionAnchor {
    /// Marker opening the section, verbatim (`{{#x}}`, `{{^x}}` or `{{else}}`)
    pub open: String,
    /// Marker closing the section; `None` when an `{{else}}` branch follows
    pub close: Option<String>,
    /// Path of the object holding the wrapped members
    pub parent: Vec<PathSegment>,
    /// Keys of the wrapped members, in document order
    pub keys: Vec<String>,
}

/// Result of [`PlaceholderVault::protect`].
#[derive(Debug, Clone)]
pub struct ProtectedText {
    /// Parsed document with tokens in place of directives
    pub value: Value,
    /// Conditional sections found in the document
    pub sections: Vec<SectionAnchor>,
    /// Tokens used by this document, including ones shared with earlier documents
    pub tokens: Vec<PlaceholderToken>,
}

/// Extracts template directives and restores them after a structural transform.
///
/// One vault is shared by every document taking part in a merge so token numbering
/// never repeats and a directive maps to the same token in every document.
#[derive(Debug, Default)]
pub struct PlaceholderVault {
    tokens: Vec<PlaceholderToken>,
    salt: usize,
}

enum Directive<'a> {
    Open { name: &'a str },
    Close { name: &'a str },
    Else,
    Inline,
}

fn classify(directive: &str) -> Directive<'_> {
    let inner = directive[2..directive.len() - 2].trim();
    if let Some(name) = inner.strip_prefix('#').or_else(|| inner.strip_prefix('^')) {
        Directive::Open {
            name: name.trim(),
        }
    } else if let Some(name) = inner.strip_prefix('/') {
        Directive::Close {
            name: name.trim(),
        }
    } else if inner == "else" {
        Directive::Else
    } else {
        Directive::Inline
    }
}

struct OpenFrame<'a> {
    text: &'a str,
    name: &'a str,
    start: usize,
    branch: Option<(&'a str, usize)>,
}

struct RawSection {
    open: String,
    close: Option<String>,
    start: usize,
    end: usize,
}

impl PlaceholderVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every token issued so far.
    #[must_use]
    pub fn tokens(&self) -> &[PlaceholderToken] {
        &self.tokens
    }

    fn token_marker(&self) -> String {
        if self.salt == 0 {
            format!("{PLACEHOLDER_PREFIX}_")
        } else {
            format!("{PLACEHOLDER_PREFIX}{}_", self.salt)
        }
    }

    /// Returns the token standing for `original`, issuing one on first use.
    ///
    /// Identical directives share a token so they compare equal in the parsed tree.
    fn issue_token(&mut self, original: &str, quoted: bool) -> PlaceholderToken {
        if let Some(existing) = self.tokens.iter().find(|t| t.original == original && t.quoted == quoted) {
            return existing.clone();
        }
        let placeholder = PlaceholderToken {
            token: format!("{}{}__", self.token_marker(), self.tokens.len()),
            original: original.to_string(),
            quoted,
        };
        self.tokens.push(placeholder.clone());
        placeholder
    }

    /// Replaces every directive in a plain string value with its token.
    ///
    /// Used for values that enter the tree without passing through
    /// [`protect`](Self::protect), so they compare equal to protected document values.
    pub fn protect_str(&mut self, value: &str) -> String {
        if !value.contains("{{") {
            return value.to_string();
        }
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find("{{")
            && let Some(rel_end) = rest[start + 2..].find("}}")
        {
            let end = start + 2 + rel_end + 2;
            out.push_str(&rest[..start]);
            out.push_str(&self.issue_token(&rest[start..end], false).token);
            rest = &rest[end..];
        }
        out.push_str(rest);
        out
    }

    /// Replaces directives in `text` and parses the result.
    ///
    /// `file` only labels error messages.
    ///
    /// # Errors
    ///
    /// - [`DevcError::UnbalancedSection`] for unmatched conditional markers
    /// - [`DevcError::InvalidTemplate`] when the text is not JSON after substitution
    /// - [`DevcError::UnanchoredSection`] when a section does not wrap whole members
    pub fn protect(&mut self, text: &str, file: &str) -> Result<ProtectedText, DevcError> {
        while text.contains(&self.token_marker()) {
            self.salt += 1;
        }
        if let Some(existing) = self.tokens.iter().find(|t| text.contains(&t.token)) {
            return Err(DevcError::InvalidTemplate {
                file: file.to_string(),
                reason: format!("contains reserved placeholder text {}", existing.token),
            });
        }

        let mut tokens: Vec<PlaceholderToken> = Vec::new();
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut in_string = false;
        let mut escaped = false;
        let mut stack: Vec<OpenFrame<'_>> = Vec::new();
        let mut raw_sections = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'{'
                && bytes.get(i + 1) == Some(&b'{')
                && let Some(rel_end) = text[i + 2..].find("}}")
            {
                let end = i + 2 + rel_end + 2;
                let directive = &text[i..end];
                out.push_str(&text[copied..i]);
                copied = end;
                i = end;

                if in_string {
                    // Markers inside string values are plain text to the JSON layer
                    let placeholder = self.issue_token(directive, false);
                    out.push_str(&placeholder.token);
                    if !tokens.contains(&placeholder) {
                        tokens.push(placeholder);
                    }
                    continue;
                }

                match classify(directive) {
                    Directive::Inline => {
                        let placeholder = self.issue_token(directive, true);
                        out.push('"');
                        out.push_str(&placeholder.token);
                        out.push('"');
                        if !tokens.contains(&placeholder) {
                            tokens.push(placeholder);
                        }
                    }
                    Directive::Open {
                        name,
                    } => stack.push(OpenFrame {
                        text: directive,
                        name,
                        start: out.len(),
                        branch: None,
                    }),
                    Directive::Else => match stack.last_mut() {
                        Some(frame) if frame.branch.is_none() => {
                            frame.branch = Some((directive, out.len()));
                        }
                        _ => {
                            return Err(DevcError::UnbalancedSection {
                                directive: directive.to_string(),
                                file: file.to_string(),
                            });
                        }
                    },
                    Directive::Close {
                        name,
                    } => {
                        let frame = match stack.pop() {
                            Some(frame) if frame.name == name => frame,
                            _ => {
                                return Err(DevcError::UnbalancedSection {
                                    directive: directive.to_string(),
                                    file: file.to_string(),
                                });
                            }
                        };
                        match frame.branch {
                            Some((else_text, else_start)) => {
                                raw_sections.push(RawSection {
                                    open: frame.text.to_string(),
                                    close: None,
                                    start: frame.start,
                                    end: else_start,
                                });
                                raw_sections.push(RawSection {
                                    open: else_text.to_string(),
                                    close: Some(directive.to_string()),
                                    start: else_start,
                                    end: out.len(),
                                });
                            }
                            None => raw_sections.push(RawSection {
                                open: frame.text.to_string(),
                                close: Some(directive.to_string()),
                                start: frame.start,
                                end: out.len(),
                            }),
                        }
                    }
                }
                continue;
            }

            match bytes[i] {
                _ if escaped => escaped = false,
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                _ => {}
            }
            i += 1;
        }
        out.push_str(&text[copied..]);

        if let Some(frame) = stack.pop() {
            return Err(DevcError::UnbalancedSection {
                directive: frame.text.to_string(),
                file: file.to_string(),
            });
        }

        let value: Value = serde_json::from_str(&out).map_err(|e| DevcError::InvalidTemplate {
            file: file.to_string(),
            reason: e.to_string(),
        })?;

        let sections = if raw_sections.is_empty() {
            Vec::new()
        } else {
            anchor_sections(&out, raw_sections, file)?
        };

        tracing::debug!(
            "Protected {}: {} placeholder(s), {} section(s)",
            file,
            tokens.len(),
            sections.len()
        );

        Ok(ProtectedText {
            value,
            sections,
            tokens,
        })
    }

    /// Re-inserts `sections` into `serialized` and swaps every token back to its
    /// original directive.
    ///
    /// # Errors
    ///
    /// - [`DevcError::SectionRestoreFailed`] when a section's anchored members are
    ///   missing or no longer adjacent
    /// - [`DevcError::LeakedPlaceholder`] when a token survives substitution
    pub fn restore(&self, serialized: &str, sections: &[SectionAnchor]) -> Result<String, DevcError> {
        let mut restored = if sections.is_empty() {
            serialized.to_string()
        } else {
            reinsert_sections(serialized, sections)?
        };

        for placeholder in &self.tokens {
            if placeholder.quoted {
                restored =
                    restored.replace(&format!("\"{}\"", placeholder.token), &placeholder.original);
            }
            // Tokens moved into a larger string keep no vault quotes of their own
            restored = restored.replace(&placeholder.token, &placeholder.original);
        }

        if let Some(leaked) = self.tokens.iter().find(|t| restored.contains(&t.token)) {
            return Err(DevcError::LeakedPlaceholder {
                token: leaked.token.clone(),
            });
        }

        Ok(restored)
    }
}

fn anchor_sections(
    text: &str,
    raw_sections: Vec<RawSection>,
    file: &str,
) -> Result<Vec<SectionAnchor>, DevcError> {
    let index = SpanIndex::build(text).map_err(|reason| DevcError::InvalidTemplate {
        file: file.to_string(),
        reason,
    })?;

    let mut anchors = Vec::with_capacity(raw_sections.len());
    for raw in raw_sections {
        let mut enclosed: Vec<(&[PathSegment], &str)> = Vec::new();
        for object in index.objects() {
            for member in &object.members {
                if member.key_start >= raw.start && member.value_end <= raw.end {
                    enclosed.push((&object.path, &member.key));
                }
            }
        }

        let unanchored = || DevcError::UnanchoredSection {
            directive: raw.open.clone(),
            file: file.to_string(),
        };

        let depth = enclosed.iter().map(|(path, _)| path.len()).min().ok_or_else(unanchored)?;
        let outermost: Vec<_> = enclosed.into_iter().filter(|(path, _)| path.len() == depth).collect();
        let parent = outermost[0].0;
        if outermost.iter().any(|(path, _)| *path != parent) {
            return Err(unanchored());
        }

        anchors.push(SectionAnchor {
            open: raw.open,
            close: raw.close,
            parent: parent.to_vec(),
            keys: outermost.iter().map(|(_, key)| (*key).to_string()).collect(),
        });
    }

    Ok(anchors)
}

struct Edit {
    pos: usize,
    // closes sort before opens at the same offset
    class: u8,
    order: usize,
    text: String,
}

fn line_start(text: &str, pos: usize) -> usize {
    let start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    if text[start..pos].chars().all(char::is_whitespace) {
        start
    } else {
        pos
    }
}

fn line_indent(text: &str, pos: usize) -> &str {
    let start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[start..pos];
    &line[..line.len() - line.trim_start().len()]
}

fn after_line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i + 1)
}

fn reinsert_sections(text: &str, sections: &[SectionAnchor]) -> Result<String, DevcError> {
    let index = SpanIndex::build(text).map_err(|reason| DevcError::SectionRestoreFailed {
        directive: sections[0].open.clone(),
        reason: format!("serialized document could not be indexed: {reason}"),
    })?;

    let mut edits = Vec::new();
    for section in sections {
        let failed = |reason: String| DevcError::SectionRestoreFailed {
            directive: section.open.clone(),
            reason,
        };

        let object = index.object(&section.parent).ok_or_else(|| {
            failed(format!("object {} no longer exists", DisplayPath(&section.parent)))
        })?;

        let mut positions = Vec::with_capacity(section.keys.len());
        for key in &section.keys {
            let position =
                object.members.iter().position(|m| &m.key == key).ok_or_else(|| {
                    failed(format!(
                        "member \"{key}\" of {} no longer exists",
                        DisplayPath(&section.parent)
                    ))
                })?;
            positions.push(position);
        }
        if positions.windows(2).any(|w| w[1] != w[0] + 1) {
            return Err(failed(format!(
                "members of {} are no longer adjacent",
                DisplayPath(&section.parent)
            )));
        }

        let members = &object.members;
        let first = positions[0];
        let last = positions[positions.len() - 1];
        let span = members[last].value_end - members[first].key_start;
        let trailing = last + 1 == members.len();

        if trailing && first > 0 {
            // Carry the separating comma so the document stays valid without the section
            edits.push(Edit {
                pos: members[first - 1].value_end,
                class: 1,
                order: usize::MAX - span,
                text: section.open.clone(),
            });
            if let Some(close) = &section.close {
                let indent = line_indent(text, members[last].key_start);
                edits.push(Edit {
                    pos: members[last].value_end,
                    class: 0,
                    order: span,
                    text: format!("\n{indent}{close}"),
                });
            }
        } else {
            edits.push(Edit {
                pos: line_start(text, members[first].key_start),
                class: 1,
                order: usize::MAX - span,
                text: format!("{}\n", section.open),
            });
            if let Some(close) = &section.close {
                let edit = if trailing {
                    Edit {
                        pos: members[last].value_end,
                        class: 0,
                        order: span,
                        text: format!("\n{close}"),
                    }
                } else {
                    Edit {
                        pos: after_line_end(text, members[last].value_end),
                        class: 0,
                        order: span,
                        text: format!("{close}\n"),
                    }
                };
                edits.push(edit);
            }
        }
    }

    edits.sort_by_key(|edit| (edit.pos, edit.class, edit.order));

    let mut output = String::with_capacity(text.len() + edits.iter().map(|e| e.text.len()).sum::<usize>());
    let mut copied = 0;
    for edit in edits {
        output.push_str(&text[copied..edit.pos]);
        output.push_str(&edit.text);
        copied = edit.pos;
    }
    output.push_str(&text[copied..]);
    Ok(output)
}
