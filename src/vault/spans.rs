//! Byte-span index over JSON text.
//!
//! Records, for every object in a JSON document, where each member starts (the
//! opening quote of its key) and where its value ends. The vault uses the index to
//! anchor conditional sections to object members before a merge and to find those
//! members again in the re-serialized output.

use std::fmt;

/// One step of a path from the document root to a nested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object member key
    Key(String),
    /// Array element index
    Index(usize),
}

/// Renders a path as `features."ghcr.io/x:1"` style text for error messages.
pub(crate) struct DisplayPath<'a>(pub &'a [PathSegment]);

impl fmt::Display for DisplayPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    if key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        write!(f, "{key}")?;
                    } else {
                        write!(f, "{key:?}")?;
                    }
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MemberSpan {
    pub key: String,
    /// Offset of the opening quote of the key
    pub key_start: usize,
    /// Offset one past the last byte of the value
    pub value_end: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectSpan {
    pub path: Vec<PathSegment>,
    pub members: Vec<MemberSpan>,
}

#[derive(Debug, Default)]
pub(crate) struct SpanIndex {
    objects: Vec<ObjectSpan>,
}

impl SpanIndex {
    /// Index every object of a JSON document.
    ///
    /// The text is expected to be valid JSON; malformed input yields an error string
    /// describing the offset where scanning stopped.
    pub fn build(text: &str) -> Result<Self, String> {
        let mut scanner = Scanner {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            objects: Vec::new(),
        };
        let mut path = Vec::new();
        scanner.skip_ws();
        scanner.value(&mut path)?;
        Ok(Self {
            objects: scanner.objects,
        })
    }

    pub fn object(&self, path: &[PathSegment]) -> Option<&ObjectSpan> {
        self.objects.iter().find(|object| object.path == path)
    }

    pub fn objects(&self) -> &[ObjectSpan] {
        &self.objects
    }
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    objects: Vec<ObjectSpan>,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected '{}' at offset {}", byte as char, self.pos))
        }
    }

    fn value(&mut self, path: &mut Vec<PathSegment>) -> Result<(), String> {
        match self.peek() {
            Some(b'{') => self.object(path),
            Some(b'[') => self.array(path),
            Some(b'"') => self.string().map(|_| ()),
            Some(_) => {
                let start = self.pos;
                while let Some(byte) = self.peek() {
                    if matches!(byte, b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n') {
                        break;
                    }
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(format!("unexpected character at offset {start}"));
                }
                Ok(())
            }
            None => Err("unexpected end of document".to_string()),
        }
    }

    /// Skips a string literal, returning its span including the quotes.
    fn string(&mut self) -> Result<(usize, usize), String> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.peek() {
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    return Ok((start, self.pos));
                }
                Some(_) => self.pos += 1,
                None => return Err(format!("unterminated string starting at offset {start}")),
            }
        }
    }

    fn object(&mut self, path: &mut Vec<PathSegment>) -> Result<(), String> {
        self.expect(b'{')?;
        let mut members = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            self.objects.push(ObjectSpan {
                path: path.clone(),
                members,
            });
            return Ok(());
        }

        loop {
            self.skip_ws();
            let (key_start, key_end) = self.string()?;
            let key: String = serde_json::from_str(&self.text[key_start..key_end])
                .map_err(|e| format!("invalid key at offset {key_start}: {e}"))?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();

            path.push(PathSegment::Key(key.clone()));
            self.value(path)?;
            path.pop();

            members.push(MemberSpan {
                key,
                key_start,
                value_end: self.pos,
            });

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(format!("expected ',' or '}}' at offset {}", self.pos)),
            }
        }

        self.objects.push(ObjectSpan {
            path: path.clone(),
            members,
        });
        Ok(())
    }

    fn array(&mut self, path: &mut Vec<PathSegment>) -> Result<(), String> {
        self.expect(b'[')?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(());
        }

        let mut index = 0;
        loop {
            self.skip_ws();
            path.push(PathSegment::Index(index));
            self.value(path)?;
            path.pop();
            index += 1;

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(format!("expected ',' or ']' at offset {}", self.pos)),
            }
        }
    }
}
