use std::fmt;

use crate::lexical::{is_ident, is_identifier};

/// A variable reference inside a token: `$name`, `$(name)` or `$(name.field)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    /// Field of a runtime field variable, only reachable through `$(name.field)`.
    pub field: Option<String>,
}

impl Reference {
    pub fn plain(name: impl Into<String>) -> Self {
        Reference {
            name: name.into(),
            field: None,
        }
    }

    pub fn field(name: impl Into<String>, field: impl Into<String>) -> Self {
        Reference {
            name: name.into(),
            field: Some(field.into()),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "$({}.{})", self.name, field),
            None => write!(f, "$({})", self.name),
        }
    }
}

/// One piece of a token's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Var(Reference),
}

impl Segment {
    pub fn is_var(&self) -> bool {
        matches!(self, Segment::Var(_))
    }
}

/// A malformed reference, located by byte offset within the token text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentError {
    pub offset: usize,
    pub message: String,
}

/// Split `text` into literal and reference segments.
pub fn split(text: &str) -> Result<Vec<Segment>, SegmentError> {
    if !text.contains('$') {
        return Ok(vec![Segment::Literal(text.to_string())]);
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(pos) = rest.find('$') {
        literal.push_str(&rest[..pos]);
        let marker = offset + pos;
        let after = &rest[pos + 1..];

        let (reference, consumed) = if let Some(inner) = after.strip_prefix('(') {
            let close = inner.find(')').ok_or_else(|| SegmentError {
                offset: marker,
                message: "unterminated variable reference, missing ')'".to_string(),
            })?;
            (parse_enclosed(&inner[..close], marker)?, close + 2)
        } else {
            let len = after.find(|c: char| !is_ident(c)).unwrap_or(after.len());
            let name = &after[..len];
            if !is_identifier(name) {
                return Err(SegmentError {
                    offset: marker,
                    message: format!("invalid variable reference '${}'", name),
                });
            }
            (Reference::plain(name), len)
        };

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Var(reference));

        let advance = pos + 1 + consumed;
        rest = &rest[advance..];
        offset += advance;
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_enclosed(inner: &str, marker: usize) -> Result<Reference, SegmentError> {
    let invalid = || SegmentError {
        offset: marker,
        message: format!("invalid variable reference '$({})'", inner),
    };
    match inner.split_once('.') {
        Some((name, field)) => {
            if is_identifier(name) && is_identifier(field) {
                Ok(Reference::field(name, field))
            } else {
                Err(invalid())
            }
        }
        None if is_identifier(inner) => Ok(Reference::plain(inner)),
        None => Err(invalid()),
    }
}
