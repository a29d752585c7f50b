pub mod segment;

use std::fmt;
use std::ops::Range;

use crate::block::BlockId;
use crate::lexical::{is_identifier, is_word_str};
use crate::token::segment::{Segment, SegmentError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Word,
    Operator,
    FunctionName,
    VarName,
    Text,
    LoadTarget,
}

/// A classified span of source text.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    text: String,
    /// 1-based source line.
    pub line: usize,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
    /// The block this token belongs to, set once the tree is complete.
    block: Option<BlockId>,
    /// Computed by `extract_vars`, cached afterwards.
    segments: Option<Vec<Segment>>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, span: Range<usize>) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
            span,
            block: None,
            segments: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Keyword
    }

    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    pub(crate) fn set_block(&mut self, block: BlockId) {
        self.block = Some(block);
    }

    /// Split the text into segments. Later calls reuse the first result.
    pub fn extract_vars(&mut self) -> Result<&[Segment], SegmentError> {
        if self.segments.is_none() {
            self.segments = Some(segment::split(&self.text)?);
        }
        Ok(self.segments.as_deref().unwrap_or(&[]))
    }

    /// Segments of the token; empty until `extract_vars` has run.
    pub fn segments(&self) -> &[Segment] {
        self.segments.as_deref().unwrap_or(&[])
    }

    pub fn has_var(&self) -> bool {
        self.segments().iter().any(Segment::is_var)
    }

    /// Check the text against what its kind allows.
    pub fn validate(&self) -> Result<(), String> {
        let ok = match self.kind {
            TokenKind::VarName => is_identifier(&self.text),
            TokenKind::Word | TokenKind::FunctionName | TokenKind::LoadTarget => {
                is_word_str(&self.text)
            }
            TokenKind::Keyword | TokenKind::Operator => !self.text.is_empty(),
            TokenKind::Text => true,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("invalid {}: '{}'", self.kind, self.text))
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Word => "word",
            TokenKind::Operator => "operator",
            TokenKind::FunctionName => "function name",
            TokenKind::VarName => "variable name",
            TokenKind::Text => "text",
            TokenKind::LoadTarget => "load target",
        };
        f.write_str(name)
    }
}
