pub mod body;

use std::fmt;
use std::ops::Range;

pub use body::Body;

use crate::token::Token;
use crate::variable::Scope;

/// Index of a block inside its `Ast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Root,
    Load,
    Fn,
    Run,
    Args,
}

impl BlockKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "load" => Some(BlockKind::Load),
            "fn" => Some(BlockKind::Fn),
            "run" => Some(BlockKind::Run),
            "args" => Some(BlockKind::Args),
            _ => None,
        }
    }
}

/// A node of the parse tree: one `load`, `fn`, `run` or `args` construct,
/// or the synthetic root holding everything else.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    /// The keyword token. Unset on the root.
    pub keyword: Option<Token>,
    /// Locator for `load`, node name for `fn` and `run`.
    pub target: Option<Token>,
    /// `=` in `fn` and `args = {`, `->` in `run name -> var`.
    pub operator: Option<Token>,
    /// Function name for `fn`, return variable for `run`.
    pub typevalue: Option<Token>,
    pub body: Body,
    /// Whether the declaration line opened a `{ ... }` body.
    pub braced: bool,
    pub(crate) children: Vec<BlockId>,
    pub(crate) parent: Option<BlockId>,
    pub(crate) scope: Scope,
    /// 1-based line of the declaration.
    pub line: usize,
    /// Byte span in source, from the keyword to the closing line.
    pub span: Range<usize>,
}

impl Block {
    pub(crate) fn root() -> Self {
        Block {
            kind: BlockKind::Root,
            keyword: None,
            target: None,
            operator: None,
            typevalue: None,
            body: Body::Plain(Vec::new()),
            braced: false,
            children: Vec::new(),
            parent: None,
            scope: Scope::default(),
            line: 0,
            span: 0..0,
        }
    }

    pub(crate) fn new(kind: BlockKind, keyword: Token, parent: BlockId, line: usize) -> Self {
        let span = keyword.span.clone();
        Block {
            kind,
            keyword: Some(keyword),
            target: None,
            operator: None,
            typevalue: None,
            body: Body::Empty,
            braced: false,
            children: Vec::new(),
            parent: Some(parent),
            scope: Scope::default(),
            line,
            span,
        }
    }

    pub fn is_load(&self) -> bool {
        self.kind == BlockKind::Load
    }

    pub fn is_fn(&self) -> bool {
        self.kind == BlockKind::Fn
    }

    pub fn is_run(&self) -> bool {
        self.kind == BlockKind::Run
    }

    pub fn is_args(&self) -> bool {
        self.kind == BlockKind::Args
    }

    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Text of the target token, empty when unset.
    pub fn target_str(&self) -> &str {
        self.target.as_ref().map(Token::as_str).unwrap_or("")
    }

    pub fn typevalue_str(&self) -> &str {
        self.typevalue.as_ref().map(Token::as_str).unwrap_or("")
    }

    /// The header tokens in declaration order.
    pub fn header_tokens(&self) -> impl Iterator<Item = &Token> {
        [&self.keyword, &self.target, &self.operator, &self.typevalue]
            .into_iter()
            .flatten()
    }

    pub(crate) fn header_tokens_mut(&mut self) -> impl Iterator<Item = &mut Token> {
        [
            &mut self.keyword,
            &mut self.target,
            &mut self.operator,
            &mut self.typevalue,
        ]
        .into_iter()
        .flatten()
    }

    /// Rebuild the declaration line from the header tokens, single-spaced.
    pub fn header(&self) -> String {
        let mut words: Vec<&str> = self.header_tokens().map(Token::as_str).collect();
        if self.braced {
            words.push("{");
        }
        words.join(" ")
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header())
    }
}
