use std::fmt;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `var name` or `var name = value`
    Var,
    /// `key = value` in `args`, `key: value` in `run`
    KeyValue,
}

/// The tokens of one logical line inside a block body.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub tokens: Vec<Token>,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Statement {
            kind,
            tokens: Vec::new(),
        }
    }

    pub fn append(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn is_var(&self) -> bool {
        self.kind == StatementKind::Var
    }

    /// First token: the variable name or the key.
    pub fn name(&self) -> Option<&Token> {
        self.tokens.first()
    }

    /// Second token: the assigned value, absent for a bare `var name`.
    pub fn value(&self) -> Option<&Token> {
        self.tokens.get(1)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_var() {
            write!(f, "var ")?;
        }
        match (self.name(), self.value()) {
            (Some(name), Some(value)) => write!(f, "{} = {}", name, value),
            (Some(name), None) => write!(f, "{}", name),
            _ => Ok(()),
        }
    }
}
