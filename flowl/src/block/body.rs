use std::collections::BTreeMap;

use crate::statement::{Statement, StatementKind};
use crate::token::Token;

/// The content between a block's braces.
#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    /// Ordered statements. Only the root holds one, for its `var` lines.
    Plain(Vec<Statement>),
    /// `key = value` lines of `args`, `key: value` lines of `run name {`.
    Map(BTreeMap<String, Statement>),
    /// Bare names of `run { ... }`.
    List(Vec<Token>),
}

impl Body {
    pub fn map() -> Self {
        Body::Map(BTreeMap::new())
    }

    pub fn list() -> Self {
        Body::List(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Plain(stms) => stms.is_empty(),
            Body::Map(map) => map.is_empty(),
            Body::List(names) => names.is_empty(),
        }
    }

    pub fn statements(&self) -> &[Statement] {
        match self {
            Body::Plain(stms) => stms,
            _ => &[],
        }
    }

    /// Key to value-token view of a map body.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &Token)> {
        let map = match self {
            Body::Map(map) => Some(map),
            _ => None,
        };
        map.into_iter().flat_map(|m| {
            m.iter()
                .filter_map(|(k, stm)| stm.value().map(|v| (k.as_str(), v)))
        })
    }

    /// Names of a list body in order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Body::List(names) => names.iter().map(Token::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Insert a key/value statement. Returns false if the key already exists.
    pub(crate) fn insert_pair(&mut self, key: Token, value: Token) -> bool {
        let Body::Map(map) = self else {
            return false;
        };
        if map.contains_key(key.as_str()) {
            return false;
        }
        let mut stm = Statement::new(StatementKind::KeyValue);
        let name = key.as_str().to_string();
        stm.append(key);
        stm.append(value);
        map.insert(name, stm);
        true
    }

    /// Every token of the body, in no particular cross-statement order.
    pub(crate) fn tokens_mut(&mut self) -> Vec<&mut Token> {
        match self {
            Body::Empty => Vec::new(),
            Body::Plain(stms) => stms.iter_mut().flat_map(|s| s.tokens.iter_mut()).collect(),
            Body::Map(map) => map.values_mut().flat_map(|s| s.tokens.iter_mut()).collect(),
            Body::List(names) => names.iter_mut().collect(),
        }
    }
}
