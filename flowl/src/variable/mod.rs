pub mod error;

use std::collections::HashMap;

pub use error::ResolveError;

use crate::block::BlockId;
use crate::token::segment::Segment;

/// Index of a variable node inside its `Ast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) usize);

/// A variable defined by a `var` statement.
#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    /// The block whose scope defines this variable.
    pub block: BlockId,
    pub value: VarValue,
}

#[derive(Debug, Clone)]
pub enum VarValue {
    /// Final value, never recomputed.
    Cached(String),
    /// Substituted on every resolution. `deps` holds the variables the plain
    /// references resolved to when the variable was defined; references that
    /// did not resolve then are missing and fail on resolution.
    Template {
        segments: Vec<Segment>,
        deps: Vec<VarId>,
    },
}

impl VarValue {
    pub fn is_cached(&self) -> bool {
        matches!(self, VarValue::Cached(_))
    }

    pub fn deps(&self) -> &[VarId] {
        match self {
            VarValue::Cached(_) => &[],
            VarValue::Template { deps, .. } => deps,
        }
    }
}

/// Variables of one block.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, VarId>,
    /// Field variables created from function returns, keyed by (base, field).
    fields: HashMap<(String, String), String>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.vars.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub(crate) fn insert(&mut self, name: String, id: VarId) {
        self.vars.insert(name, id);
    }

    pub fn field(&self, base: &str, field: &str) -> Option<&str> {
        self.fields
            .get(&(base.to_string(), field.to_string()))
            .map(String::as_str)
    }

    pub(crate) fn set_field(&mut self, base: &str, field: &str, value: String) {
        self.fields
            .insert((base.to_string(), field.to_string()), value);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
