use std::fmt;

use log::debug;

use crate::block::{Block, BlockId};
use crate::token::Token;
use crate::token::segment::{Reference, Segment};
use crate::variable::{ResolveError, Var, VarId, VarValue};

/// The parsed flowl program: a tree of blocks under a synthetic root.
///
/// Blocks and variables live in arenas owned by the `Ast`; children are
/// owned through their parent's child list, parents are plain indices.
#[derive(Debug, Clone)]
pub struct Ast {
    blocks: Vec<Block>,
    vars: Vec<Var>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Ast {
    pub(crate) fn new(source_id: usize) -> Self {
        Ast {
            blocks: vec![Block::root()],
            vars: Vec::new(),
            source_id,
        }
    }

    pub fn root(&self) -> BlockId {
        BlockId(0)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.len() == 1
    }

    /// Append `block` as the last child of its parent.
    pub(crate) fn push(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.blocks.len());
        let parent = block.parent.unwrap_or(self.root());
        self.blocks.push(block);
        self.blocks[parent.0].children.push(id);
        id
    }

    /// Block ids in pre-order, depth first, children in document order.
    pub fn walk(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.block(id).children.iter().rev().copied());
        }
        order
    }

    /// Visit every block in pre-order, stopping at the first error.
    pub fn for_each<E>(&self, mut visit: impl FnMut(BlockId, &Block) -> Result<(), E>) -> Result<(), E> {
        for id in self.walk() {
            visit(id, self.block(id))?;
        }
        Ok(())
    }

    /// `block` followed by its ancestors up to the root.
    pub fn ancestry(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        std::iter::successors(Some(block), move |id| self.block(*id).parent)
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0]
    }

    /// Look a variable up from `block` outward through its ancestors.
    pub fn lookup_var(&self, block: BlockId, name: &str) -> Option<VarId> {
        self.ancestry(block)
            .find_map(|id| self.block(id).scope.get(name))
    }

    /// The block whose scope defines `name` as seen from `block`.
    pub fn defining_block(&self, block: BlockId, name: &str) -> Option<BlockId> {
        self.lookup_var(block, name).map(|id| self.var(id).block)
    }

    /// Define a variable in `block`'s own scope. Fails if the name is taken there.
    pub(crate) fn put_var(
        &mut self,
        block: BlockId,
        name: &str,
        value: VarValue,
    ) -> Result<VarId, VarId> {
        if let Some(existing) = self.block(block).scope.get(name) {
            return Err(existing);
        }
        let id = VarId(self.vars.len());
        self.vars.push(Var {
            name: name.to_string(),
            block,
            value,
        });
        self.block_mut(block).scope.insert(name.to_string(), id);
        Ok(id)
    }

    /// Look up `name` from `block` and compute its value.
    pub fn resolve_var(&self, block: BlockId, name: &str) -> Result<String, ResolveError> {
        let id = self
            .lookup_var(block, name)
            .ok_or_else(|| ResolveError::UndefinedVariable(name.to_string()))?;
        self.resolve(id)
    }

    /// Compute the value of a variable node.
    pub fn resolve(&self, id: VarId) -> Result<String, ResolveError> {
        let var = self.var(id);
        match &var.value {
            VarValue::Cached(value) => Ok(value.clone()),
            VarValue::Template { segments, deps } => {
                let mut out = String::new();
                for seg in segments {
                    match seg {
                        Segment::Literal(s) => out.push_str(s),
                        Segment::Var(Reference { name, field: None }) => {
                            let dep = deps
                                .iter()
                                .copied()
                                .find(|d| self.var(*d).name == *name)
                                .ok_or_else(|| ResolveError::UndefinedVariable(name.clone()))?;
                            out.push_str(&self.resolve(dep)?);
                        }
                        Segment::Var(Reference {
                            name,
                            field: Some(field),
                        }) => out.push_str(self.require_field(var.block, name, field)?),
                    }
                }
                Ok(out)
            }
        }
    }

    /// Substitute the references of `token` as seen from `block`.
    pub fn expand(&self, block: BlockId, token: &Token) -> Result<String, ResolveError> {
        if !token.has_var() {
            return Ok(token.as_str().to_string());
        }
        let mut out = String::new();
        for seg in token.segments() {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Var(Reference { name, field: None }) => {
                    out.push_str(&self.resolve_var(block, name)?)
                }
                Segment::Var(Reference {
                    name,
                    field: Some(field),
                }) => out.push_str(self.require_field(block, name, field)?),
            }
        }
        Ok(out)
    }

    /// Find a field variable from `block` outward.
    pub fn lookup_field(&self, block: BlockId, base: &str, field: &str) -> Option<&str> {
        self.ancestry(block)
            .find_map(|id| self.block(id).scope.field(base, field))
    }

    fn require_field(&self, block: BlockId, base: &str, field: &str) -> Result<&str, ResolveError> {
        self.lookup_field(block, base, field)
            .ok_or_else(|| ResolveError::UndefinedField {
                base: base.to_string(),
                field: field.to_string(),
            })
    }

    /// Store a field variable produced at invocation time in `block`'s scope.
    pub fn create_field_var(&mut self, block: BlockId, base: &str, field: &str, value: impl Into<String>) {
        let value = value.into();
        debug!("Field variable '{}.{}' = '{}' in block #{}", base, field, value, block.0);
        self.block_mut(block).scope.set_field(base, field, value);
    }

    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, id: BlockId, depth: usize) -> fmt::Result {
        let block = self.block(id);
        let pad = "  ".repeat(depth);
        for stm in block.body.statements() {
            writeln!(f, "{}{}", pad, stm)?;
        }
        for child in &block.children {
            let child_block = self.block(*child);
            writeln!(f, "{}{}", pad, child_block.header())?;
            let inner = "  ".repeat(depth + 1);
            let sep = if child_block.is_run() { ":" } else { " =" };
            for (key, value) in child_block.body.pairs() {
                writeln!(f, "{}{}{} {}", inner, key, sep, value)?;
            }
            for name in child_block.body.names() {
                writeln!(f, "{}{}", inner, name)?;
            }
            self.fmt_block(f, *child, depth + 1)?;
            if child_block.braced {
                writeln!(f, "{}}}", pad)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_block(f, self.root(), 0)
    }
}
