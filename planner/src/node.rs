use std::collections::BTreeMap;
use std::fmt;

use flowl::{Ast, BlockId, Body, ResolveError};
use log::debug;

use crate::driver::Driver;
use crate::error::DriverError;

/// Index of a node inside its `RunQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named, driver-bound unit of the plan.
#[derive(Debug)]
pub struct FuncNode {
    name: String,
    /// Base name of the loaded function.
    function: String,
    driver: Box<dyn Driver>,
    /// The `fn` block configuring this node, if any.
    fn_block: Option<BlockId>,
    /// The `run` block invoking this node.
    run_block: Option<BlockId>,
    /// Next node of the same parallel stage.
    next: Option<NodeId>,
}

impl FuncNode {
    pub(crate) fn new(name: &str, function: &str, driver: Box<dyn Driver>) -> Self {
        FuncNode {
            name: name.to_string(),
            function: function.to_string(),
            driver,
            fn_block: None,
            run_block: None,
            next: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn fn_block(&self) -> Option<BlockId> {
        self.fn_block
    }

    pub fn run_block(&self) -> Option<BlockId> {
        self.run_block
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub(crate) fn set_fn_block(&mut self, block: BlockId) {
        self.fn_block = Some(block);
    }

    pub(crate) fn set_run_block(&mut self, block: BlockId) {
        self.run_block = Some(block);
    }

    pub(crate) fn set_next(&mut self, next: NodeId) {
        self.next = Some(next);
    }

    /// Arguments for the next invocation, with variables substituted.
    ///
    /// A `run name { key: value }` body replaces the configuration entirely;
    /// otherwise the `args` block of the configuring `fn` is used.
    pub fn args(&self, ast: &Ast) -> Result<BTreeMap<String, String>, ResolveError> {
        let inline = self
            .run_block
            .filter(|run| matches!(ast.block(*run).body, Body::Map(_)));
        if let Some(run) = inline {
            return expand_pairs(ast, run);
        }
        let args_block = self.fn_block.and_then(|fn_block| {
            ast.block(fn_block)
                .children()
                .iter()
                .copied()
                .find(|child| ast.block(*child).is_args())
        });
        match args_block {
            Some(block) => expand_pairs(ast, block),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Expose the fields of `returns` as `$(var.field)` for later blocks, where
    /// `var` is the run block's `-> var`. Returns false when there is no such
    /// variable.
    pub fn save_returns(
        &self,
        ast: &mut Ast,
        returns: &BTreeMap<String, String>,
        filter: Option<&dyn Fn(&str) -> bool>,
    ) -> bool {
        let Some(run) = self.run_block else {
            return false;
        };
        let name = ast.block(run).typevalue_str().to_string();
        if name.is_empty() {
            return false;
        }
        let scope = ast
            .defining_block(run, &name)
            .or_else(|| ast.block(run).parent())
            .unwrap_or_else(|| ast.root());
        for (field, value) in returns {
            if filter.is_some_and(|accept| !accept(field.as_str())) {
                continue;
            }
            ast.create_field_var(scope, &name, field, value.as_str());
        }
        debug!("Saved {} returns of '{}' as '{}'", returns.len(), self.name, name);
        true
    }

    pub fn load(&mut self) -> Result<(), DriverError> {
        self.driver.load()
    }

    /// Resolve the arguments and hand them to the driver.
    pub fn merge_args(&mut self, ast: &Ast) -> Result<(), DriverError> {
        let args = self.args(ast)?;
        self.driver.merge_args(&args)
    }

    pub fn invoke(&mut self) -> Result<BTreeMap<String, String>, DriverError> {
        self.driver.invoke()
    }
}

impl fmt::Display for FuncNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.name, self.driver.function_name())
    }
}

fn expand_pairs(ast: &Ast, block: BlockId) -> Result<BTreeMap<String, String>, ResolveError> {
    ast.block(block)
        .body
        .pairs()
        .map(|(key, value)| Ok((key.to_string(), ast.expand(block, value)?)))
        .collect()
}
