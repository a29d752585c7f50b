use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use flowl::{Ast, Block, BlockId, Body, ResolveError};
use log::{debug, info};

use crate::driver::DriverRegistry;
use crate::error::{BuildError, DriverError, PlanError};
use crate::location::Location;
use crate::node::{FuncNode, NodeId};

/// The execution plan: stages in document order, each a node and its
/// parallel followers.
#[derive(Debug)]
pub struct RunQ {
    /// Loaded functions by base name.
    locations: BTreeMap<String, Location>,
    /// Nodes configured by `fn` blocks, by node name.
    configured: HashMap<String, NodeId>,
    nodes: Vec<FuncNode>,
    /// Head node of every stage.
    stages: Vec<NodeId>,
    ast: Ast,
}

impl RunQ {
    /// Build the plan in three pre-order passes over the tree:
    /// `load` blocks, then `fn` blocks, then `run` blocks.
    pub fn new(ast: Ast, drivers: &DriverRegistry) -> Result<Self, PlanError> {
        let source_id = ast.source_id;
        let mut builder = Builder {
            drivers,
            locations: BTreeMap::new(),
            configured: HashMap::new(),
            nodes: Vec::new(),
            stages: Vec::new(),
        };
        ast.for_each(|_, block| {
            builder
                .load(block)
                .map_err(|e| PlanError::new(e, target_span(block), source_id))
        })?;
        ast.for_each(|id, block| {
            builder.configure(id, block).map_err(|e| {
                let span = match &e {
                    BuildError::FunctionNotLoaded(_) | BuildError::DriverNotFound(_) => {
                        block.typevalue.as_ref().map(|t| t.span.clone())
                    }
                    _ => None,
                };
                PlanError::new(e, span.unwrap_or_else(|| target_span(block)), source_id)
            })
        })?;
        ast.for_each(|id, block| builder.schedule(id, block, source_id))?;

        let q = RunQ {
            locations: builder.locations,
            configured: builder.configured,
            nodes: builder.nodes,
            stages: builder.stages,
            ast,
        };
        info!(
            "Built plan: {} locations, {} stages, {} nodes",
            q.locations.len(),
            q.stages.len(),
            q.node_count()
        );
        Ok(q)
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn node(&self, id: NodeId) -> &FuncNode {
        &self.nodes[id.0]
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.get(name)
    }

    /// Loaded functions, ordered by base name.
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// The node configured under `name` by a `fn` block.
    pub fn configured(&self, name: &str) -> Option<NodeId> {
        self.configured.get(name).copied()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stages with their 1-based index.
    pub fn iter_stages(&self) -> impl Iterator<Item = (usize, Chain<'_>)> {
        self.stages
            .iter()
            .enumerate()
            .map(|(i, head)| (i + 1, self.chain(*head)))
    }

    /// Every scheduled node, stage by stage, with its stage index.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (usize, NodeId, &FuncNode)> {
        self.iter_stages()
            .flat_map(|(stage, chain)| chain.map(move |(id, node)| (stage, id, node)))
    }

    pub fn node_count(&self) -> usize {
        self.iter_nodes().count()
    }

    /// A node followed by its parallel siblings.
    pub fn chain(&self, head: NodeId) -> Chain<'_> {
        Chain {
            q: self,
            cursor: Some(head),
        }
    }

    pub fn args(&self, id: NodeId) -> Result<BTreeMap<String, String>, ResolveError> {
        self.nodes[id.0].args(&self.ast)
    }

    pub fn save_returns(
        &mut self,
        id: NodeId,
        returns: &BTreeMap<String, String>,
        filter: Option<&dyn Fn(&str) -> bool>,
    ) -> bool {
        self.nodes[id.0].save_returns(&mut self.ast, returns, filter)
    }

    pub fn load(&mut self, id: NodeId) -> Result<(), DriverError> {
        self.nodes[id.0].load()
    }

    pub fn merge_args(&mut self, id: NodeId) -> Result<(), DriverError> {
        self.nodes[id.0].merge_args(&self.ast)
    }

    pub fn invoke(&mut self, id: NodeId) -> Result<BTreeMap<String, String>, DriverError> {
        self.nodes[id.0].invoke()
    }
}

/// Iterator over one parallel chain.
pub struct Chain<'q> {
    q: &'q RunQ,
    cursor: Option<NodeId>,
}

impl<'q> Iterator for Chain<'q> {
    type Item = (NodeId, &'q FuncNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.q.node(id);
        self.cursor = node.next();
        Some((id, node))
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

struct Builder<'d> {
    drivers: &'d DriverRegistry,
    locations: BTreeMap<String, Location>,
    configured: HashMap<String, NodeId>,
    nodes: Vec<FuncNode>,
    stages: Vec<NodeId>,
}

impl Builder<'_> {
    fn load(&mut self, block: &Block) -> Result<(), BuildError> {
        if !block.is_load() {
            return Ok(());
        }
        let location = Location::parse(block.target_str())?;
        if self.locations.contains_key(&location.name) {
            return Err(BuildError::DuplicateLoad(location.name));
        }
        debug!("Loaded function '{}' from {}", location.name, location.locator());
        self.locations.insert(location.name.clone(), location);
        Ok(())
    }

    fn configure(&mut self, id: BlockId, block: &Block) -> Result<(), BuildError> {
        if !block.is_fn() {
            return Ok(());
        }
        let (name, function) = (block.target_str(), block.typevalue_str());
        if name == function {
            return Err(BuildError::SelfReference(name.to_string()));
        }
        let node = self.create_node(name, function)?;
        if self.configured.contains_key(name) {
            return Err(BuildError::DuplicateNode(name.to_string()));
        }
        self.nodes[node.0].set_fn_block(id);
        self.configured.insert(name.to_string(), node);
        debug!("Configured node '{}' as function '{}'", name, function);
        Ok(())
    }

    fn schedule(&mut self, id: BlockId, block: &Block, source_id: usize) -> Result<(), PlanError> {
        if !block.is_run() {
            return Ok(());
        }
        if let Some(target) = &block.target {
            let node = self
                .bind(target.as_str(), id)
                .map_err(|e| PlanError::new(e, target.span.clone(), source_id))?;
            self.stages.push(node);
            debug!("Stage {}: {}", self.stages.len(), self.nodes[node.0]);
            return Ok(());
        }

        let names = match &block.body {
            Body::List(names) => names.as_slice(),
            _ => &[],
        };
        let mut last: Option<NodeId> = None;
        for name in names {
            let node = self
                .bind(name.as_str(), id)
                .map_err(|e| PlanError::new(e, name.span.clone(), source_id))?;
            match last {
                None => self.stages.push(node),
                Some(prev) => self.nodes[prev.0].set_next(node),
            }
            last = Some(node);
        }
        if !names.is_empty() {
            debug!("Stage {}: {} parallel nodes", self.stages.len(), names.len());
        }
        Ok(())
    }

    /// The node a `run` of `name` invokes. A configured node is bound by its
    /// first run; later runs get a fresh node with the same configuration.
    fn bind(&mut self, name: &str, run: BlockId) -> Result<NodeId, BuildError> {
        let node = match self.configured.get(name).copied() {
            Some(node) if self.nodes[node.0].run_block().is_none() => node,
            Some(node) => {
                let function = self.nodes[node.0].function().to_string();
                let fn_block = self.nodes[node.0].fn_block();
                let fresh = self.create_node(name, &function)?;
                if let Some(fn_block) = fn_block {
                    self.nodes[fresh.0].set_fn_block(fn_block);
                }
                debug!("Node '{}' run again, created instance #{}", name, fresh.0);
                fresh
            }
            None => self.create_node(name, name)?,
        };
        self.nodes[node.0].set_run_block(run);
        Ok(node)
    }

    fn create_node(&mut self, name: &str, function: &str) -> Result<NodeId, BuildError> {
        let location = self
            .locations
            .get(function)
            .ok_or_else(|| BuildError::FunctionNotLoaded(function.to_string()))?;
        let locator = location.locator();
        let driver = self
            .drivers
            .create(&locator)
            .ok_or(BuildError::DriverNotFound(locator))?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(FuncNode::new(name, function, driver));
        Ok(id)
    }
}

fn target_span(block: &Block) -> Range<usize> {
    block
        .target
        .as_ref()
        .map(|t| t.span.clone())
        .unwrap_or_else(|| block.span.clone())
}
