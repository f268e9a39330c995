//! Fluent graph construction. `.build()` runs the static type validator
//! before handing back a usable [`Graph`]; a duplicate node name, an edge to
//! an unknown node, a missing start node, or a type mismatch all surface as
//! [`PocketError::Configuration`] / [`PocketError::TypeMismatch`] here
//! rather than at run time.

use crate::action::Action;
use crate::error::{PocketError, PocketResult};
use crate::graph::Graph;
use crate::node::{Node, NodeBackend};
use crate::validator;
use std::collections::HashMap;

pub struct GraphBuilder {
    name: String,
    nodes: HashMap<String, Node>,
    /// Edges wired before their source node was necessarily added yet;
    /// merged into each node's own successor map at `build()` time so
    /// `.connect()` and `.add_node()` can be called in either order.
    pending_edges: HashMap<String, HashMap<Action, String>>,
    start: Option<String>,
    /// First duplicate node name seen by `add_existing_node`, surfaced as
    /// `PocketError::Configuration` at `build()` time. Kept as a single
    /// builder-time error slot rather than returning `Result` from
    /// `add_existing_node`, so `.add_node()`/`.connect()` chaining stays
    /// fluent.
    duplicate_node: Option<String>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        GraphBuilder {
            name: name.into(),
            nodes: HashMap::new(),
            pending_edges: HashMap::new(),
            start: None,
            duplicate_node: None,
        }
    }

    /// Adds a node built from a backend value. Duplicate names are
    /// rejected at `build()` time.
    pub fn add_node(self, name: impl Into<String>, backend: impl NodeBackend + 'static) -> Self {
        let name = name.into();
        self.add_existing_node(Node::new(name, backend))
    }

    /// Adds an already-constructed [`Node`] (e.g. one carrying retry,
    /// timeout, hooks, or declared types already set). Registering the same
    /// name twice is recorded as a `DuplicateNode` configuration error,
    /// surfaced at `build()`.
    pub fn add_existing_node(mut self, node: Node) -> Self {
        let name = node.name().to_string();
        if self.nodes.contains_key(&name) && self.duplicate_node.is_none() {
            self.duplicate_node = Some(name.clone());
        }
        self.nodes.insert(name, node);
        self
    }

    /// Wires `action` from `from` to `to`. A node may have at most one
    /// successor per action; wiring the same `(from, action)` pair twice
    /// overwrites the earlier target.
    pub fn connect(
        mut self,
        from: impl Into<String>,
        action: impl Into<Action>,
        to: impl Into<String>,
    ) -> Self {
        self.pending_edges
            .entry(from.into())
            .or_default()
            .insert(action.into(), to.into());
        self
    }

    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Validates and assembles the graph: every wired node name must exist,
    /// a start node must be configured and present, and every edge must
    /// pass the static type validator.
    pub fn build(mut self) -> PocketResult<Graph> {
        if let Some(name) = self.duplicate_node {
            return Err(PocketError::Configuration(format!(
                "duplicate node name '{name}'"
            )));
        }

        let start = self.start.ok_or_else(|| {
            PocketError::Configuration("graph has no start node configured".to_string())
        })?;

        if !self.nodes.contains_key(&start) {
            return Err(PocketError::Configuration(format!(
                "start node '{start}' was never added"
            )));
        }

        for (from, edges) in &self.pending_edges {
            if !self.nodes.contains_key(from) {
                return Err(PocketError::Configuration(format!(
                    "edge source node '{from}' was never added"
                )));
            }
            for target in edges.values() {
                if !self.nodes.contains_key(target) {
                    return Err(PocketError::Configuration(format!(
                        "edge target node '{target}' was never added"
                    )));
                }
            }
        }

        for (from, edges) in self.pending_edges {
            let node = self.nodes.remove(&from).expect("checked above");
            let node = edges
                .into_iter()
                .fold(node, |node, (action, to)| node.connect(action, to));
            self.nodes.insert(from, node);
        }

        validator::validate(&self.nodes, &start)?;

        Ok(Graph::new(self.name, self.nodes, start))
    }
}
