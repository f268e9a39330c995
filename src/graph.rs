//! The graph runner: a named collection of [`Node`]s wired by action-keyed
//! successor edges, walked starting at a designated start node. The runner
//! keeps no structural visited-set — legitimate workflows loop (retry menus,
//! polling), and the only mandatory termination condition is Post returning
//! an action with no mapped successor. [`RunContext::with_max_steps`] is the
//! only guard this runner applies, and only when the caller asks for one.

use crate::action::Action;
use crate::context::RunContext;
use crate::error::{BoxError, PocketError, PocketResult};
use crate::node::{Node, NodeBackend};
use crate::store::{Store, StoreReader, StoreWriter};
use crate::types::TypeDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The result of walking a [`Graph`] to completion.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_action: Action,
    pub last_node: String,
    pub steps_executed: usize,
    pub path: Vec<String>,
}

/// A graph: named nodes (each owning its own successor map) walked
/// starting from `start`.
pub struct Graph {
    name: String,
    nodes: HashMap<String, Node>,
    start: String,
}

impl Graph {
    pub(crate) fn new(name: String, nodes: HashMap<String, Node>, start: String) -> Self {
        Graph { name, nodes, start }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    fn next_node_for(&self, current: &str, action: &Action) -> Option<&str> {
        self.nodes
            .get(current)
            .and_then(|node| node.successors().get(action))
            .map(String::as_str)
    }

    /// Walks the graph starting at its configured start node until some
    /// node's Post returns an action with no mapped successor, or an error
    /// propagates out of a node visit.
    #[tracing::instrument(skip(self, store, ctx), fields(graph = %self.name))]
    pub async fn run(&self, store: &Store, ctx: &RunContext) -> PocketResult<RunOutcome> {
        self.run_from(&self.start, store, ctx).await
    }

    /// Same as [`Graph::run`] but starting from an arbitrary node name.
    pub async fn run_from(
        &self,
        start: &str,
        store: &Store,
        ctx: &RunContext,
    ) -> PocketResult<RunOutcome> {
        let mut current = start.to_string();
        let mut path = Vec::new();
        let mut steps_executed = 0usize;

        loop {
            if ctx.record_step().is_err() {
                return Err(PocketError::Configuration(format!(
                    "graph '{}' exceeded its configured step limit",
                    self.name
                )));
            }
            if ctx.is_cancelled() {
                return Err(PocketError::Cancelled { node: current });
            }

            let node = self.nodes.get(&current).ok_or_else(|| {
                PocketError::Configuration(format!("node '{current}' not found in graph"))
            })?;

            path.push(current.clone());
            let action = node.visit(store, ctx).await?;
            steps_executed += 1;

            match self.next_node_for(&current, &action) {
                Some(next) => current = next.to_string(),
                None => {
                    return Ok(RunOutcome {
                        final_action: action,
                        last_node: current,
                        steps_executed,
                        path,
                    });
                }
            }
        }
    }

    /// Wraps this graph as a node backend, usable as one node inside a
    /// larger [`Graph`]. Delegation, not inheritance: the wrapper owns an
    /// `Arc<Graph>` and drives
    /// `Graph::run` from inside `exec`, since the outer Node lifecycle's
    /// Exec step is the one phase not bound to the outer store — letting
    /// the nested run use its own isolated store without ever touching the
    /// caller's. The wrapping node's own Post always resolves to
    /// `Action::default()`; use [`Graph::into_node_deriving_action`] to
    /// route the host on the inner graph's own terminal action instead.
    pub fn into_node(self, node_name: impl Into<String>) -> Node {
        let input_type = self.start_input_type();
        Node::new(node_name, GraphBackend::new(Arc::new(self), false, false))
            .with_input_type(input_type)
    }

    /// Same as [`Graph::into_node`], but the nested run shares the outer
    /// store instead of getting an isolated one.
    pub fn into_node_sharing_store(self, node_name: impl Into<String>) -> Node {
        let input_type = self.start_input_type();
        Node::new(node_name, GraphBackend::new(Arc::new(self), true, false))
            .with_input_type(input_type)
    }

    /// Same as [`Graph::into_node`], but the wrapping node's Post derives
    /// its action from the inner graph's own final action instead of
    /// always returning `"default"`. Opt-in: the baseline returns
    /// `"default"` unless a wrapping node explicitly overrides action
    /// resolution.
    pub fn into_node_deriving_action(self, node_name: impl Into<String>) -> Node {
        let input_type = self.start_input_type();
        Node::new(node_name, GraphBackend::new(Arc::new(self), false, true))
            .with_input_type(input_type)
    }

    /// Combines [`Graph::into_node_sharing_store`] and
    /// [`Graph::into_node_deriving_action`].
    pub fn into_node_sharing_store_deriving_action(self, node_name: impl Into<String>) -> Node {
        let input_type = self.start_input_type();
        Node::new(node_name, GraphBackend::new(Arc::new(self), true, true))
            .with_input_type(input_type)
    }

    /// The wrapping node's declared input type: the start node's own input
    /// type. The wrapping node's output type is left
    /// dynamic rather than guessed, since which node is terminal depends on
    /// the runtime action path, not just the graph's static shape.
    fn start_input_type(&self) -> TypeDescriptor {
        self.nodes
            .get(&self.start)
            .map(|n| n.input_type().clone())
            .unwrap_or(TypeDescriptor::Dynamic)
    }
}

struct GraphBackend {
    graph: Arc<Graph>,
    share_store: bool,
    derive_action: bool,
    captured_store: std::sync::Mutex<Option<Store>>,
}

impl GraphBackend {
    fn new(graph: Arc<Graph>, share_store: bool, derive_action: bool) -> Self {
        GraphBackend {
            graph,
            share_store,
            derive_action,
            captured_store: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl NodeBackend for GraphBackend {
    async fn prep(&self, store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
        if self.share_store {
            let outer = store
                .as_store()
                .expect("outer store must be a concrete Store to support sharing");
            *self.captured_store.lock().unwrap() = Some(outer);
        }
        Ok(Value::Null)
    }

    async fn exec(&self, _prep_result: Value, ctx: &RunContext) -> Result<Value, BoxError> {
        let store = if self.share_store {
            self.captured_store
                .lock()
                .unwrap()
                .clone()
                .expect("prep always runs before exec")
        } else {
            Store::default()
        };

        let outcome = self.graph.run(&store, ctx).await?;
        Ok(serde_json::json!({
            "final_action": outcome.final_action.name(),
            "last_node": outcome.last_node,
            "steps_executed": outcome.steps_executed,
        }))
    }

    async fn post(
        &self,
        _store: &dyn StoreWriter,
        _prep_result: Value,
        exec_result: Value,
        _ctx: &RunContext,
    ) -> Result<Action, BoxError> {
        if !self.derive_action {
            return Ok(Action::default());
        }
        let action_name = exec_result
            .get("final_action")
            .and_then(Value::as_str)
            .unwrap_or("default");
        Ok(Action::new(action_name))
    }
}
