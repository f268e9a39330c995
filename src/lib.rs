//! # Pocket
//!
//! An embeddable graph execution engine for decision workflows.
//!
//! Pocket models a workflow as a **Graph + Store**:
//! - **Node**: a Prep / Exec / Post(/ Fallback) lifecycle around one unit
//!   of work. Prep reads the store, Exec computes without touching it, Post
//!   writes results and returns the `Action` verb that selects the next
//!   node.
//! - **Graph**: named nodes wired by action-keyed successor edges, walked
//!   from a start node until some Post returns an action with no mapped
//!   successor.
//! - **Store**: a read/write-partitioned, namespace-scoped key-value
//!   surface shared by every node in a run, backed by a pluggable
//!   [`StorageBackend`] (plain, bounded/evicting, sharded, or tiered).
//!
//! ## Quick start
//!
//! ```no_run
//! use pocket::prelude::*;
//! use pocket::error::BoxError;
//! use serde_json::{json, Value};
//!
//! struct Greeter;
//!
//! #[async_trait::async_trait]
//! impl NodeBackend for Greeter {
//!     async fn prep(&self, store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
//!         Ok(store.get("name")?.unwrap_or(json!("world")))
//!     }
//!
//!     async fn exec(&self, prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
//!         Ok(json!(format!("hello, {}", prep_result.as_str().unwrap_or("world"))))
//!     }
//!
//!     async fn post(
//!         &self,
//!         store: &dyn StoreWriter,
//!         _prep_result: Value,
//!         exec_result: Value,
//!         _ctx: &RunContext,
//!     ) -> Result<Action, BoxError> {
//!         store.set("greeting", exec_result)?;
//!         Ok(Action::default())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = GraphBuilder::new("greet")
//!     .add_node("greeter", Greeter)
//!     .start("greeter")
//!     .build()?;
//!
//! let store = Store::default();
//! store.set("name", json!("ada"))?;
//! graph.run(&store, &RunContext::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod builder;
pub mod concurrency;
pub mod context;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod node;
pub mod retry;
pub mod store;
pub mod types;
mod validator;

pub use action::Action;
pub use builder::GraphBuilder;
pub use context::RunContext;
pub use error::{PocketError, PocketResult};
pub use graph::{Graph, RunOutcome};
pub use hooks::Hooks;
pub use node::{Node, NodeBackend};
pub use retry::RetryPolicy;
pub use store::{BoundedStore, EvictionPolicy, MemoryBackend, ShardedStore, Store, StoreReader, StoreWriter, StorageBackend, TieredStore};
pub use types::{Named, TypeDescriptor};

/// Re-exports the common building blocks for implementing and wiring
/// nodes.
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::builder::GraphBuilder;
    pub use crate::context::RunContext;
    pub use crate::error::{PocketError, PocketResult};
    pub use crate::graph::{Graph, RunOutcome};
    pub use crate::hooks::Hooks;
    pub use crate::node::{Node, NodeBackend};
    pub use crate::retry::RetryPolicy;
    pub use crate::store::{Store, StoreReader, StoreWriter};
    pub use crate::types::TypeDescriptor;
    pub use serde_json::Value as JsonValue;
}
