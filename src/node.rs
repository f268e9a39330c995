//! A node's Prep/Exec/Post/Fallback lifecycle.
//!
//! A backend carrying associated `PrepResult`/`ExecResult`/`Error` types
//! would make `Node<B>` generic per backend — fine when a flow only ever
//! runs one node type, but a graph here holds many differently-typed nodes
//! in one successor map. So [`NodeBackend`] below drops associated types in
//! favor of `serde_json::Value` at prep/exec/post boundaries, which is what
//! makes `Node` a concrete, non-generic struct that can be boxed and stored
//! uniformly inside [`crate::graph::Graph`].

use crate::context::{run_with_deadline, RunContext};
use crate::error::{BoxError, PocketError, PocketResult};
use crate::hooks::Hooks;
use crate::retry::RetryPolicy;
use crate::store::{Store, StoreReader, StoreWriter};
use crate::types::TypeDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Implemented by user code to define one node's behavior. Prep only ever
/// sees a [`StoreReader`]; Post sees a [`StoreWriter`]. Fallback receives
/// the prep result, not the original input it derived from, since by the
/// time fallback runs, prep's output is all that's left to reason from.
#[async_trait]
pub trait NodeBackend: Send + Sync {
    async fn prep(&self, store: &dyn StoreReader, ctx: &RunContext) -> Result<Value, BoxError>;

    async fn exec(&self, prep_result: Value, ctx: &RunContext) -> Result<Value, BoxError>;

    async fn post(
        &self,
        store: &dyn StoreWriter,
        prep_result: Value,
        exec_result: Value,
        ctx: &RunContext,
    ) -> Result<crate::action::Action, BoxError>;

    /// Runs when Exec has exhausted its retries. The default re-raises the
    /// error unchanged.
    async fn exec_fallback(
        &self,
        _prep_result: Value,
        error: BoxError,
        _ctx: &RunContext,
    ) -> Result<Value, BoxError> {
        Err(error)
    }

    /// Whether this backend overrides [`exec_fallback`](Self::exec_fallback).
    /// A backend that does must also override this to `true`; it tells the
    /// runner whether a failure out of `exec_fallback` is a real
    /// `FallbackError` (fallback ran and itself failed) or just the plain
    /// `ExecError` of a node with no fallback configured at all.
    fn has_fallback(&self) -> bool {
        false
    }
}

/// Suppresses or propagates a lifecycle error. `Cancelled` never reaches
/// this: it always propagates regardless of what a handler would decide.
pub type ErrorHandler = Arc<dyn Fn(PocketError) -> Option<PocketError> + Send + Sync>;

/// A node: a name, a backend, the cross-cutting policies that wrap every
/// visit (retry, timeout, hooks, error handling, declared types), and its
/// own successor map — `connect` installs a successor directly on the
/// node, and `successors` snapshots that map.
pub struct Node {
    name: String,
    backend: Box<dyn NodeBackend>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    hooks: Hooks,
    error_handler: Option<ErrorHandler>,
    input_type: TypeDescriptor,
    output_type: TypeDescriptor,
    successors: std::collections::HashMap<crate::action::Action, String>,
}

impl Node {
    pub fn new(name: impl Into<String>, backend: impl NodeBackend + 'static) -> Self {
        Node {
            name: name.into(),
            backend: Box::new(backend),
            retry: RetryPolicy::none(),
            timeout: None,
            hooks: Hooks::new(),
            error_handler: None,
            input_type: TypeDescriptor::Dynamic,
            output_type: TypeDescriptor::Dynamic,
            successors: std::collections::HashMap::new(),
        }
    }

    /// Installs `next` as the target for `action`, overwriting any prior
    /// target for the same action. Returns `self` for fluent chaining.
    pub fn connect(mut self, action: impl Into<crate::action::Action>, next: impl Into<String>) -> Self {
        self.successors.insert(action.into(), next.into());
        self
    }

    pub fn successors(&self) -> &std::collections::HashMap<crate::action::Action, String> {
        &self.successors
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_error_handler(
        mut self,
        handler: impl Fn(PocketError) -> Option<PocketError> + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_input_type(mut self, ty: TypeDescriptor) -> Self {
        self.input_type = ty;
        self
    }

    pub fn with_output_type(mut self, ty: TypeDescriptor) -> Self {
        self.output_type = ty;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_type(&self) -> &TypeDescriptor {
        &self.input_type
    }

    pub fn output_type(&self) -> &TypeDescriptor {
        &self.output_type
    }

    /// Runs one full Prep -> Exec(retry/timeout) -> Post visit, firing
    /// hooks and applying the error handler along the way. `onComplete`
    /// fires exactly once no matter which branch returns or panics.
    #[tracing::instrument(skip(self, store, ctx), fields(node = %self.name))]
    pub async fn visit(&self, store: &Store, ctx: &RunContext) -> PocketResult<crate::action::Action> {
        let mut guard = self.hooks.guard();
        let result = self.run_lifecycle(store, ctx).await;
        if let Err(err) = &result {
            tracing::warn!(error = %err, "node visit failed");
            self.hooks.fire_failure(err);
        }
        guard.fire_now();
        result
    }

    async fn run_lifecycle(
        &self,
        store: &Store,
        ctx: &RunContext,
    ) -> PocketResult<crate::action::Action> {
        let prep_result = match self.backend.prep(store, ctx).await {
            Ok(v) => v,
            Err(e) => return self.handle_error(PocketError::input(&self.name, e)),
        };

        let exec_result = match self.exec_with_retry(prep_result.clone(), ctx).await {
            Ok(v) => v,
            Err(e) => return self.handle_error(e),
        };

        tracing::debug!("exec succeeded");
        let success_payload = exec_result.clone();

        match self
            .backend
            .post(store, prep_result, exec_result, ctx)
            .await
        {
            Ok(action) => {
                self.hooks.fire_success(&success_payload);
                Ok(action)
            }
            Err(e) => self.handle_error(PocketError::routing(&self.name, e)),
        }
    }

    async fn exec_with_retry(&self, prep_result: Value, ctx: &RunContext) -> PocketResult<Value> {
        let mut attempt = 1usize;
        loop {
            let token = ctx.child_token();
            let started = Instant::now();
            let outcome =
                run_with_deadline(self.backend.exec(prep_result.clone(), ctx), self.timeout, token)
                    .await;

            let (source, timed_out_ms): (BoxError, Option<u128>) = match outcome {
                Some(Ok(value)) => return Ok(value),
                Some(Err(e)) => (e, None),
                None if ctx.is_cancelled() => {
                    return Err(PocketError::Cancelled {
                        node: self.name.clone(),
                    });
                }
                None => {
                    let elapsed_ms = started.elapsed().as_millis();
                    (
                        Box::new(crate::error::Msg(format!(
                            "exec timed out after {elapsed_ms}ms"
                        ))),
                        Some(elapsed_ms),
                    )
                }
            };

            if attempt < self.retry.max_attempts {
                let delay = self.retry.delay_for(attempt);
                if !delay.is_zero() {
                    let cancelled = ctx.cancellation_token();
                    tokio::select! {
                        _ = cancelled.cancelled() => {
                            return Err(PocketError::Cancelled {
                                node: self.name.clone(),
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                attempt += 1;
                tracing::debug!(attempt, "retrying exec");
                continue;
            }

            return match self
                .backend
                .exec_fallback(prep_result.clone(), source, ctx)
                .await
            {
                Ok(value) => Ok(value),
                Err(e) if self.backend.has_fallback() => Err(PocketError::fallback(&self.name, e)),
                Err(_e) if timed_out_ms.is_some() => Err(PocketError::Timeout {
                    node: self.name.clone(),
                    elapsed_ms: timed_out_ms.expect("checked by guard above"),
                }),
                Err(e) => Err(PocketError::exec(&self.name, e)),
            };
        }
    }

    /// Applies the configured [`ErrorHandler`], if any. `Cancelled` is
    /// never handed to it. Suppression (`None`) resolves the visit to the
    /// default action, which ends the run at this node unless the owning
    /// graph has wired a successor for it — mirroring Post returning no
    /// successor.
    fn handle_error(&self, err: PocketError) -> PocketResult<crate::action::Action> {
        if err.is_cancelled() {
            return Err(err);
        }
        match &self.error_handler {
            Some(handler) => match handler(err) {
                Some(propagated) => Err(propagated),
                None => Ok(crate::action::Action::default()),
            },
            None => Err(err),
        }
    }
}
