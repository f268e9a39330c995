//! End-to-end scenarios exercising conditional routing, retry, fallback,
//! cancellation, and scoped store isolation together through a real
//! `Graph`, rather than one module in isolation.

use async_trait::async_trait;
use pocket::error::BoxError;
use pocket::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Classify;

#[async_trait]
impl NodeBackend for Classify {
    async fn prep(&self, store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(store.get("input")?.unwrap_or(json!("")))
    }

    async fn exec(&self, prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
        let text = prep_result.as_str().unwrap_or("");
        Ok(json!(text.contains("hi")))
    }

    async fn post(
        &self,
        _store: &dyn StoreWriter,
        _prep_result: Value,
        exec_result: Value,
        _ctx: &RunContext,
    ) -> Result<Action, BoxError> {
        if exec_result.as_bool().unwrap_or(false) {
            Ok(Action::new("greeting"))
        } else {
            Ok(Action::new("general"))
        }
    }
}

struct Respond {
    reply: &'static str,
}

#[async_trait]
impl NodeBackend for Respond {
    async fn prep(&self, _store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(Value::Null)
    }

    async fn exec(&self, _prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(json!(self.reply))
    }

    async fn post(
        &self,
        store: &dyn StoreWriter,
        _prep_result: Value,
        exec_result: Value,
        _ctx: &RunContext,
    ) -> Result<Action, BoxError> {
        store.set("reply", exec_result)?;
        Ok(Action::default())
    }
}

fn classify_graph() -> Graph {
    GraphBuilder::new("classify")
        .add_node("classify", Classify)
        .add_node("greet", Respond { reply: "hello" })
        .add_node("general", Respond { reply: "ok" })
        .connect("classify", "greeting", "greet")
        .connect("classify", "general", "general")
        .start("classify")
        .build()
        .unwrap()
}

#[tokio::test]
async fn conditional_routing_picks_branch_by_action() {
    let graph = classify_graph();

    let store = Store::default();
    store.set("input", json!("hi there")).unwrap();
    let outcome = graph.run(&store, &RunContext::new()).await.unwrap();
    assert_eq!(outcome.last_node, "greet");
    assert_eq!(store.get("reply").unwrap(), Some(json!("hello")));

    let store = Store::default();
    store.set("input", json!("why?")).unwrap();
    let outcome = graph.run(&store, &RunContext::new()).await.unwrap();
    assert_eq!(outcome.last_node, "general");
    assert_eq!(store.get("reply").unwrap(), Some(json!("ok")));
}

struct Flaky {
    attempts: AtomicUsize,
    fail_until: usize,
}

#[async_trait]
impl NodeBackend for Flaky {
    async fn prep(&self, _store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(Value::Null)
    }

    async fn exec(&self, _prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_until {
            Err(Box::new(pocket::error::Msg("transient".into())))
        } else {
            Ok(json!("done"))
        }
    }

    async fn post(
        &self,
        store: &dyn StoreWriter,
        _prep_result: Value,
        exec_result: Value,
        _ctx: &RunContext,
    ) -> Result<Action, BoxError> {
        store.set("result", exec_result)?;
        Ok(Action::default())
    }
}

#[tokio::test]
async fn retry_succeeds_after_transient_failures() {
    let success_count = Arc::new(AtomicUsize::new(0));
    let failure_count = Arc::new(AtomicUsize::new(0));
    let complete_count = Arc::new(AtomicUsize::new(0));

    let s = success_count.clone();
    let f = failure_count.clone();
    let c = complete_count.clone();
    let hooks = Hooks::new()
        .on_success(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .on_failure(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .on_complete(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

    let node = Node::new(
        "flaky",
        Flaky {
            attempts: AtomicUsize::new(0),
            fail_until: 2,
        },
    )
    .with_retry(RetryPolicy::new(3).with_initial_delay(Duration::from_millis(10)))
    .with_hooks(hooks);

    let graph = GraphBuilder::new("retry")
        .add_existing_node(node)
        .start("flaky")
        .build()
        .unwrap();

    let store = Store::default();
    graph.run(&store, &RunContext::new()).await.unwrap();

    assert_eq!(store.get("result").unwrap(), Some(json!("done")));
    assert_eq!(success_count.load(Ordering::SeqCst), 1);
    assert_eq!(failure_count.load(Ordering::SeqCst), 0);
    assert_eq!(complete_count.load(Ordering::SeqCst), 1);
}

struct AlwaysDown;

#[async_trait]
impl NodeBackend for AlwaysDown {
    async fn prep(&self, _store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(Value::Null)
    }

    async fn exec(&self, _prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
        Err(Box::new(pocket::error::Msg("down".into())))
    }

    async fn post(
        &self,
        store: &dyn StoreWriter,
        _prep_result: Value,
        exec_result: Value,
        _ctx: &RunContext,
    ) -> Result<Action, BoxError> {
        store.set("result", exec_result)?;
        Ok(Action::default())
    }

    async fn exec_fallback(
        &self,
        _prep_result: Value,
        _error: BoxError,
        _ctx: &RunContext,
    ) -> Result<Value, BoxError> {
        Ok(json!("cached"))
    }

    fn has_fallback(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn fallback_runs_once_exec_exhausts_retries() {
    let success_count = Arc::new(AtomicUsize::new(0));
    let complete_count = Arc::new(AtomicUsize::new(0));
    let s = success_count.clone();
    let c = complete_count.clone();
    let hooks = Hooks::new()
        .on_success(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .on_complete(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

    let node = Node::new("api", AlwaysDown)
        .with_retry(RetryPolicy::new(2))
        .with_hooks(hooks);

    let graph = GraphBuilder::new("fallback")
        .add_existing_node(node)
        .start("api")
        .build()
        .unwrap();

    let store = Store::default();
    graph.run(&store, &RunContext::new()).await.unwrap();

    assert_eq!(store.get("result").unwrap(), Some(json!("cached")));
    assert_eq!(success_count.load(Ordering::SeqCst), 1);
    assert_eq!(complete_count.load(Ordering::SeqCst), 1);
}

struct WaitForever;

#[async_trait]
impl NodeBackend for WaitForever {
    async fn prep(&self, _store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(Value::Null)
    }

    async fn exec(&self, _prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
        Err(Box::new(pocket::error::Msg("down".into())))
    }

    async fn post(
        &self,
        _store: &dyn StoreWriter,
        _prep_result: Value,
        _exec_result: Value,
        _ctx: &RunContext,
    ) -> Result<Action, BoxError> {
        unreachable!("exec never succeeds")
    }
}

#[tokio::test]
async fn cancellation_during_backoff_returns_promptly() {
    let failure_count = Arc::new(AtomicUsize::new(0));
    let complete_count = Arc::new(AtomicUsize::new(0));
    let f = failure_count.clone();
    let c = complete_count.clone();
    let hooks = Hooks::new()
        .on_failure(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .on_complete(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

    let node = Node::new("wait", WaitForever)
        .with_retry(
            RetryPolicy::new(5)
                .with_initial_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(10)),
        )
        .with_hooks(hooks);

    let graph = GraphBuilder::new("cancel")
        .add_existing_node(node)
        .start("wait")
        .build()
        .unwrap();

    let store = Store::default();
    let ctx = RunContext::new();
    let cancel_ctx = ctx.clone();

    let run = tokio::spawn(async move { graph.run(&store, &ctx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_ctx.cancel();

    let started = std::time::Instant::now();
    let result = run.await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(matches!(result, Err(PocketError::Cancelled { .. })));
    assert_eq!(failure_count.load(Ordering::SeqCst), 1);
    assert_eq!(complete_count.load(Ordering::SeqCst), 1);
}

struct WriteOne {
    key: &'static str,
    value: i64,
}

#[async_trait]
impl NodeBackend for WriteOne {
    async fn prep(&self, _store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(Value::Null)
    }

    async fn exec(&self, _prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
        Ok(json!(self.value))
    }

    async fn post(
        &self,
        store: &dyn StoreWriter,
        _prep_result: Value,
        exec_result: Value,
        _ctx: &RunContext,
    ) -> Result<Action, BoxError> {
        store.set(self.key, exec_result)?;
        Ok(Action::default())
    }
}

#[tokio::test]
async fn scoped_sub_nodes_do_not_see_each_others_writes() {
    let root = Store::default();
    let left = root.scope("left");
    let right = root.scope("right");

    let a = Node::new("a", WriteOne { key: "x", value: 1 });
    let b = Node::new("b", WriteOne { key: "x", value: 2 });

    a.visit(&left, &RunContext::new()).await.unwrap();
    b.visit(&right, &RunContext::new()).await.unwrap();

    assert_eq!(root.get("left:x").unwrap(), Some(json!(1)));
    assert_eq!(root.get("right:x").unwrap(), Some(json!(2)));
    assert_eq!(root.get("x").unwrap(), None);
}

#[test]
fn type_mismatch_is_rejected_at_build_time() {
    struct Noop;

    #[async_trait]
    impl NodeBackend for Noop {
        async fn prep(&self, _store: &dyn StoreReader, _ctx: &RunContext) -> Result<Value, BoxError> {
            Ok(Value::Null)
        }
        async fn exec(&self, _prep_result: Value, _ctx: &RunContext) -> Result<Value, BoxError> {
            Ok(Value::Null)
        }
        async fn post(
            &self,
            _store: &dyn StoreWriter,
            _prep_result: Value,
            _exec_result: Value,
            _ctx: &RunContext,
        ) -> Result<Action, BoxError> {
            Ok(Action::default())
        }
    }

    let u = Node::new("u", Noop).with_output_type(TypeDescriptor::named("Integer"));
    let v = Node::new("v", Noop).with_input_type(TypeDescriptor::named("Boolean"));

    let result = GraphBuilder::new("mismatch")
        .add_existing_node(u)
        .add_existing_node(v)
        .connect("u", "default", "v")
        .start("u")
        .build();

    match result {
        Err(PocketError::TypeMismatch {
            producer,
            consumer,
            ..
        }) => {
            assert_eq!(producer, "u");
            assert_eq!(consumer, "v");
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
}
