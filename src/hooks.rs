//! Lifecycle hooks attached to a node: `onSuccess`, `onFailure`, `onComplete`.
//! Boxed closures, one independent slot per callback.
//!
//! `onComplete` must run exactly once per node visit regardless of how the
//! visit ends — success, failure, or panic unwinding through the visit's
//! stack frame. [`HookGuard`] gets that guarantee from `Drop`: it is armed at
//! the start of a visit and disarmed only after firing.

use crate::error::PocketError;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

type SuccessFn = Arc<dyn Fn(&Value) + Send + Sync>;
type FailureFn = Arc<dyn Fn(&PocketError) + Send + Sync>;
type CompleteFn = Arc<dyn Fn() + Send + Sync>;

/// The hook set for a single node. Each slot is optional; an unset slot is a
/// no-op. Hook errors (a panic inside a hook closure) are caught and
/// swallowed, per spec: hooks must never fail a run.
#[derive(Clone, Default)]
pub struct Hooks {
    on_success: Option<SuccessFn>,
    on_failure: Option<FailureFn>,
    on_complete: Option<CompleteFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Hooks::default()
    }

    pub fn on_success(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl Fn(&PocketError) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    pub(crate) fn fire_success(&self, result: &Value) {
        if let Some(f) = &self.on_success {
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| f(result)));
        }
    }

    pub(crate) fn fire_failure(&self, err: &PocketError) {
        if let Some(f) = &self.on_failure {
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| f(err)));
        }
    }

    fn fire_complete(&self) {
        if let Some(f) = &self.on_complete {
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| f()));
        }
    }

    /// Arms a guard that fires `onComplete` exactly once, whether the visit
    /// returns normally or its stack unwinds through this guard's scope.
    pub(crate) fn guard(&self) -> HookGuard<'_> {
        HookGuard {
            hooks: self,
            fired: false,
        }
    }
}

/// RAII guard firing `onComplete` at most once, on drop.
pub(crate) struct HookGuard<'a> {
    hooks: &'a Hooks,
    fired: bool,
}

impl HookGuard<'_> {
    /// Fires `onComplete` immediately rather than waiting for drop, for the
    /// common case where the visit completed without unwinding.
    pub(crate) fn fire_now(&mut self) {
        if !self.fired {
            self.fired = true;
            self.hooks.fire_complete();
        }
    }
}

impl Drop for HookGuard<'_> {
    fn drop(&mut self) {
        if !self.fired {
            self.fired = true;
            self.hooks.fire_complete();
        }
    }
}
