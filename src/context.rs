//! Run-scoped context threaded through a single [`Graph::run`](crate::graph::Graph::run)
//! call: cancellation, the optional step guard, and an execution id used in
//! tracing spans.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared state for one run of a graph. Cloning a `RunContext` is cheap and
/// shares the same cancellation token and step counter, scoped to the whole
/// run rather than a single node's retry loop (retry state lives in
/// [`crate::retry`] instead).
#[derive(Debug, Clone)]
pub struct RunContext {
    execution_id: String,
    cancellation: CancellationToken,
    max_steps: Option<usize>,
    steps_taken: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl RunContext {
    pub fn new() -> Self {
        RunContext {
            execution_id: uuid::Uuid::new_v4().to_string(),
            cancellation: CancellationToken::new(),
            max_steps: None,
            steps_taken: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    /// Caps the number of node visits the runner will make before failing
    /// with a step-limit error. Cycles are otherwise legal; the only
    /// mandatory termination condition is Post returning no successor.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancels the run. In-flight Exec futures observe this through their
    /// derived deadline context; the runner observes it between steps.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Derives a deadline-bound child token for a single Exec call, scoped
    /// to `timeout` and to this run's cancellation.
    pub fn child_token(&self) -> CancellationToken {
        self.cancellation.child_token()
    }

    /// Records one more node visit, returning `Err(())` if the configured
    /// step limit has been exceeded.
    pub(crate) fn record_step(&self) -> Result<usize, ()> {
        let taken = self
            .steps_taken
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        match self.max_steps {
            Some(limit) if taken > limit => Err(()),
            _ => Ok(taken),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        RunContext::new()
    }
}

/// Runs `fut` with a deadline of `timeout`, cancellable early via `token`.
/// Returns `Ok(None)` on cancellation, `Ok(Some(_))` on success, and leaves
/// timeout-vs-cancellation disambiguation to the caller (the node runner
/// checks `token.is_cancelled()` after a `None` to tell them apart).
pub(crate) async fn run_with_deadline<F, T>(
    fut: F,
    timeout: Option<Duration>,
    token: CancellationToken,
) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout {
        Some(duration) => {
            tokio::select! {
                _ = token.cancelled() => None,
                result = tokio::time::timeout(duration, fut) => result.ok(),
            }
        }
        None => {
            tokio::select! {
                _ = token.cancelled() => None,
                result = fut => Some(result),
            }
        }
    }
}
