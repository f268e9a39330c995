//! Error taxonomy for the graph runtime.
//!
//! Every error surfaced by a [`Graph::run`](crate::graph::Graph::run) wraps
//! the failing node's name and the original cause, per the propagation
//! policy: errors are local to a node until surfaced, at which point they
//! trigger `onFailure`/`onComplete` and abort the run.

use crate::types::TypeDescriptor;
use std::fmt;

/// Boxed source error, kept `Send + Sync` so it can cross `.await` points
/// and be stored inside a `thiserror` variant without a lifetime.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single error value observed by callers of [`Graph::run`](crate::graph::Graph::run).
#[derive(Debug, thiserror::Error)]
pub enum PocketError {
    /// Prep rejected the input.
    #[error("node '{node}' rejected input during prep: {source}")]
    Input { node: String, source: BoxError },

    /// Exec failed, possibly after retries.
    #[error("node '{node}' exec failed: {source}")]
    Exec { node: String, source: BoxError },

    /// Exec's deadline expired. Retryable like `Exec`.
    #[error("node '{node}' exec timed out after {elapsed_ms}ms")]
    Timeout { node: String, elapsed_ms: u128 },

    /// The run's context was cancelled. Never retried, never silenced by an
    /// `ErrorHandler`.
    #[error("node '{node}' cancelled")]
    Cancelled { node: String },

    /// Fallback itself failed after Exec exhausted its retries.
    #[error("node '{node}' fallback failed: {source}")]
    Fallback { node: String, source: BoxError },

    /// Post returned an error, or resolved to an action the runner could
    /// not route.
    #[error("node '{node}' routing failed: {source}")]
    Routing { node: String, source: BoxError },

    /// Static validation failure, surfaced only at `Builder::build` time.
    #[error(
        "type mismatch: '{producer}' produces {producer_type} but '{consumer}' expects {consumer_type}"
    )]
    TypeMismatch {
        producer: String,
        producer_type: TypeDescriptor,
        consumer: String,
        consumer_type: TypeDescriptor,
    },

    /// Propagated verbatim from a `StorageBackend`.
    #[error("store error: {0}")]
    Store(BoxError),

    /// `Builder` detected a duplicate/unknown node name or a missing start.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PocketError {
    pub fn node_name(&self) -> Option<&str> {
        match self {
            PocketError::Input { node, .. }
            | PocketError::Exec { node, .. }
            | PocketError::Timeout { node, .. }
            | PocketError::Cancelled { node }
            | PocketError::Fallback { node, .. }
            | PocketError::Routing { node, .. } => Some(node),
            PocketError::TypeMismatch { .. }
            | PocketError::Store(_)
            | PocketError::Configuration(_) => None,
        }
    }

    /// Whether this error is eligible for retry/fallback handling. Only
    /// `Cancelled` is categorically excluded: it bypasses retry and
    /// fallback entirely, per spec.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PocketError::Cancelled { .. })
    }

    pub(crate) fn exec(node: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PocketError::Exec {
            node: node.into(),
            source: source.into(),
        }
    }

    pub(crate) fn input(node: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PocketError::Input {
            node: node.into(),
            source: source.into(),
        }
    }

    pub(crate) fn routing(node: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PocketError::Routing {
            node: node.into(),
            source: source.into(),
        }
    }

    pub(crate) fn fallback(node: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PocketError::Fallback {
            node: node.into(),
            source: source.into(),
        }
    }
}

/// A plain-string error, used where callers don't need a richer source
/// type (e.g. `exec_fallback`'s default propagation, test nodes).
#[derive(Debug, Clone)]
pub struct Msg(pub String);

impl fmt::Display for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Msg {}

impl From<&str> for Msg {
    fn from(s: &str) -> Self {
        Msg(s.to_string())
    }
}

impl From<String> for Msg {
    fn from(s: String) -> Self {
        Msg(s)
    }
}

pub type PocketResult<T> = Result<T, PocketError>;
