//! The run's Store: a read/write-partitioned, namespace-scoped key-value
//! surface over a pluggable [`StorageBackend`]. Two notable design choices:
//!
//! - `StorageBackend` drops its associated `Error` type so that `Box<dyn
//!   StorageBackend>` is object-safe — needed because bounded/sharded/tiered
//!   backends wrap an arbitrary nested backend.
//! - Prep sees the store only through [`StoreReader`]; Post (and Fallback,
//!   for cleanup) sees it through [`StoreWriter`]. The partition is a type
//!   distinction over the same underlying data, not two copies of it.

mod bounded;
mod memory;
mod sharded;
mod tiered;

pub use bounded::{BoundedStore, EvictionPolicy};
pub use memory::MemoryBackend;
pub use sharded::ShardedStore;
pub use tiered::TieredStore;

use crate::error::{BoxError, PocketError, PocketResult};
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// A pluggable key-value backend. Implementors own eviction, capacity, and
/// persistence concerns; the [`Store`] wrapper only owns namespace scoping.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, BoxError>;
    fn set(&mut self, key: String, value: Value) -> Result<(), BoxError>;
    fn remove(&mut self, key: &str) -> Result<Option<Value>, BoxError>;
    fn contains_key(&self, key: &str) -> Result<bool, BoxError> {
        Ok(self.get(key)?.is_some())
    }
    fn keys(&self) -> Result<Vec<String>, BoxError>;
    fn clear(&mut self) -> Result<(), BoxError>;
    fn len(&self) -> Result<usize, BoxError>;
    fn is_empty(&self) -> Result<bool, BoxError> {
        Ok(self.len()? == 0)
    }
}

/// Read-only view of a [`Store`], handed to Prep.
pub trait StoreReader: Send + Sync {
    fn get(&self, key: &str) -> PocketResult<Option<Value>>;
    fn contains_key(&self, key: &str) -> PocketResult<bool>;
    fn keys(&self) -> PocketResult<Vec<String>>;

    /// Internal escape hatch letting a graph-as-node backend recover the
    /// concrete, cloneable [`Store`] handle behind this view, so it can run
    /// a nested graph against the live outer store when the caller opted
    /// into store sharing. Ordinary node backends never need this; it is
    /// not meant to be called or overridden outside this crate.
    #[doc(hidden)]
    fn as_store(&self) -> Option<Store> {
        None
    }
}

/// Read-write view of a [`Store`], handed to Post and Fallback.
pub trait StoreWriter: StoreReader {
    fn set(&self, key: &str, value: Value) -> PocketResult<()>;
    fn remove(&self, key: &str) -> PocketResult<Option<Value>>;
    fn clear(&self) -> PocketResult<()>;
}

/// A namespaced handle onto a shared backend. Namespaces compose with `:` —
/// `store.scope("user").scope("profile")` reads and writes under the
/// `user:profile:` prefix, sharing the same backend instance as the store it
/// was scoped from.
#[derive(Clone)]
pub struct Store {
    backend: Arc<RwLock<Box<dyn StorageBackend>>>,
    namespace: String,
}

impl Store {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Store {
            backend: Arc::new(RwLock::new(Box::new(backend))),
            namespace: String::new(),
        }
    }

    /// Returns a handle scoped under `name`, composing with any existing
    /// namespace via `:`.
    pub fn scope(&self, name: &str) -> Store {
        let namespace = if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", self.namespace, name)
        };
        Store {
            backend: self.backend.clone(),
            namespace,
        }
    }

    fn qualify(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.namespace, key)
        }
    }

    fn prefix(&self) -> String {
        if self.namespace.is_empty() {
            String::new()
        } else {
            format!("{}:", self.namespace)
        }
    }

    fn read_lock(&self) -> PocketResult<std::sync::RwLockReadGuard<'_, Box<dyn StorageBackend>>> {
        self.backend
            .read()
            .map_err(|_| PocketError::Store("store lock poisoned".into()))
    }

    fn write_lock(
        &self,
    ) -> PocketResult<std::sync::RwLockWriteGuard<'_, Box<dyn StorageBackend>>> {
        self.backend
            .write()
            .map_err(|_| PocketError::Store("store lock poisoned".into()))
    }
}

impl StoreReader for Store {
    fn get(&self, key: &str) -> PocketResult<Option<Value>> {
        self.read_lock()?
            .get(&self.qualify(key))
            .map_err(PocketError::Store)
    }

    fn contains_key(&self, key: &str) -> PocketResult<bool> {
        self.read_lock()?
            .contains_key(&self.qualify(key))
            .map_err(PocketError::Store)
    }

    fn keys(&self) -> PocketResult<Vec<String>> {
        let prefix = self.prefix();
        let all = self.read_lock()?.keys().map_err(PocketError::Store)?;
        Ok(all
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(|rest| rest.to_string()))
            .collect())
    }

    fn as_store(&self) -> Option<Store> {
        Some(self.clone())
    }
}

impl StoreWriter for Store {
    fn set(&self, key: &str, value: Value) -> PocketResult<()> {
        self.write_lock()?
            .set(self.qualify(key), value)
            .map_err(PocketError::Store)
    }

    fn remove(&self, key: &str) -> PocketResult<Option<Value>> {
        self.write_lock()?
            .remove(&self.qualify(key))
            .map_err(PocketError::Store)
    }

    fn clear(&self) -> PocketResult<()> {
        // Scoped clear only removes keys under this namespace; an
        // unscoped (root) store clears everything.
        if self.namespace.is_empty() {
            return self.write_lock()?.clear().map_err(PocketError::Store);
        }
        let keys = self.keys()?;
        let mut backend = self.write_lock()?;
        for key in keys {
            backend
                .remove(&self.qualify(&key))
                .map_err(PocketError::Store)?;
        }
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new(MemoryBackend::new())
    }
}
