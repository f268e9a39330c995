//! A backend that distributes keys across N independent sub-backends by
//! hash, so that concurrent writers touching different keys rarely contend
//! on the same inner lock once wrapped behind [`super::Store`]'s `RwLock`.
//! Useful for high fan-out workloads alongside bounded eviction.

use super::{MemoryBackend, StorageBackend};
use crate::error::BoxError;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Wraps `shard_count` backends, routing each key to one shard by hash.
pub struct ShardedStore {
    shards: Vec<Box<dyn StorageBackend>>,
}

impl ShardedStore {
    /// Builds a sharded backend with `shard_count` plain in-memory shards.
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "shard_count must be positive");
        ShardedStore {
            shards: (0..shard_count)
                .map(|_| Box::new(MemoryBackend::new()) as Box<dyn StorageBackend>)
                .collect(),
        }
    }

    /// Builds a sharded backend from caller-supplied shard backends, e.g. one
    /// [`super::BoundedStore`] per shard.
    pub fn from_shards(shards: Vec<Box<dyn StorageBackend>>) -> Self {
        assert!(!shards.is_empty(), "must have at least one shard");
        ShardedStore { shards }
    }

    fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }
}

impl StorageBackend for ShardedStore {
    fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        self.shards[self.shard_for(key)].get(key)
    }

    fn set(&mut self, key: String, value: Value) -> Result<(), BoxError> {
        let shard = self.shard_for(&key);
        self.shards[shard].set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<Option<Value>, BoxError> {
        let shard = self.shard_for(key);
        self.shards[shard].remove(key)
    }

    fn contains_key(&self, key: &str) -> Result<bool, BoxError> {
        self.shards[self.shard_for(key)].contains_key(key)
    }

    fn keys(&self) -> Result<Vec<String>, BoxError> {
        let mut all = Vec::new();
        for shard in &self.shards {
            all.extend(shard.keys()?);
        }
        Ok(all)
    }

    fn clear(&mut self) -> Result<(), BoxError> {
        for shard in &mut self.shards {
            shard.clear()?;
        }
        Ok(())
    }

    fn len(&self) -> Result<usize, BoxError> {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.len()?;
        }
        Ok(total)
    }
}
