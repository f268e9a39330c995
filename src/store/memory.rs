use super::StorageBackend;
use crate::error::BoxError;
use serde_json::Value;
use std::collections::HashMap;

/// Plain in-memory backend: a `HashMap`, no eviction, no expiry. The
/// default backend for a fresh [`super::Store`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: HashMap<String, Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryBackend {
            data: HashMap::with_capacity(capacity),
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: String, value: Value) -> Result<(), BoxError> {
        self.data.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<Value>, BoxError> {
        Ok(self.data.remove(key))
    }

    fn contains_key(&self, key: &str) -> Result<bool, BoxError> {
        Ok(self.data.contains_key(key))
    }

    fn keys(&self) -> Result<Vec<String>, BoxError> {
        Ok(self.data.keys().cloned().collect())
    }

    fn clear(&mut self) -> Result<(), BoxError> {
        self.data.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, BoxError> {
        Ok(self.data.len())
    }
}
