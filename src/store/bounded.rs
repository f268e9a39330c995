//! A capacity-bounded backend with pluggable eviction: LRU, LFU, FIFO, and
//! TTL, plus `maxBytes`/`ValueTooLarge`/`onEvict`.
//!
//! `StorageBackend::get` takes `&self` (it is called through a shared
//! `RwLock` read guard from [`super::Store`]), but LRU/LFU eviction needs to
//! record that a read happened. `entries` is therefore kept behind a
//! `Mutex` even though most of this type's own methods take `&mut self`: it
//! is the only way `get` can touch access metadata without widening the
//! trait to `&mut self` for every backend.
//!
//! No background sweep task runs alongside the opportunistic expiry below.
//! A periodic sweep (period ~= ttl/2) would only trim memory sooner between
//! reads; opportunistic expiry on Get/Set already keeps an expired entry
//! from ever being observably returned. `BoundedStore` itself never holds
//! the `Arc` its `Store` owner wraps it in, so it has no handle of its own
//! a self-spawned periodic task could lock against without restructuring
//! `Store` to hand backends their own `Arc`. Noted here rather than
//! implemented.

use super::StorageBackend;
use crate::error::BoxError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Which entry a full [`BoundedStore`] evicts to make room for a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Evict the entry least recently read or written.
    Lru,
    /// Evict the entry with the fewest accesses.
    Lfu,
    /// Evict the oldest entry, regardless of access pattern.
    Fifo,
    /// Evict whichever entry is closest to (or past) its TTL.
    Ttl,
}

/// Returned from `set` when a single value's estimated size exceeds the
/// store's configured `maxBytes`.
#[derive(Debug)]
pub struct ValueTooLarge {
    pub estimated_bytes: usize,
    pub max_bytes: usize,
}

impl fmt::Display for ValueTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value is {} bytes, exceeding the store's {}-byte limit",
            self.estimated_bytes, self.max_bytes
        )
    }
}

impl std::error::Error for ValueTooLarge {}

/// Estimates a JSON value's serialized size. Good enough for a size-based
/// eviction budget; not meant to match any wire encoding exactly.
fn estimate_size(value: &serde_json::Value) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

struct Entry {
    value: serde_json::Value,
    size: usize,
    created_at: Instant,
    last_accessed: Instant,
    access_count: usize,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: serde_json::Value, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        let size = estimate_size(&value);
        Entry {
            value,
            size,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

type OnEvict = Arc<dyn Fn(&str, &serde_json::Value) + Send + Sync>;

fn pick_victim(entries: &HashMap<String, Entry>, policy: EvictionPolicy) -> Option<String> {
    match policy {
        EvictionPolicy::Lru => entries.iter().min_by_key(|(_, e)| e.last_accessed).map(|(k, _)| k.clone()),
        EvictionPolicy::Lfu => entries
            .iter()
            .min_by_key(|(_, e)| (e.access_count, e.last_accessed))
            .map(|(k, _)| k.clone()),
        EvictionPolicy::Fifo => entries.iter().min_by_key(|(_, e)| e.created_at).map(|(k, _)| k.clone()),
        EvictionPolicy::Ttl => entries
            .iter()
            .min_by_key(|(_, e)| e.expires_at.unwrap_or(e.created_at))
            .map(|(k, _)| k.clone()),
    }
}

/// Evicts one entry by `policy`, firing `on_evict` (if any) after removal.
/// A panicking callback is caught, not propagated.
fn evict_one(entries: &mut HashMap<String, Entry>, policy: EvictionPolicy, on_evict: Option<&OnEvict>) {
    let Some(key) = pick_victim(entries, policy) else {
        return;
    };
    if let Some(entry) = entries.remove(&key) {
        if let Some(cb) = on_evict {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&key, &entry.value)));
        }
    }
}

fn purge_expired(entries: &mut HashMap<String, Entry>, on_evict: Option<&OnEvict>) {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, e)| e.is_expired())
        .map(|(k, _)| k.clone())
        .collect();
    for key in expired {
        if let Some(entry) = entries.remove(&key) {
            if let Some(cb) = on_evict {
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&key, &entry.value)));
            }
        }
    }
}

/// A backend that evicts entries once `max_entries` and/or `max_bytes` is
/// reached, by the configured [`EvictionPolicy`].
pub struct BoundedStore {
    entries: Mutex<HashMap<String, Entry>>,
    max_entries: usize,
    max_bytes: Option<usize>,
    policy: EvictionPolicy,
    default_ttl: Option<Duration>,
    on_evict: Option<OnEvict>,
}

impl BoundedStore {
    pub fn new(max_entries: usize, policy: EvictionPolicy) -> Self {
        assert!(max_entries > 0, "bounded store capacity must be positive");
        BoundedStore {
            entries: Mutex::new(HashMap::new()),
            max_entries,
            max_bytes: None,
            policy,
            default_ttl: None,
            on_evict: None,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Caps total estimated byte size across all live entries. A single
    /// `set` whose own estimated size exceeds this fails with
    /// [`ValueTooLarge`] rather than ever being admitted.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn with_on_evict(mut self, f: impl Fn(&str, &serde_json::Value) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Arc::new(f));
        self
    }

    fn total_bytes(entries: &HashMap<String, Entry>) -> usize {
        entries.values().map(|e| e.size).sum()
    }
}

impl StorageBackend for BoundedStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, BoxError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(e) if e.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(e) => {
                e.touch();
                Ok(Some(e.value.clone()))
            }
            None => Ok(None),
        }
    }

    fn set(&mut self, key: String, value: serde_json::Value) -> Result<(), BoxError> {
        let size = estimate_size(&value);
        if let Some(max_bytes) = self.max_bytes {
            if size > max_bytes {
                return Err(Box::new(ValueTooLarge {
                    estimated_bytes: size,
                    max_bytes,
                }));
            }
        }

        let on_evict = self.on_evict.clone();
        let entries = self.entries.get_mut().unwrap();
        purge_expired(entries, on_evict.as_ref());

        let previous_size = entries.get(&key).map(|e| e.size).unwrap_or(0);
        let is_new_key = !entries.contains_key(&key);

        while is_new_key && entries.len() >= self.max_entries {
            evict_one(entries, self.policy, on_evict.as_ref());
        }
        while let Some(max_bytes) = self.max_bytes {
            let projected = Self::total_bytes(entries) - previous_size + size;
            if projected <= max_bytes || entries.is_empty() {
                break;
            }
            evict_one(entries, self.policy, on_evict.as_ref());
        }

        match entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                entry.size = size;
                entry.touch();
            }
            None => {
                entries.insert(key, Entry::new(value, self.default_ttl));
            }
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<serde_json::Value>, BoxError> {
        Ok(self.entries.get_mut().unwrap().remove(key).map(|e| e.value))
    }

    fn contains_key(&self, key: &str) -> Result<bool, BoxError> {
        let entries = self.entries.lock().unwrap();
        Ok(matches!(entries.get(key), Some(e) if !e.is_expired()))
    }

    fn keys(&self) -> Result<Vec<String>, BoxError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn clear(&mut self) -> Result<(), BoxError> {
        self.entries.get_mut().unwrap().clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, BoxError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().filter(|(_, e)| !e.is_expired()).count())
    }
}
