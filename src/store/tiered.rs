//! A multi-tier backend: an ordered list of backing stores, fastest first.
//! `get` probes tiers in order and, on a hit at tier `i > 0`, promotes the
//! entry one level up to tier `i - 1`, best-effort (a promotion failure is
//! ignored and the value is still returned). `set` always writes tier 0;
//! `delete` writes through every tier.
//!
//! Promotion needs to mutate a tier from inside `get`, which
//! [`StorageBackend::get`] only gets a shared reference for (it runs behind
//! `Store`'s `RwLock` read guard). Each tier is therefore kept behind its own
//! `Mutex` so `get` can still write through to the tier above it on a lower
//! hit without widening the trait to `&mut self`.

use super::StorageBackend;
use crate::error::BoxError;
use serde_json::Value;
use std::sync::Mutex;

pub struct TieredStore {
    tiers: Vec<Mutex<Box<dyn StorageBackend>>>,
}

impl TieredStore {
    /// Builds a multi-tier backend from `tiers`, ordered fastest-first
    /// (tier 0 is probed first and is where every `set` lands).
    pub fn new(tiers: Vec<Box<dyn StorageBackend>>) -> Self {
        assert!(!tiers.is_empty(), "must have at least one tier");
        TieredStore {
            tiers: tiers.into_iter().map(Mutex::new).collect(),
        }
    }

    /// Convenience constructor for the common two-tier hot/cold shape.
    pub fn hot_cold(hot: impl StorageBackend + 'static, cold: impl StorageBackend + 'static) -> Self {
        TieredStore::new(vec![Box::new(hot), Box::new(cold)])
    }

    #[cfg(test)]
    fn tier(&self, i: usize) -> std::sync::MutexGuard<'_, Box<dyn StorageBackend>> {
        self.tiers[i].lock().unwrap()
    }
}

impl StorageBackend for TieredStore {
    /// Probes tiers in order; on a hit at tier `i > 0`, promotes the value
    /// one level up to tier `i - 1` before returning it.
    fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        for i in 0..self.tiers.len() {
            let hit = self.tiers[i].lock().unwrap().get(key)?;
            if let Some(value) = hit {
                if i > 0 {
                    let _ = self.tiers[i - 1]
                        .lock()
                        .unwrap()
                        .set(key.to_string(), value.clone());
                }
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn set(&mut self, key: String, value: Value) -> Result<(), BoxError> {
        self.tiers[0].get_mut().unwrap().set(key, value)
    }

    /// Writes through every tier regardless of whether an earlier tier
    /// errored; the first error (if any) is returned only after every tier
    /// has been attempted.
    fn remove(&mut self, key: &str) -> Result<Option<Value>, BoxError> {
        let mut removed = None;
        let mut first_err = None;
        for tier in &mut self.tiers {
            match tier.get_mut().unwrap().remove(key) {
                Ok(Some(value)) => removed = Some(value),
                Ok(None) => {}
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(_) => {}
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        Ok(removed)
    }

    fn contains_key(&self, key: &str) -> Result<bool, BoxError> {
        for tier in &self.tiers {
            if tier.lock().unwrap().contains_key(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// No single tier is guaranteed complete (tier 0 holds everything ever
    /// `set`, lower tiers only what has since been promoted on read), so
    /// this returns the union across every tier.
    fn keys(&self) -> Result<Vec<String>, BoxError> {
        let mut seen = std::collections::HashSet::new();
        for tier in &self.tiers {
            for key in tier.lock().unwrap().keys()? {
                seen.insert(key);
            }
        }
        Ok(seen.into_iter().collect())
    }

    fn clear(&mut self) -> Result<(), BoxError> {
        for tier in &mut self.tiers {
            tier.get_mut().unwrap().clear()?;
        }
        Ok(())
    }

    fn len(&self) -> Result<usize, BoxError> {
        Ok(self.keys()?.len())
    }
}
