//! Learn-result caching.
//!
//! A [`LearnKey`] fingerprints everything a learn call depends on: the rows, the constraints in
//! insertion order, the configuration and the kind of program. Sessions memoise their last
//! result under that key; a [`LearnCache`] injected by the caller extends the reuse across
//! sessions. [`MemoryCache`] is a bounded in-memory implementation with sliding expiry.

use crate::config::SynthesisConfig;
use crate::constraint::Constraint;
use crate::region::RowSet;
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const DOMAIN: &[u8] = b"EXEMPLAR_LEARN_KEY_V0";

/// Deterministic fingerprint of a learn call's inputs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LearnKey([u8; 32]);

impl LearnKey {
    /// Fingerprints a learn call of `kind` over `rows`, `constraints` and `config`.
    pub fn new(
        kind: &str,
        rows: &RowSet,
        constraints: &[Constraint],
        config: &SynthesisConfig,
    ) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN);
        update_str(&mut hasher, kind);
        hasher.update((rows.len() as u64).to_le_bytes());
        for row in rows {
            hasher.update((row.id().0 as u64).to_le_bytes());
            hasher.update((row.len() as u64).to_le_bytes());
            for cell in row.cells() {
                update_str(&mut hasher, cell.value());
            }
        }
        hasher.update(serde_json::to_vec(constraints)?);
        hasher.update(serde_json::to_vec(config)?);
        let mut key = [0u8; 32];
        key.copy_from_slice(&hasher.finalize());
        Ok(Self(key))
    }

    /// The raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// length-prefixed so that adjacent strings cannot run together
fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

impl fmt::Debug for LearnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LearnKey(")?;
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..)")
    }
}

/// A store for learn results, shared by the sessions of an application.
pub trait LearnCache<V>: Send + Sync {
    /// The value stored under `key`, if any.
    fn get(&self, key: &LearnKey) -> Option<V>;
    /// Stores `value` under `key`.
    fn put(&self, key: LearnKey, value: V);
}

struct Entry<V> {
    value: V,
    last_used: Instant,
    // logical clock, orders uses that share an instant
    stamp: u64,
}

struct Entries<V> {
    map: HashMap<LearnKey, Entry<V>>,
    clock: u64,
}

impl<V> Entries<V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// An in-memory [`LearnCache`] holding at most `capacity` entries, each dropped once unused for
/// `ttl`. When full, the least recently used entry is evicted.
pub struct MemoryCache<V> {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<Entries<V>>,
}

impl<V> MemoryCache<V> {
    /// An empty cache holding at most `capacity` entries, each expiring after `ttl` unused.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                clock: 0,
            }),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries<V>> {
        // entries stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> Default for MemoryCache<V> {
    /// 1024 entries, expiring after an hour without use.
    fn default() -> Self {
        Self::new(1024, Duration::from_secs(60 * 60))
    }
}

impl<V: Clone + Send> LearnCache<V> for MemoryCache<V> {
    fn get(&self, key: &LearnKey) -> Option<V> {
        let mut entries = self.lock();
        let now = Instant::now();
        let stamp = entries.tick();
        match entries.map.get_mut(key) {
            None => return None,
            Some(entry) if now.duration_since(entry.last_used) < self.ttl => {
                entry.last_used = now;
                entry.stamp = stamp;
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }
        entries.map.remove(key);
        tracing::debug!(key = ?key, "learn_cache_expired");
        None
    }

    fn put(&self, key: LearnKey, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        let now = Instant::now();
        let ttl = self.ttl;
        let stamp = entries.tick();
        entries
            .map
            .retain(|_, e| now.duration_since(e.last_used) < ttl);
        if !entries.map.contains_key(&key) && entries.map.len() >= self.capacity {
            let oldest = entries
                .map
                .iter()
                .min_by_key(|(_, e)| e.stamp)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                entries.map.remove(&oldest);
                tracing::debug!(key = ?oldest, "learn_cache_evicted");
            }
        }
        entries.map.insert(
            key,
            Entry {
                value,
                last_used: now,
                stamp,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Example;
    use crate::region::{rows_from_column, RowId};

    fn rows(strs: &[&str]) -> RowSet {
        let mut set = RowSet::new();
        set.extend(rows_from_column(strs)).unwrap();
        set
    }

    fn key(n: u8) -> LearnKey {
        LearnKey([n; 32])
    }

    #[test]
    fn keys_depend_on_every_input() {
        let config = SynthesisConfig::default();
        let c = vec![Constraint::from(Example::text(RowId(0), "x"))];
        let base = LearnKey::new("transform", &rows(&["a", "b"]), &c, &config).unwrap();
        assert_eq!(
            base,
            LearnKey::new("transform", &rows(&["a", "b"]), &c, &config).unwrap()
        );
        assert_ne!(
            base,
            LearnKey::new("split", &rows(&["a", "b"]), &c, &config).unwrap()
        );
        assert_ne!(
            base,
            LearnKey::new("transform", &rows(&["ab", ""]), &c, &config).unwrap()
        );
        assert_ne!(
            base,
            LearnKey::new("transform", &rows(&["a", "b"]), &[], &config).unwrap()
        );
        assert_ne!(
            base,
            LearnKey::new(
                "transform",
                &rows(&["a", "b"]),
                &c,
                &config.clone().with_max_learn_inputs(1)
            )
            .unwrap()
        );
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = MemoryCache::new(2, Duration::from_secs(3600));
        cache.put(key(1), "one");
        cache.put(key(2), "two");
        assert_eq!(cache.get(&key(1)), Some("one"));
        cache.put(key(3), "three");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(1)), Some("one"));
        assert_eq!(cache.get(&key(3)), Some("three"));
    }

    #[test]
    fn entries_expire() {
        let cache = MemoryCache::new(2, Duration::ZERO);
        cache.put(key(1), 1);
        assert_eq!(cache.get(&key(1)), None);
        assert!(cache.is_empty());
    }
}
