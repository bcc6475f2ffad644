use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::{CachedStatus, DecisionCache, DecisionKey};
use crate::engine::Decision;
use crate::error::CacheError;
use crate::types::{GatewayId, PrincipalId};

const DEFAULT_CAPACITY: usize = 10_000;

/// In-memory decision cache with per-entry TTL.
///
/// Expired entries are dropped when a read observes them; capacity is
/// enforced by least-recently-used eviction. Entries are immutable once
/// inserted, and a `put` for an existing key replaces the whole entry
/// (last write wins). Intended for single-process deployments and tests.
#[derive(Debug, Clone)]
pub struct MemoryDecisionCache {
    inner: Arc<Mutex<CacheState>>,
    capacity: usize,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<DecisionKey, DecisionEntry>,
    order: VecDeque<DecisionKey>,
}

#[derive(Debug, Clone)]
struct DecisionEntry {
    decision: Decision,
    created_at: Instant,
    ttl: Duration,
}

impl DecisionEntry {
    /// An entry is live strictly before `created_at + ttl`.
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

impl MemoryDecisionCache {
    /// Creates a new cache with the given capacity.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity,
        }
    }

    /// Returns the number of stored entries, including expired ones that no
    /// read has observed yet.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned lock").entries.len()
    }

    /// Returns true when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweeps out every expired entry and returns how many were removed.
    ///
    /// Not required for correctness (reads drop expired entries themselves);
    /// useful when the process wants to reclaim memory eagerly.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");
        let before = guard.entries.len();
        guard.entries.retain(|_, entry| !entry.is_expired(now));
        let state = &mut *guard;
        state.order.retain(|key| state.entries.contains_key(key));
        before - guard.entries.len()
    }

    fn remove_key(state: &mut CacheState, key: &DecisionKey) {
        if state.entries.remove(key).is_some() {
            state.order.retain(|existing| existing != key);
        }
    }

    fn touch(state: &mut CacheState, key: &DecisionKey) {
        state.order.retain(|existing| existing != key);
        state.order.push_back(key.clone());
    }

    fn evict_if_needed(state: &mut CacheState, capacity: usize) {
        if capacity == 0 {
            state.entries.clear();
            state.order.clear();
            return;
        }

        while state.entries.len() > capacity {
            if let Some(key) = state.order.pop_front() {
                state.entries.remove(&key);
            } else {
                break;
            }
        }
    }
}

impl Default for MemoryDecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl DecisionCache for MemoryDecisionCache {
    async fn get(&self, key: &DecisionKey) -> Result<CachedStatus, CacheError> {
        if self.capacity == 0 {
            return Ok(CachedStatus::NotCached);
        }

        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        if let Some(entry) = guard.entries.get(key) {
            if entry.is_expired(now) {
                Self::remove_key(&mut guard, key);
                return Ok(CachedStatus::NotCached);
            }
        }

        let status = guard
            .entries
            .get(key)
            .map(|entry| CachedStatus::from_decision(entry.decision));
        match status {
            Some(status) => {
                Self::touch(&mut guard, key);
                Ok(status)
            }
            None => Ok(CachedStatus::NotCached),
        }
    }

    async fn put(
        &self,
        key: DecisionKey,
        decision: Decision,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if self.capacity == 0 {
            return Ok(());
        }

        let mut guard = self.inner.lock().expect("poisoned lock");
        guard.entries.insert(
            key.clone(),
            DecisionEntry {
                decision,
                created_at: Instant::now(),
                ttl,
            },
        );
        Self::touch(&mut guard, &key);
        Self::evict_if_needed(&mut guard, self.capacity);
        Ok(())
    }

    async fn invalidate_principal(
        &self,
        gateway: &GatewayId,
        principal: &PrincipalId,
    ) -> Result<(), CacheError> {
        let mut guard = self.inner.lock().expect("poisoned lock");
        let state = &mut *guard;
        state
            .entries
            .retain(|key, _| !(key.gateway() == gateway && key.principal() == principal));
        state.order.retain(|key| state.entries.contains_key(key));
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut guard = self.inner.lock().expect("poisoned lock");
        guard.entries.clear();
        guard.order.clear();
        Ok(())
    }
}
