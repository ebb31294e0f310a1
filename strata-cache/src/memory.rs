//! In-memory reference implementations of the backing-store traits.
//!
//! One bounded FIFO tier per configured [`TierConfig`], plus a set
//! store sharing storage with the set-capable tier so index-backed
//! writes are visible to ordinary dispatcher reads. These exist for
//! tests, examples, and single-process deployments; production
//! deployments put a real multi-tier dispatcher behind the traits.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use strata_core::{StoreError, StrataConfig, TierConfig};

use crate::dispatcher::{CacheDispatcher, SetCommand, SetReply, SetStore};
use crate::ttl::Ttl;

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        self.expires_at.map(|at| Instant::now() < at).unwrap_or(true)
    }
}

/// Storage shared between a tier and, for the set-capable tier, the
/// set store layered over it.
#[derive(Default)]
struct TierState {
    entries: RwLock<HashMap<String, Entry>>,
    order: Mutex<VecDeque<String>>,
}

impl TierState {
    fn read(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if entry.is_fresh() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Stale entry: drop it so unbounded tiers do not accumulate
        // dead keys. Re-checked under the write lock since a writer
        // may have replaced it in between. The stale name stays in
        // `order` until eviction pops it, which tolerates misses.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(key) {
            if !entry.is_fresh() {
                entries.remove(key);
            }
        }
        None
    }

    /// Write with a TTL in seconds; `0` means no expiry, negative
    /// writes are dropped.
    fn write(&self, key: &str, value: Value, ttl_seconds: i64, max_entries: Option<usize>) {
        if ttl_seconds < 0 {
            return;
        }
        let expires_at = if ttl_seconds == 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_secs(ttl_seconds as u64))
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(key) {
            if let Some(max) = max_entries {
                while entries.len() >= max {
                    match order.pop_front() {
                        Some(oldest) => {
                            entries.remove(&oldest);
                        }
                        None => break,
                    }
                }
            }
            order.push_back(key.to_string());
        }
        entries.insert(key.to_string(), Entry { value, expires_at });
    }

    fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

struct MemoryTier {
    name: String,
    max_entries: Option<usize>,
    state: Arc<TierState>,
}

/// Multi-tier in-memory cache dispatcher.
pub struct MemoryDispatcher {
    tiers: Vec<MemoryTier>,
    set_store: Option<Arc<MemorySetStore>>,
}

impl MemoryDispatcher {
    /// Build one in-memory tier per configured tier, layering a
    /// [`MemorySetStore`] over the first set-capable one.
    pub fn from_config(config: &StrataConfig) -> Self {
        let tiers: Vec<MemoryTier> = config
            .tiers
            .iter()
            .map(|tier| MemoryTier {
                name: tier.name.clone(),
                max_entries: tier.max_entries,
                state: Arc::new(TierState::default()),
            })
            .collect();

        let set_store = config
            .tiers
            .iter()
            .position(|tier| tier.set_capable)
            .map(|index| {
                Arc::new(MemorySetStore {
                    state: Arc::clone(&tiers[index].state),
                    sets: RwLock::new(HashMap::new()),
                    exec_lock: Mutex::new(()),
                })
            });

        Self { tiers, set_store }
    }

    /// A single bounded memory tier, no set support.
    pub fn bounded(max_entries: usize) -> Self {
        Self::from_config(&StrataConfig::new().with_tiers(vec![TierConfig::memory(max_entries)]))
    }
}

#[async_trait]
impl CacheDispatcher for MemoryDispatcher {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        for tier in &self.tiers {
            if let Some(value) = tier.state.read(key) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>, StoreError> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    async fn set(&self, key: &str, value: Value, ttl: &Ttl) -> Result<(), StoreError> {
        for tier in &self.tiers {
            if let Some(seconds) = ttl.for_tier(&tier.name) {
                tier.state.write(key, value.clone(), seconds, tier.max_entries);
            }
        }
        Ok(())
    }

    async fn mset(&self, pairs: &[(String, Value)], ttl: &Ttl) -> Result<(), StoreError> {
        for (key, value) in pairs {
            self.set(key, value.clone(), ttl).await?;
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            for tier in &self.tiers {
                tier.state.remove(key);
            }
        }
        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        for tier in &self.tiers {
            tier.state.clear();
        }
        if let Some(set_store) = &self.set_store {
            set_store
                .sets
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        Ok(())
    }

    fn set_store(&self) -> Option<Arc<dyn SetStore>> {
        self.set_store
            .as_ref()
            .map(|store| Arc::clone(store) as Arc<dyn SetStore>)
    }
}

/// Set store sharing value storage with a set-capable memory tier.
pub struct MemorySetStore {
    state: Arc<TierState>,
    sets: RwLock<HashMap<String, BTreeSet<String>>>,
    /// Serializes exec batches; the atomicity contract of a
    /// multi-command store.
    exec_lock: Mutex<()>,
}

#[async_trait]
impl SetStore for MemorySetStore {
    async fn exec(&self, commands: Vec<SetCommand>) -> Result<Vec<SetReply>, StoreError> {
        let _batch = self.exec_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            match command {
                SetCommand::AddToSet { set, member } => {
                    self.sets
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(set)
                        .or_default()
                        .insert(member);
                    replies.push(SetReply::Done);
                }
                SetCommand::SetValue { key, value } => {
                    // No expiry; retention is controlled by invalidation.
                    self.state.write(&key, value, 0, None);
                    replies.push(SetReply::Done);
                }
                SetCommand::ReadMembers { set } => {
                    let members = self
                        .sets
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .get(&set)
                        .map(|members| members.iter().cloned().collect())
                        .unwrap_or_default();
                    replies.push(SetReply::Members(members));
                }
                SetCommand::Delete { keys } => {
                    let mut deleted = 0u64;
                    let mut sets = self.sets.write().unwrap_or_else(PoisonError::into_inner);
                    for key in keys {
                        let mut hit = self.state.remove(&key);
                        hit |= sets.remove(&key).is_some();
                        if hit {
                            deleted += 1;
                        }
                    }
                    replies.push(SetReply::Deleted(deleted));
                }
            }
        }
        Ok(replies)
    }
}
