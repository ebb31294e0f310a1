//! Read-through caching layer for keyed entities and queries.
//!
//! [`Strata`] is the entry point: it holds the configuration, an
//! optional [`CacheDispatcher`] (the pluggable tiered store), and the
//! set store auto-detected from the dispatcher. The [`KeyCache`] and
//! [`QueryCache`] views it hands out implement the orchestration:
//! deterministic fingerprints, TTL resolution, batched
//! get/fetch/prime reconciliation with negative caching, and
//! entity-kind invalidation for index-backed query results.
//!
//! ```no_run
//! use strata_cache::Strata;
//! use strata_core::StrataConfig;
//!
//! # fn demo(dispatcher: std::sync::Arc<dyn strata_cache::CacheDispatcher>) {
//! let strata = Strata::new(StrataConfig::default(), dispatcher);
//! let _keys = strata.keys();
//! # }
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use strata_core::{StrataConfig, StrataResult};

pub mod codec;
pub mod dispatcher;
pub mod fingerprint;
pub mod keys;
pub mod kind_index;
pub mod memory;
pub mod queries;
pub mod ttl;

pub use dispatcher::{CacheDispatcher, Cached, SetCommand, SetReply, SetStore};
pub use fingerprint::{key_fingerprint, query_fingerprint, FingerprintOptions};
pub use keys::{EntityFetcher, KeyCache};
pub use kind_index::KindIndex;
pub use memory::MemoryDispatcher;
pub use queries::{QueryCache, QueryRunner};
pub use ttl::{CallOptions, DataKind, Ttl};

/// Marker for values that can move through the cache layer.
///
/// Blanket-implemented; any clonable serde type qualifies.
pub trait CacheEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheEntity for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// The caching layer: configuration plus backing stores.
///
/// Construction is complete once `new` returns; there is no separate
/// ready signal. Without a dispatcher every orchestrated read degrades
/// to a plain fetch and the cache-direct surface reports misses.
pub struct Strata {
    config: StrataConfig,
    dispatcher: Option<Arc<dyn CacheDispatcher>>,
    set_store: Option<Arc<dyn SetStore>>,
}

impl Strata {
    /// Build the layer over a dispatcher, auto-detecting its set
    /// store for index-backed query caching.
    pub fn new(config: StrataConfig, dispatcher: Arc<dyn CacheDispatcher>) -> Self {
        let set_store = dispatcher.set_store();
        if set_store.is_some() {
            tracing::info!("set-capable store detected, index-backed query caching enabled");
        }
        Self {
            config,
            dispatcher: Some(dispatcher),
            set_store,
        }
    }

    /// Build the layer with no backing store at all. Orchestrated
    /// reads always fall through to the fetcher.
    pub fn without_dispatcher(config: StrataConfig) -> Self {
        Self {
            config,
            dispatcher: None,
            set_store: None,
        }
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    /// The keyed-entity orchestrator view.
    pub fn keys(&self) -> KeyCache<'_> {
        KeyCache::new(&self.config, self.dispatcher.as_ref())
    }

    /// The query orchestrator view.
    pub fn queries(&self) -> QueryCache<'_> {
        QueryCache::new(
            &self.config,
            self.dispatcher.as_ref(),
            self.set_store.as_ref(),
        )
    }

    /// Raw read of one fingerprint. `None` without a dispatcher.
    pub async fn get(&self, key: &str) -> StrataResult<Option<Value>> {
        match &self.dispatcher {
            Some(dispatcher) => Ok(dispatcher.get(key).await?),
            None => Ok(None),
        }
    }

    /// Raw batched read. All-miss without a dispatcher.
    pub async fn mget(&self, keys: &[String]) -> StrataResult<Vec<Option<Value>>> {
        match &self.dispatcher {
            Some(dispatcher) => Ok(dispatcher.mget(keys).await?),
            None => Ok(keys.iter().map(|_| None).collect()),
        }
    }

    /// Raw write of one fingerprint. No-op without a dispatcher.
    pub async fn set(&self, key: &str, value: Value, ttl: &Ttl) -> StrataResult<()> {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.set(key, value, ttl).await?;
        }
        Ok(())
    }

    /// Raw batched write. No-op without a dispatcher.
    pub async fn mset(&self, pairs: &[(String, Value)], ttl: &Ttl) -> StrataResult<()> {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.mset(pairs, ttl).await?;
        }
        Ok(())
    }

    /// Raw delete. No-op without a dispatcher.
    pub async fn del(&self, keys: &[String]) -> StrataResult<()> {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.del(keys).await?;
        }
        Ok(())
    }

    /// Drop every entry in every tier. No-op without a dispatcher.
    pub async fn reset(&self) -> StrataResult<()> {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.reset().await?;
        }
        Ok(())
    }
}
