//! Cache-aside orchestration for entity keys.
//!
//! [`KeyCache::read_many`] is the batched get/fetch/prime protocol:
//! one batched cache read, then, depending on how many keys hit,
//! a full-hit return, a full fetch, or partial-hit reconciliation
//! that fetches only the missing keys, merges, and primes the cache.
//! Result order always matches input key order, regardless of the
//! order the cache or the fetch operation returns.
//!
//! There is no single-flight de-duplication: two overlapping calls
//! that both miss will both invoke the fetch operation and both write
//! to cache. Known limitation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use strata_core::{
    FetchError, Key, KeyedEntity, StoreError, StrataConfig, StrataError, StrataResult,
};

use crate::dispatcher::{CacheDispatcher, Cached};
use crate::fingerprint::{key_fingerprint, FingerprintOptions};
use crate::ttl::{self, CallOptions, DataKind};
use crate::CacheEntity;

/// Caller-supplied fetch operation for entity keys.
///
/// The datastore client implements this; a call site that "omits" the
/// fetch operation passes the client itself. A fetch for a single key
/// that resolves to nothing reports [`FetchError::NotFound`]; the
/// orchestrator converts that into a negative cache entry during
/// partial-hit reconciliation and propagates it everywhere else.
#[async_trait]
pub trait EntityFetcher<E: CacheEntity>: Send + Sync {
    /// Fetch the authoritative entities for the given keys, in any order.
    async fn fetch_entities(&self, keys: &[Key]) -> Result<Vec<KeyedEntity<E>>, FetchError>;
}

/// Keyed-entity orchestrator view over a configured cache layer.
pub struct KeyCache<'a> {
    config: &'a StrataConfig,
    dispatcher: Option<&'a Arc<dyn CacheDispatcher>>,
}

impl<'a> KeyCache<'a> {
    pub(crate) fn new(
        config: &'a StrataConfig,
        dispatcher: Option<&'a Arc<dyn CacheDispatcher>>,
    ) -> Self {
        Self { config, dispatcher }
    }

    /// Prefixed cache fingerprint for one key.
    pub fn fingerprint(&self, key: &Key) -> StrataResult<String> {
        let fp = key_fingerprint(key, &FingerprintOptions::default())?;
        Ok(format!("{}{}", self.config.prefixes.keys, fp))
    }

    /// Whether this call skips the cache entirely.
    fn bypassed(&self, options: &CallOptions) -> bool {
        self.dispatcher.is_none()
            || options.cache == Some(false)
            || (!self.config.global && options.cache != Some(true))
    }

    /// Read one key through the cache, falling back to the fetcher.
    ///
    /// Returns `None` when the key is confirmed absent (negative
    /// entry). A `NotFound` from the fetcher on a cold cache
    /// propagates as an error, matching the multi-key miss path.
    pub async fn read_one<E, F>(
        &self,
        key: &Key,
        fetcher: &F,
        options: &CallOptions,
    ) -> StrataResult<Option<KeyedEntity<E>>>
    where
        E: CacheEntity,
        F: EntityFetcher<E>,
    {
        let mut results = self.read_many(std::slice::from_ref(key), fetcher, options).await?;
        Ok(results.pop().flatten())
    }

    /// Read a batch of keys through the cache, falling back to the
    /// fetcher for whatever portion misses.
    ///
    /// The result has the same length and order as `keys`, with `None`
    /// where an entity is confirmed absent.
    pub async fn read_many<E, F>(
        &self,
        keys: &[Key],
        fetcher: &F,
        options: &CallOptions,
    ) -> StrataResult<Vec<Option<KeyedEntity<E>>>>
    where
        E: CacheEntity,
        F: EntityFetcher<E>,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let dispatcher = match self.dispatcher {
            Some(dispatcher) if !self.bypassed(options) => dispatcher,
            _ => {
                tracing::debug!(count = keys.len(), "key read bypassing cache");
                let fetched = fetcher
                    .fetch_entities(keys)
                    .await
                    .map_err(StrataError::Fetch)?;
                return self.order_entities(fetched, keys);
            }
        };

        let fingerprints = keys
            .iter()
            .map(|key| self.fingerprint(key))
            .collect::<StrataResult<Vec<_>>>()?;

        let raw = dispatcher.mget(&fingerprints).await?;
        let hits = raw.iter().filter(|entry| entry.is_some()).count();
        let ttl = ttl::resolve(DataKind::Keys, options, self.config);

        if hits == keys.len() {
            tracing::debug!(count = keys.len(), "key read full hit");
            return raw
                .iter()
                .zip(keys)
                .zip(&fingerprints)
                .map(|((entry, key), fp)| match entry {
                    Some(value) => decode_entry(fp, key, value),
                    None => Ok(None),
                })
                .collect();
        }

        if hits == 0 {
            tracing::debug!(count = keys.len(), "key read full miss");
            let fetched = fetcher
                .fetch_entities(keys)
                .await
                .map_err(StrataError::Fetch)?;
            let ordered = self.order_entities(fetched, keys)?;

            let pairs = encode_present(&fingerprints, &ordered)?;
            dispatcher.mset(&pairs, &ttl).await?;
            return Ok(ordered);
        }

        // Partial hit: reconcile cached entries with a fetch of the
        // missing keys only. The map holds None for negative entries.
        tracing::debug!(hits, count = keys.len(), "key read partial hit");
        let mut merged: HashMap<String, Option<KeyedEntity<E>>> = HashMap::new();
        for ((entry, key), fp) in raw.iter().zip(keys).zip(&fingerprints) {
            if let Some(value) = entry {
                merged.insert(fp.clone(), decode_entry(fp, key, value)?);
            }
        }

        let mut missing_keys = Vec::new();
        let mut missing_fps = Vec::new();
        for (key, fp) in keys.iter().zip(&fingerprints) {
            if !merged.contains_key(fp) {
                missing_keys.push(key.clone());
                missing_fps.push(fp.clone());
            }
        }

        match fetcher.fetch_entities(&missing_keys).await {
            Ok(fetched) => {
                let ordered = self.order_entities(fetched, &missing_keys)?;
                let pairs = encode_present(&missing_fps, &ordered)?;
                for (fp, entity) in missing_fps.iter().zip(ordered) {
                    if entity.is_some() {
                        merged.insert(fp.clone(), entity);
                    }
                }
                dispatcher.mset(&pairs, &ttl).await?;
            }
            Err(FetchError::NotFound) if missing_keys.len() == 1 => {
                // Confirmed absent: store a negative entry so the next
                // identical call is served without refetching.
                merged.insert(missing_fps[0].clone(), None);
                dispatcher.set(&missing_fps[0], Value::Null, &ttl).await?;
            }
            Err(err) => return Err(StrataError::Fetch(err)),
        }

        Ok(fingerprints
            .iter()
            .map(|fp| merged.get(fp).cloned().flatten())
            .collect())
    }

    /// Re-order fetched entities to match the order of `keys`, keyed
    /// by fingerprint. The underlying data source is not required to
    /// preserve order. A key appearing more than once in the batch
    /// resolves to its entity at every position.
    fn order_entities<E: CacheEntity>(
        &self,
        fetched: Vec<KeyedEntity<E>>,
        keys: &[Key],
    ) -> StrataResult<Vec<Option<KeyedEntity<E>>>> {
        let mut by_fingerprint: HashMap<String, KeyedEntity<E>> = HashMap::new();
        for entity in fetched {
            let fp = self.fingerprint(&entity.key)?;
            by_fingerprint.insert(fp, entity);
        }
        keys.iter()
            .map(|key| Ok(by_fingerprint.get(&self.fingerprint(key)?).cloned()))
            .collect()
    }

    /// Cache-direct read of one key. No fetch fallback.
    pub async fn get_one<E: CacheEntity>(&self, key: &Key) -> StrataResult<Cached<KeyedEntity<E>>> {
        let mut results = self.get_many(std::slice::from_ref(key)).await?;
        Ok(results.pop().unwrap_or(Cached::Miss))
    }

    /// Cache-direct read of a batch of keys. No fetch fallback.
    pub async fn get_many<E: CacheEntity>(
        &self,
        keys: &[Key],
    ) -> StrataResult<Vec<Cached<KeyedEntity<E>>>> {
        let Some(dispatcher) = self.dispatcher else {
            return Ok(keys.iter().map(|_| Cached::Miss).collect());
        };
        let fingerprints = keys
            .iter()
            .map(|key| self.fingerprint(key))
            .collect::<StrataResult<Vec<_>>>()?;
        let raw = dispatcher.mget(&fingerprints).await?;

        raw.iter()
            .zip(keys)
            .zip(&fingerprints)
            .map(|((entry, key), fp)| {
                Ok(match entry {
                    None => Cached::Miss,
                    Some(value) => match decode_entry(fp, key, value)? {
                        Some(entity) => Cached::Hit(entity),
                        None => Cached::Negative,
                    },
                })
            })
            .collect()
    }

    /// Write one key/entity pair with the resolved TTL.
    pub async fn put_one<E: CacheEntity>(
        &self,
        key: &Key,
        entity: &E,
        options: &CallOptions,
    ) -> StrataResult<()> {
        let pair = [(key.clone(), entity.clone())];
        self.put_many(&pair, options).await
    }

    /// Write a batch of key/entity pairs with one resolved TTL.
    pub async fn put_many<E: CacheEntity>(
        &self,
        pairs: &[(Key, E)],
        options: &CallOptions,
    ) -> StrataResult<()> {
        let Some(dispatcher) = self.dispatcher else {
            return Ok(());
        };
        let ttl = ttl::resolve(DataKind::Keys, options, self.config);
        let encoded = pairs
            .iter()
            .map(|(key, entity)| {
                let fp = self.fingerprint(key)?;
                let value = encode_entity(&fp, entity)?;
                Ok((fp, value))
            })
            .collect::<StrataResult<Vec<_>>>()?;
        dispatcher.mset(&encoded, &ttl).await?;
        Ok(())
    }

    /// Delete the cache entries for the given keys.
    pub async fn delete(&self, keys: &[Key]) -> StrataResult<()> {
        let Some(dispatcher) = self.dispatcher else {
            return Ok(());
        };
        let fingerprints = keys
            .iter()
            .map(|key| self.fingerprint(key))
            .collect::<StrataResult<Vec<_>>>()?;
        dispatcher.del(&fingerprints).await?;
        Ok(())
    }
}

/// Decode one raw cache entry, attaching the request key. A stored
/// JSON `null` decodes to `None` (negative entry).
fn decode_entry<E: CacheEntity>(
    fingerprint: &str,
    key: &Key,
    value: &Value,
) -> StrataResult<Option<KeyedEntity<E>>> {
    if value.is_null() {
        return Ok(None);
    }
    let entity: E = serde_json::from_value(value.clone()).map_err(|e| {
        StrataError::Store(StoreError::DecodeFailed {
            fingerprint: fingerprint.to_string(),
            reason: e.to_string(),
        })
    })?;
    Ok(Some(KeyedEntity::new(key.clone(), entity)))
}

/// Encode the entity half of each present pair for a batch write.
fn encode_present<E: CacheEntity>(
    fingerprints: &[String],
    ordered: &[Option<KeyedEntity<E>>],
) -> StrataResult<Vec<(String, Value)>> {
    fingerprints
        .iter()
        .zip(ordered)
        .filter_map(|(fp, entry)| {
            entry
                .as_ref()
                .map(|entity| Ok((fp.clone(), encode_entity(fp, &entity.entity)?)))
        })
        .collect()
}

fn encode_entity<E: CacheEntity>(fingerprint: &str, entity: &E) -> StrataResult<Value> {
    serde_json::to_value(entity).map_err(|e| {
        StrataError::Store(StoreError::EncodeFailed {
            fingerprint: fingerprint.to_string(),
            reason: e.to_string(),
        })
    })
}
