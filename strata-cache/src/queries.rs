//! Cache-aside orchestration for queries.
//!
//! A query is cached as one opaque result under its fingerprint. The
//! write path splits two ways: ordinary results go through the
//! dispatcher with the resolved TTL, while results whose TTL maps the
//! set-capable tier to no-expiry are stored through the set store and
//! registered in the entity-kind invalidation index, living until
//! [`QueryCache::invalidate`] drops their kinds.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future;
use serde_json::Value;
use strata_core::{FetchError, Query, QueryResult, StrataConfig, StrataError, StrataResult};

use crate::codec;
use crate::dispatcher::{CacheDispatcher, SetStore};
use crate::fingerprint::query_fingerprint;
use crate::kind_index::KindIndex;
use crate::ttl::{self, CallOptions, DataKind, Ttl};
use crate::CacheEntity;

/// Caller-supplied query execution, typically the datastore client.
#[async_trait]
pub trait QueryRunner<E: CacheEntity>: Send + Sync {
    /// Run the query against the authoritative data source.
    async fn run_query(&self, query: &Query) -> Result<QueryResult<E>, FetchError>;
}

/// Query orchestrator view over a configured cache layer.
pub struct QueryCache<'a> {
    config: &'a StrataConfig,
    dispatcher: Option<&'a Arc<dyn CacheDispatcher>>,
    set_store: Option<&'a Arc<dyn SetStore>>,
}

impl<'a> QueryCache<'a> {
    pub(crate) fn new(
        config: &'a StrataConfig,
        dispatcher: Option<&'a Arc<dyn CacheDispatcher>>,
        set_store: Option<&'a Arc<dyn SetStore>>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            set_store,
        }
    }

    /// Prefixed cache fingerprint for one query.
    pub fn fingerprint(&self, query: &Query) -> StrataResult<String> {
        let fp = query_fingerprint(query, &Default::default())?;
        Ok(format!("{}{}", self.config.prefixes.queries, fp))
    }

    fn kind_index(&self) -> KindIndex<'_> {
        KindIndex::new(&self.config.prefixes.queries, self.set_store)
    }

    /// Whether this call skips the cache entirely. A resolved TTL of
    /// `-1` disables caching for queries.
    fn bypassed(&self, options: &CallOptions, ttl: &Ttl) -> bool {
        self.dispatcher.is_none()
            || ttl.is_disabled()
            || options.cache == Some(false)
            || (!self.config.global && options.cache != Some(true))
    }

    /// Whether a result written under `ttl` goes through the
    /// invalidation index instead of expiring on its own.
    fn index_backed(&self, ttl: &Ttl) -> bool {
        if self.set_store.is_none() {
            return false;
        }
        match (self.config.set_capable_tier(), ttl) {
            (Some(tier), Ttl::PerTier(map)) => map.get(&tier.name) == Some(&0),
            _ => false,
        }
    }

    /// Run a query through the cache, falling back to the runner on a
    /// miss and priming the cache with its result.
    pub async fn run<E, R>(
        &self,
        query: &Query,
        runner: &R,
        options: &CallOptions,
    ) -> StrataResult<QueryResult<E>>
    where
        E: CacheEntity,
        R: QueryRunner<E>,
    {
        let ttl = ttl::resolve(DataKind::Queries, options, self.config);
        let dispatcher = match self.dispatcher {
            Some(dispatcher) if !self.bypassed(options, &ttl) => dispatcher,
            _ => {
                tracing::debug!("query bypassing cache");
                return runner.run_query(query).await.map_err(StrataError::Fetch);
            }
        };

        let fingerprint = self.fingerprint(query)?;
        if let Some(value) = dispatcher.get(&fingerprint).await? {
            tracing::debug!(fingerprint, "query hit");
            return Ok(codec::decode(&fingerprint, &value)?);
        }

        tracing::debug!(fingerprint, "query miss");
        let result = runner.run_query(query).await.map_err(StrataError::Fetch)?;
        let encoded = codec::encode(&fingerprint, &result)?;
        self.write(dispatcher, &fingerprint, encoded, &query.kinds, &ttl)
            .await?;
        Ok(result)
    }

    /// Write one encoded result down the path its TTL selects.
    async fn write(
        &self,
        dispatcher: &Arc<dyn CacheDispatcher>,
        fingerprint: &str,
        encoded: Value,
        kinds: &[String],
        ttl: &Ttl,
    ) -> StrataResult<()> {
        if self.index_backed(ttl) {
            self.kind_index()
                .register(fingerprint, encoded, kinds)
                .await?;
        } else {
            dispatcher.set(fingerprint, encoded, ttl).await?;
        }
        Ok(())
    }

    /// Cache-direct read of one query's result. No runner fallback.
    pub async fn get_one<E: CacheEntity>(
        &self,
        query: &Query,
    ) -> StrataResult<Option<QueryResult<E>>> {
        let mut results = self.get_many(std::slice::from_ref(query)).await?;
        Ok(results.pop().flatten())
    }

    /// Cache-direct read of a batch of queries. No runner fallback.
    pub async fn get_many<E: CacheEntity>(
        &self,
        queries: &[Query],
    ) -> StrataResult<Vec<Option<QueryResult<E>>>> {
        let Some(dispatcher) = self.dispatcher else {
            return Ok(queries.iter().map(|_| None).collect());
        };
        let fingerprints = queries
            .iter()
            .map(|query| self.fingerprint(query))
            .collect::<StrataResult<Vec<_>>>()?;
        let raw = dispatcher.mget(&fingerprints).await?;

        raw.iter()
            .zip(&fingerprints)
            .map(|(entry, fp)| match entry {
                Some(value) => Ok(Some(codec::decode(fp, value)?)),
                None => Ok(None),
            })
            .collect()
    }

    /// Write one query's result with the resolved TTL.
    pub async fn put_one<E: CacheEntity>(
        &self,
        query: &Query,
        result: &QueryResult<E>,
        options: &CallOptions,
    ) -> StrataResult<()> {
        let pair = [(query.clone(), result.clone())];
        self.put_many(&pair, options).await
    }

    /// Write a batch of query/result pairs. Each pair takes the write
    /// path its own query's kinds select under the one resolved TTL.
    pub async fn put_many<E: CacheEntity>(
        &self,
        pairs: &[(Query, QueryResult<E>)],
        options: &CallOptions,
    ) -> StrataResult<()> {
        let Some(dispatcher) = self.dispatcher else {
            return Ok(());
        };
        let ttl = ttl::resolve(DataKind::Queries, options, self.config);
        if ttl.is_disabled() {
            return Ok(());
        }
        let encoded = pairs
            .iter()
            .map(|(query, result)| {
                let fingerprint = self.fingerprint(query)?;
                let value = codec::encode(&fingerprint, result)?;
                Ok((fingerprint, value, query))
            })
            .collect::<StrataResult<Vec<_>>>()?;
        future::try_join_all(encoded.into_iter().map(|(fingerprint, value, query)| {
            let ttl = ttl.clone();
            async move {
                self.write(dispatcher, &fingerprint, value, &query.kinds, &ttl)
                    .await
            }
        }))
        .await?;
        Ok(())
    }

    /// Delete the cache entries for the given queries.
    pub async fn delete(&self, queries: &[Query]) -> StrataResult<()> {
        let Some(dispatcher) = self.dispatcher else {
            return Ok(());
        };
        let fingerprints = queries
            .iter()
            .map(|query| self.fingerprint(query))
            .collect::<StrataResult<Vec<_>>>()?;
        dispatcher.del(&fingerprints).await?;
        Ok(())
    }

    /// Drop every index-backed query registered under any of the given
    /// kinds. Returns the number of keys deleted.
    pub async fn invalidate(&self, kinds: &[String]) -> StrataResult<u64> {
        Ok(self.kind_index().invalidate(kinds).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDispatcher;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_core::{Key, KeyedEntity, PageInfo, TierConfig, TierTtl};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        title: String,
    }

    struct MockRunner {
        result: QueryResult<Post>,
        calls: AtomicUsize,
    }

    impl MockRunner {
        fn new(result: QueryResult<Post>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryRunner<Post> for MockRunner {
        async fn run_query(&self, _query: &Query) -> Result<QueryResult<Post>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn sample_result() -> QueryResult<Post> {
        QueryResult::new(
            vec![KeyedEntity::new(
                Key::new("Post", 1),
                Post { title: "hello".into() },
            )],
            PageInfo::default(),
        )
    }

    fn sample_query() -> Query {
        Query::new("Post").filter(strata_core::Filter::eq("author", "alice"))
    }

    fn simple_setup() -> (StrataConfig, Arc<dyn CacheDispatcher>) {
        let config = StrataConfig::default();
        let dispatcher: Arc<dyn CacheDispatcher> =
            Arc::new(MemoryDispatcher::from_config(&config));
        (config, dispatcher)
    }

    /// Two tiers with the set-capable one mapped to no-expiry for
    /// queries, which selects the index-backed write path.
    fn indexed_setup() -> (StrataConfig, Arc<dyn CacheDispatcher>, Arc<dyn SetStore>) {
        let config = StrataConfig::new()
            .with_tiers(vec![TierConfig::memory(100), TierConfig::set_capable("remote")])
            .with_tier_ttl("memory", TierTtl { keys: 300, queries: 60 })
            .with_tier_ttl("remote", TierTtl { keys: 86_400, queries: 0 });
        let dispatcher = Arc::new(MemoryDispatcher::from_config(&config));
        let store = dispatcher.set_store().unwrap();
        (config, dispatcher as Arc<dyn CacheDispatcher>, store)
    }

    #[tokio::test]
    async fn test_miss_runs_and_primes() {
        let (config, dispatcher) = simple_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), None);
        let runner = MockRunner::new(sample_result());
        let query = sample_query();

        let first = cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        let second = cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, sample_result());
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_different_filters_cache_separately() {
        let (config, dispatcher) = simple_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), None);
        let runner = MockRunner::new(sample_result());

        let by_alice = Query::new("Post").filter(strata_core::Filter::eq("author", "alice"));
        let by_bob = Query::new("Post").filter(strata_core::Filter::eq("author", "bob"));
        cache.run(&by_alice, &runner, &CallOptions::new()).await.unwrap();
        cache.run(&by_bob, &runner, &CallOptions::new()).await.unwrap();
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_disabled_ttl_bypasses() {
        let (config, dispatcher) = simple_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), None);
        let runner = MockRunner::new(sample_result());
        let query = sample_query();
        let options = CallOptions::new().with_ttl(strata_core::TTL_DISABLED);

        cache.run(&query, &runner, &options).await.unwrap();
        cache.run(&query, &runner, &options).await.unwrap();
        assert_eq!(runner.call_count(), 2);
        assert!(cache.get_one::<Post>(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_opt_out_bypasses() {
        let (config, dispatcher) = simple_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), None);
        let runner = MockRunner::new(sample_result());
        let query = sample_query();

        cache
            .run(&query, &runner, &CallOptions::new().with_cache(false))
            .await
            .unwrap();
        assert!(cache.get_one::<Post>(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_dispatcher_always_runs() {
        let config = StrataConfig::default();
        let cache = QueryCache::new(&config, None, None);
        let runner = MockRunner::new(sample_result());
        let query = sample_query();

        cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_index_backed_write_survives_until_invalidation() {
        let (config, dispatcher, store) = indexed_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), Some(&store));
        let runner = MockRunner::new(sample_result());
        let query = sample_query();

        cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        assert_eq!(runner.call_count(), 1);

        let deleted = cache.invalidate(&["Post".to_string()]).await.unwrap();
        // The query entry plus the kind's index set.
        assert_eq!(deleted, 2);

        cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_ignores_other_kinds() {
        let (config, dispatcher, store) = indexed_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), Some(&store));
        let runner = MockRunner::new(sample_result());
        let query = sample_query();

        cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        cache.invalidate(&["User".to_string()]).await.unwrap();
        cache.run(&query, &runner, &CallOptions::new()).await.unwrap();
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scalar_override_skips_index_path() {
        let (config, dispatcher, store) = indexed_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), Some(&store));
        let runner = MockRunner::new(sample_result());
        let query = sample_query();

        // A scalar call-site TTL expires on its own, so the entry is
        // not registered in the kind index.
        cache
            .run(&query, &runner, &CallOptions::new().with_ttl(60))
            .await
            .unwrap();
        let deleted = cache.invalidate(&["Post".to_string()]).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn test_put_and_get_direct() {
        let (config, dispatcher) = simple_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), None);
        let query = sample_query();

        assert!(cache.get_one::<Post>(&query).await.unwrap().is_none());
        cache
            .put_one(&query, &sample_result(), &CallOptions::new())
            .await
            .unwrap();
        assert_eq!(
            cache.get_one::<Post>(&query).await.unwrap(),
            Some(sample_result())
        );

        cache.delete(std::slice::from_ref(&query)).await.unwrap();
        assert!(cache.get_one::<Post>(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_without_set_store_errors() {
        let (config, dispatcher) = simple_setup();
        let cache = QueryCache::new(&config, Some(&dispatcher), None);
        let err = cache.invalidate(&["Post".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            StrataError::Store(strata_core::StoreError::NoBackingStore)
        ));
    }
}
