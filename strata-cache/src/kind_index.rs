//! Entity-kind invalidation index.
//!
//! Every query cached on the set-capable tier is registered under the
//! entity kinds it touches: one set per kind, named by the queries
//! prefix plus the kind, holding the fingerprints of all registered
//! queries. Invalidation reads those sets, deduplicates, and deletes
//! the fingerprints together with the index sets themselves in one
//! batch, so a kind whose data changed drops every query that could
//! have observed it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use strata_core::StoreError;

use crate::dispatcher::{SetCommand, SetReply, SetStore};

/// Invalidation index over a set-capable store.
pub struct KindIndex<'a> {
    prefix: &'a str,
    store: Option<&'a Arc<dyn SetStore>>,
}

impl<'a> KindIndex<'a> {
    pub(crate) fn new(prefix: &'a str, store: Option<&'a Arc<dyn SetStore>>) -> Self {
        Self { prefix, store }
    }

    /// Name of the index set for one entity kind.
    pub fn set_name(&self, kind: &str) -> String {
        format!("{}{}", self.prefix, kind)
    }

    /// Register a query fingerprint under its kinds and store the
    /// encoded result, all in one atomic batch.
    ///
    /// The stored value never expires on its own; it lives until
    /// [`KindIndex::invalidate`] is called for one of its kinds. At
    /// least one kind is required, otherwise the never-expiring entry
    /// would be unreachable by any invalidation.
    pub async fn register(
        &self,
        fingerprint: &str,
        value: Value,
        kinds: &[String],
    ) -> Result<(), StoreError> {
        let store = self.store.ok_or(StoreError::NoBackingStore)?;
        if kinds.is_empty() {
            return Err(StoreError::OperationFailed {
                op: "register".to_string(),
                reason: "no entity kinds to index under".to_string(),
            });
        }

        let mut commands = Vec::with_capacity(kinds.len() + 1);
        for kind in kinds {
            commands.push(SetCommand::AddToSet {
                set: self.set_name(kind),
                member: fingerprint.to_string(),
            });
        }
        commands.push(SetCommand::SetValue {
            key: fingerprint.to_string(),
            value,
        });

        tracing::debug!(fingerprint, kinds = ?kinds, "registering query in kind index");
        store.exec(commands).await?;
        Ok(())
    }

    /// Drop every query registered under any of the given kinds.
    ///
    /// Returns the number of keys deleted (deduplicated fingerprints
    /// plus the index sets themselves). The count is informational:
    /// fingerprints already evicted by other means are not re-counted.
    pub async fn invalidate(&self, kinds: &[String]) -> Result<u64, StoreError> {
        let store = self.store.ok_or(StoreError::NoBackingStore)?;
        if kinds.is_empty() {
            return Ok(0);
        }

        let reads = kinds
            .iter()
            .map(|kind| SetCommand::ReadMembers {
                set: self.set_name(kind),
            })
            .collect();
        let replies = store.exec(reads).await?;

        // Fingerprints may appear in more than one kind's set.
        let mut doomed = BTreeSet::new();
        for reply in replies {
            match reply {
                SetReply::Members(members) => doomed.extend(members),
                _ => {
                    return Err(StoreError::UnexpectedReply {
                        op: "smembers".to_string(),
                    })
                }
            }
        }
        for kind in kinds {
            doomed.insert(self.set_name(kind));
        }

        let replies = store
            .exec(vec![SetCommand::Delete {
                keys: doomed.into_iter().collect(),
            }])
            .await?;
        match replies.first() {
            Some(SetReply::Deleted(count)) => {
                tracing::debug!(kinds = ?kinds, deleted = count, "invalidated kinds");
                Ok(*count)
            }
            _ => Err(StoreError::UnexpectedReply {
                op: "del".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::CacheDispatcher;
    use crate::memory::MemoryDispatcher;
    use serde_json::json;
    use strata_core::StrataConfig;

    fn setup() -> (Arc<dyn CacheDispatcher>, Arc<dyn SetStore>) {
        let config = StrataConfig::default()
            .with_tiers(vec![strata_core::TierConfig::set_capable("remote")]);
        let dispatcher: Arc<dyn CacheDispatcher> =
            Arc::new(MemoryDispatcher::from_config(&config));
        let store = dispatcher.set_store().unwrap();
        (dispatcher, store)
    }

    #[tokio::test]
    async fn test_register_stores_value_and_index() {
        let (dispatcher, store) = setup();
        let index = KindIndex::new("gcq:", Some(&store));

        index
            .register("gcq:111", json!({"rows": 1}), &["Post".to_string()])
            .await
            .unwrap();

        assert_eq!(
            dispatcher.get("gcq:111").await.unwrap(),
            Some(json!({"rows": 1}))
        );
        let replies = store
            .exec(vec![SetCommand::ReadMembers {
                set: "gcq:Post".into(),
            }])
            .await
            .unwrap();
        assert_eq!(replies, vec![SetReply::Members(vec!["gcq:111".into()])]);
    }

    #[tokio::test]
    async fn test_invalidate_drops_queries_and_sets() {
        let (dispatcher, store) = setup();
        let index = KindIndex::new("gcq:", Some(&store));
        let kinds = vec!["Post".to_string(), "User".to_string()];

        // One query under both kinds, one under Post only.
        index
            .register("gcq:1", json!(1), &kinds)
            .await
            .unwrap();
        index
            .register("gcq:2", json!(2), &kinds[..1])
            .await
            .unwrap();

        let deleted = index.invalidate(&kinds).await.unwrap();
        // gcq:1 deduplicated across both sets: 2 queries + 2 index sets.
        assert_eq!(deleted, 4);
        assert_eq!(dispatcher.get("gcq:1").await.unwrap(), None);
        assert_eq!(dispatcher.get("gcq:2").await.unwrap(), None);

        // Index sets are gone too.
        let replies = store
            .exec(vec![SetCommand::ReadMembers {
                set: "gcq:Post".into(),
            }])
            .await
            .unwrap();
        assert_eq!(replies, vec![SetReply::Members(vec![])]);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_kind_counts_only_its_set() {
        let (_dispatcher, store) = setup();
        let index = KindIndex::new("gcq:", Some(&store));
        let deleted = index.invalidate(&["Ghost".to_string()]).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn test_register_requires_at_least_one_kind() {
        let (dispatcher, store) = setup();
        let index = KindIndex::new("gcq:", Some(&store));

        let err = index.register("gcq:1", json!(1), &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::OperationFailed { .. }));
        // Nothing was stored.
        assert_eq!(dispatcher.get("gcq:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_store_is_an_error() {
        let index = KindIndex::new("gcq:", None);
        let err = index.register("gcq:1", json!(1), &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NoBackingStore));
        let err = index.invalidate(&["Post".to_string()]).await.unwrap_err();
        assert!(matches!(err, StoreError::NoBackingStore));
    }
}
