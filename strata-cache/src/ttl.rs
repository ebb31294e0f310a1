//! TTL resolution across call-site overrides, configured defaults, and
//! store topology.
//!
//! A resolved [`Ttl`] is either a scalar applied to every tier, or a
//! per-tier mapping consulted by each tier at write time. Two sentinel
//! values are reserved: [`TTL_DISABLED`] (`-1`, queries only) bypasses
//! the cache for the call, and [`TTL_NO_EXPIRY`] (`0`) on the
//! set-capable tier selects the infinite, index-backed write path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_core::{StrataConfig, TTL_DISABLED};

/// Which default TTL table a call resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Entity-key entries.
    Keys,
    /// Query-result entries.
    Queries,
}

/// A resolved time-to-live, seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ttl {
    /// One duration for every tier.
    Scalar(i64),
    /// Tier-name-keyed durations.
    PerTier(BTreeMap<String, i64>),
}

impl Ttl {
    /// Build a per-tier TTL from name/seconds pairs.
    pub fn per_tier<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Ttl::PerTier(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The duration this TTL selects for a named tier.
    pub fn for_tier(&self, tier: &str) -> Option<i64> {
        match self {
            Ttl::Scalar(seconds) => Some(*seconds),
            Ttl::PerTier(tiers) => tiers.get(tier).copied(),
        }
    }

    /// Whether this resolution disables caching for the call.
    pub fn is_disabled(&self) -> bool {
        matches!(self, Ttl::Scalar(s) if *s == TTL_DISABLED)
    }
}

/// Per-call cache options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Force the cache on (`Some(true)`) or off (`Some(false)`) for
    /// this call, overriding the global flag.
    pub cache: Option<bool>,
    /// Call-site TTL override. Takes precedence over every configured
    /// default.
    pub ttl: Option<Ttl>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the cache on or off for this call.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the TTL with a scalar number of seconds.
    pub fn with_ttl(mut self, seconds: i64) -> Self {
        self.ttl = Some(Ttl::Scalar(seconds));
        self
    }

    /// Override the TTL with a per-tier mapping.
    pub fn with_per_tier_ttl<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        self.ttl = Some(Ttl::per_tier(pairs));
        self
    }
}

/// Resolve the TTL to apply for one cache write.
///
/// Precedence: call-site per-tier mapping, then call-site scalar
/// verbatim, then (with more than one configured tier) the per-tier
/// configured defaults, then the scalar configured default.
pub fn resolve(kind: DataKind, options: &CallOptions, config: &StrataConfig) -> Ttl {
    if let Some(ttl) = &options.ttl {
        return ttl.clone();
    }

    if config.is_multi_tier() {
        let tiers = config
            .tiers
            .iter()
            .map(|tier| {
                let seconds = config
                    .ttl
                    .tiers
                    .get(&tier.name)
                    .map(|t| match kind {
                        DataKind::Keys => t.keys,
                        DataKind::Queries => t.queries,
                    })
                    .unwrap_or(match kind {
                        DataKind::Keys => config.ttl.keys,
                        DataKind::Queries => config.ttl.queries,
                    });
                (tier.name.clone(), seconds)
            })
            .collect();
        return Ttl::PerTier(tiers);
    }

    Ttl::Scalar(match kind {
        DataKind::Keys => config.ttl.keys,
        DataKind::Queries => config.ttl.queries,
    })
}
