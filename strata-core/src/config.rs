//! Configuration types.
//!
//! The cache layer consumes this configuration; it does not own store
//! topology. Defaults mirror a single bounded in-process tier with
//! ten-minute key entries and one-minute query entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// TTL sentinel: never expire, retention controlled by invalidation.
pub const TTL_NO_EXPIRY: i64 = 0;

/// TTL sentinel: caching disabled for the call (queries only).
pub const TTL_DISABLED: i64 = -1;

/// One physical tier behind the multi-tier dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Tier name, used as the lookup key for per-tier TTLs.
    pub name: String,
    /// Whether this tier supports atomic set operations (and therefore
    /// the infinite/index-backed query cache).
    #[serde(default)]
    pub set_capable: bool,
    /// Entry bound for in-process tiers, unbounded when absent.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl TierConfig {
    /// A bounded in-process memory tier.
    pub fn memory(max_entries: usize) -> Self {
        Self {
            name: "memory".to_string(),
            set_capable: false,
            max_entries: Some(max_entries),
        }
    }

    /// A networked set-capable tier.
    pub fn set_capable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            set_capable: true,
            max_entries: None,
        }
    }
}

/// Per-tier TTL pair, seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTtl {
    pub keys: i64,
    pub queries: i64,
}

/// Default and per-tier TTLs, seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlConfig {
    /// Default TTL for entity-key entries.
    pub keys: i64,
    /// Default TTL for query entries.
    pub queries: i64,
    /// Per-tier overrides, applied when more than one tier is configured.
    pub tiers: BTreeMap<String, TierTtl>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(
            "memory".to_string(),
            TierTtl {
                keys: 60 * 5,
                queries: 60,
            },
        );
        tiers.insert(
            "remote".to_string(),
            TierTtl {
                keys: 60 * 60 * 24,
                queries: 60 * 60,
            },
        );
        Self {
            keys: 60 * 10,
            queries: 60,
            tiers,
        }
    }
}

/// Fingerprint prefixes per data type, keeping the key and query
/// fingerprint spaces collision-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixConfig {
    pub keys: String,
    pub queries: String,
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self {
            keys: "gck:".to_string(),
            queries: "gcq:".to_string(),
        }
    }
}

/// Top-level cache-layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Ordered list of backing tiers.
    pub tiers: Vec<TierConfig>,
    /// TTL defaults and per-tier overrides.
    pub ttl: TtlConfig,
    /// Fingerprint prefixes.
    pub prefixes: PrefixConfig,
    /// When true, every call is cached unless it opts out; when false,
    /// only calls that explicitly opt in are cached.
    pub global: bool,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            tiers: vec![TierConfig::memory(100)],
            ttl: TtlConfig::default(),
            prefixes: PrefixConfig::default(),
            global: true,
        }
    }
}

impl StrataConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tier topology.
    pub fn with_tiers(mut self, tiers: Vec<TierConfig>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Set the default key TTL in seconds.
    pub fn with_key_ttl(mut self, seconds: i64) -> Self {
        self.ttl.keys = seconds;
        self
    }

    /// Set the default query TTL in seconds.
    pub fn with_query_ttl(mut self, seconds: i64) -> Self {
        self.ttl.queries = seconds;
        self
    }

    /// Set the per-tier TTL pair for a named tier.
    pub fn with_tier_ttl(mut self, tier: impl Into<String>, ttl: TierTtl) -> Self {
        self.ttl.tiers.insert(tier.into(), ttl);
        self
    }

    /// Set whether caching is opt-out (true) or opt-in (false).
    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    /// The configured set-capable tier, if any.
    pub fn set_capable_tier(&self) -> Option<&TierConfig> {
        self.tiers.iter().find(|tier| tier.set_capable)
    }

    /// Whether more than one tier is configured.
    pub fn is_multi_tier(&self) -> bool {
        self.tiers.len() > 1
    }
}
