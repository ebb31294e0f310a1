//! Backing-store traits.
//!
//! The orchestrators never talk to a physical store directly. Reads and
//! writes go through a [`CacheDispatcher`], an already-implemented
//! multi-tier facade, and the invalidation index goes through a
//! [`SetStore`], the atomic multi-command surface of a set-capable
//! tier. Values cross these boundaries as `serde_json::Value`.
//!
//! # Entry states
//!
//! A fingerprint can be in one of three states in a tier: not present,
//! present as a stored JSON `null` (a negative entry: looked up,
//! confirmed absent), or present with a value. The dispatcher reports
//! the first as `None` and the other two as `Some(value)`; the
//! [`Cached`] tri-state is the decoded surface the orchestrators
//! return to callers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use strata_core::StoreError;

use crate::ttl::Ttl;

/// Decoded state of one fingerprint at the read surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    /// Not present in any tier.
    Miss,
    /// Present as a negative entry: confirmed absent upstream.
    Negative,
    /// Present with a value.
    Hit(T),
}

impl<T> Cached<T> {
    pub fn is_miss(&self) -> bool {
        matches!(self, Cached::Miss)
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Cached::Hit(_))
    }

    /// Collapse to an option, folding `Negative` into `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Cached::Hit(value) => Some(value),
            _ => None,
        }
    }
}

/// Multi-tier cache dispatcher facade (external collaborator).
///
/// Implementations wrap one or more physical tiers (an in-process
/// bounded cache, a networked key-value store) behind one surface and
/// own eviction entirely. The per-tier side of a [`Ttl`] is consulted
/// with each tier's configured name.
#[async_trait]
pub trait CacheDispatcher: Send + Sync {
    /// Read one fingerprint. `None` means not present in any tier.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Read a batch of fingerprints, positionally.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>, StoreError>;

    /// Write one fingerprint with the resolved TTL.
    async fn set(&self, key: &str, value: Value, ttl: &Ttl) -> Result<(), StoreError>;

    /// Write a batch of fingerprint/value pairs with one resolved TTL.
    async fn mset(&self, pairs: &[(String, Value)], ttl: &Ttl) -> Result<(), StoreError>;

    /// Delete fingerprints from every tier.
    async fn del(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Drop every entry in every tier.
    async fn reset(&self) -> Result<(), StoreError>;

    /// The set-capable store behind one of the tiers, when present.
    ///
    /// The orchestration layer auto-detects index support through this
    /// hook instead of being configured with a second client.
    fn set_store(&self) -> Option<Arc<dyn SetStore>> {
        None
    }
}

/// One command in an atomic multi-command batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SetCommand {
    /// Add a member to a set, creating the set if absent.
    AddToSet { set: String, member: String },
    /// Store a plain value under a key.
    SetValue { key: String, value: Value },
    /// Read all members of a set.
    ReadMembers { set: String },
    /// Delete keys (plain values and sets alike).
    Delete { keys: Vec<String> },
}

/// Reply to one [`SetCommand`].
#[derive(Debug, Clone, PartialEq)]
pub enum SetReply {
    /// Write acknowledged.
    Done,
    /// Number of keys actually deleted.
    Deleted(u64),
    /// Members of the requested set, empty if the set does not exist.
    Members(Vec<String>),
}

/// Atomic multi-command surface of a set-capable tier (external
/// collaborator).
///
/// All commands of one `exec` call apply in sequence without
/// interleaving from other clients' batches. That is the whole
/// isolation guarantee, not full ACID.
#[async_trait]
pub trait SetStore: Send + Sync {
    /// Execute a batch atomically, returning one reply per command.
    async fn exec(&self, commands: Vec<SetCommand>) -> Result<Vec<SetReply>, StoreError>;
}
