//! Strata Core - Data Model, Configuration, and Errors
//!
//! Shared types for the Strata caching layer:
//! - [`Key`] and [`Query`]: structured identifiers for datastore
//!   entities and queries
//! - [`KeyedEntity`] and [`QueryResult`]: result wrappers carrying
//!   explicit key back-references
//! - [`StrataConfig`]: store topology, TTL defaults, prefixes
//! - Error taxonomy: [`FingerprintError`], [`StoreError`],
//!   [`FetchError`], aggregated into [`StrataError`]

pub mod config;
pub mod entity;
pub mod error;
pub mod key;
pub mod query;

pub use config::{
    PrefixConfig, StrataConfig, TierConfig, TierTtl, TtlConfig, TTL_DISABLED, TTL_NO_EXPIRY,
};
pub use entity::{KeyedEntity, PageInfo, QueryResult};
pub use error::{FetchError, FingerprintError, StoreError, StrataError, StrataResult};
pub use key::{Key, KeyId, PathSegment};
pub use query::{Filter, FilterOperator, FilterValue, Order, Query, SortDirection};
