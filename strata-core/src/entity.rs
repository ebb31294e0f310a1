//! Entity and query-result wrappers.
//!
//! Cached results carry an explicit back-reference from each entity to
//! its originating [`Key`] via [`KeyedEntity`], so the value shape is
//! never mutated to smuggle identity through the cache.

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// An entity paired with its originating key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedEntity<E> {
    /// The key this entity was fetched under.
    pub key: Key,
    /// The entity value itself.
    pub entity: E,
}

impl<E> KeyedEntity<E> {
    pub fn new(key: Key, entity: E) -> Self {
        Self { key, entity }
    }

    /// Consume the wrapper and return the entity.
    pub fn into_entity(self) -> E {
        self.entity
    }
}

/// Pagination metadata returned alongside query rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Cursor to resume from, when the result was truncated.
    pub end_cursor: Option<String>,
    /// Whether more rows may exist past the cursor.
    pub more_results: bool,
}

/// Full result of running a query: rows plus page metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<E> {
    pub entities: Vec<KeyedEntity<E>>,
    pub page: PageInfo,
}

impl<E> QueryResult<E> {
    pub fn new(entities: Vec<KeyedEntity<E>>, page: PageInfo) -> Self {
        Self { entities, page }
    }

    /// Result with no rows and default page metadata.
    pub fn empty() -> Self {
        Self {
            entities: Vec::new(),
            page: PageInfo::default(),
        }
    }
}
