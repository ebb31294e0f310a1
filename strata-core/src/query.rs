//! Structured query descriptions.
//!
//! A [`Query`] mirrors what the datastore client executes: target
//! kind(s), namespace, ordered filters, grouping, pagination, sort
//! orders, and projected fields. Filter order is part of query
//! identity: two queries with the same filters in a different order
//! are distinct at the cache layer, mirroring call-site intent.

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// Entity descends from the given ancestor key
    HasAncestor,
}

impl FilterOperator {
    /// Symbol used when folding the filter into a fingerprint.
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
            FilterOperator::HasAncestor => "HAS_ANCESTOR",
        }
    }
}

/// Value side of a filter: a plain JSON scalar or a [`Key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// An entity key (ancestor filters, key-property filters).
    Key(Key),
    /// Any plain JSON value.
    Json(serde_json::Value),
}

impl From<Key> for FilterValue {
    fn from(key: Key) -> Self {
        FilterValue::Key(key)
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(value: serde_json::Value) -> Self {
        FilterValue::Json(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Json(serde_json::Value::String(value.to_string()))
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Json(serde_json::Value::from(value))
    }
}

/// One filter clause of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field to filter on (`__key__` for key filters).
    pub field: String,
    /// Operator to apply.
    pub op: FilterOperator,
    /// Value to compare against.
    pub value: FilterValue,
}

impl Filter {
    /// Create a new filter clause.
    pub fn new(field: impl Into<String>, op: FilterOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Create an ancestor filter.
    pub fn has_ancestor(key: Key) -> Self {
        Self::new("__key__", FilterOperator::HasAncestor, key)
    }
}

/// Sort direction for an order clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Sign used when folding the order into a fingerprint.
    pub fn sign(&self) -> char {
        match self {
            SortDirection::Ascending => '+',
            SortDirection::Descending => '-',
        }
    }
}

/// One sort-order clause of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: SortDirection,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Structured description of a datastore query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Target kind name(s). Usually exactly one.
    pub kinds: Vec<String>,
    /// Optional namespace.
    pub namespace: Option<String>,
    /// Ordered filter clauses. Order is part of identity.
    pub filters: Vec<Filter>,
    /// Group-by fields.
    pub group_by: Vec<String>,
    /// Result limit, `-1` when unset.
    pub limit: i64,
    /// Result offset, `-1` when unset.
    pub offset: i64,
    /// Sort orders.
    pub orders: Vec<Order>,
    /// Projected fields, empty for full entities.
    pub select: Vec<String>,
    /// Pagination start cursor.
    pub start_cursor: Option<String>,
    /// Pagination end cursor.
    pub end_cursor: Option<String>,
}

impl Query {
    /// Create a query over a single kind with no constraints.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kinds: vec![kind.into()],
            namespace: None,
            filters: Vec::new(),
            group_by: Vec::new(),
            limit: -1,
            offset: -1,
            orders: Vec::new(),
            select: Vec::new(),
            start_cursor: None,
            end_cursor: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Append a filter clause. Call order is preserved.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.select.push(field.into());
        self
    }

    pub fn start_at(mut self, cursor: impl Into<String>) -> Self {
        self.start_cursor = Some(cursor.into());
        self
    }

    pub fn end_at(mut self, cursor: impl Into<String>) -> Self {
        self.end_cursor = Some(cursor.into());
        self
    }
}
