//! Deterministic fingerprints for keys and queries.
//!
//! A fingerprint identifies one [`Key`] or [`Query`] in the backing
//! stores. The raw form is a fixed-order concatenation of the source
//! fields; by default it is folded through a stable non-cryptographic
//! hash. Determinism requires exact field order and exact filter
//! order: two semantically identical queries built with filters in a
//! different order receive different fingerprints. That mirrors
//! call-site intent and is deliberate, not normalized away.

use strata_core::{FilterValue, FingerprintError, Key, Query};

/// Separator between the sections of a raw query fingerprint.
const SEPARATOR: &str = ":%:";

/// Options controlling fingerprint generation.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintOptions {
    /// When false, return the raw concatenation instead of the hash.
    /// Used for diagnostics and tests.
    pub hash: bool,
}

impl Default for FingerprintOptions {
    fn default() -> Self {
        Self { hash: true }
    }
}

/// Multiplicative string hash, folded to an unsigned 32-bit integer.
///
/// Seed 5381, per character `hash = (hash * 33) XOR code`, wrapping.
fn fold_hash(input: &str) -> u32 {
    let mut hash: u32 = 5381;
    for code in input.chars() {
        hash = hash.wrapping_mul(33) ^ (code as u32);
    }
    hash
}

/// Raw string form of a key: namespace (or empty) followed by the path
/// segments concatenated without separators.
fn key_to_raw(key: &Key) -> Result<String, FingerprintError> {
    if key.path.is_empty() {
        return Err(FingerprintError::EmptyKeyPath);
    }
    let mut raw = key.namespace.clone().unwrap_or_default();
    for segment in &key.path {
        raw.push_str(&segment.kind);
        if let Some(id) = &segment.id {
            raw.push_str(&id.to_string());
        }
    }
    Ok(raw)
}

/// String form of a filter value. A key value substitutes its
/// un-hashed raw form; JSON strings render bare, everything else
/// renders as compact JSON.
fn filter_value_to_raw(value: &FilterValue) -> Result<String, FingerprintError> {
    match value {
        FilterValue::Key(key) => key_to_raw(key),
        FilterValue::Json(serde_json::Value::String(s)) => Ok(s.clone()),
        FilterValue::Json(v) => Ok(v.to_string()),
    }
}

/// Raw string form of a query: the sections below in fixed order,
/// joined with [`SEPARATOR`].
///
/// kinds, namespace, filters (`field op value` folded left to right),
/// group-by fields, limit, offset, orders (`field sign`), projected
/// fields, start cursor, end cursor.
fn query_to_raw(query: &Query) -> Result<String, FingerprintError> {
    if query.kinds.is_empty() {
        return Err(FingerprintError::MissingKind);
    }

    let mut filters = String::new();
    for filter in &query.filters {
        filters.push_str(&filter.field);
        filters.push_str(filter.op.symbol());
        filters.push_str(&filter_value_to_raw(&filter.value)?);
    }

    let mut orders = String::new();
    for order in &query.orders {
        orders.push_str(&order.field);
        orders.push(order.direction.sign());
    }

    let sections = [
        query.kinds.concat(),
        query.namespace.clone().unwrap_or_default(),
        filters,
        query.group_by.concat(),
        query.limit.to_string(),
        query.offset.to_string(),
        orders,
        query.select.concat(),
        query.start_cursor.clone().unwrap_or_default(),
        query.end_cursor.clone().unwrap_or_default(),
    ];
    Ok(sections.join(SEPARATOR))
}

/// Compute the fingerprint of a key.
pub fn key_fingerprint(key: &Key, options: &FingerprintOptions) -> Result<String, FingerprintError> {
    let raw = key_to_raw(key)?;
    if options.hash {
        Ok(fold_hash(&raw).to_string())
    } else {
        Ok(raw)
    }
}

/// Compute the fingerprint of a query.
pub fn query_fingerprint(
    query: &Query,
    options: &FingerprintOptions,
) -> Result<String, FingerprintError> {
    let raw = query_to_raw(query)?;
    if options.hash {
        Ok(fold_hash(&raw).to_string())
    } else {
        Ok(raw)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use strata_core::{Filter, KeyId};

    fn key_strategy() -> impl Strategy<Value = Key> {
        (
            proptest::option::of("[a-z]{1,8}"),
            prop::collection::vec(("[A-Za-z]{1,8}", any::<i64>()), 1..4),
        )
            .prop_map(|(namespace, segments)| {
                let mut key = Key::from_path(
                    segments
                        .into_iter()
                        .map(|(kind, id)| strata_core::PathSegment::new(kind, KeyId::Int(id)))
                        .collect(),
                );
                key.namespace = namespace;
                key
            })
    }

    fn query_strategy() -> impl Strategy<Value = Query> {
        (
            "[A-Za-z]{1,8}",
            prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 0..4),
            any::<i64>(),
        )
            .prop_map(|(kind, filters, limit)| {
                let mut query = Query::new(kind).limit(limit);
                for (field, value) in filters {
                    query = query.filter(Filter::eq(field, value));
                }
                query
            })
    }

    proptest! {
        /// Repeated fingerprints of a structurally identical key agree.
        #[test]
        fn prop_key_fingerprint_deterministic(key in key_strategy()) {
            let opts = FingerprintOptions::default();
            prop_assert_eq!(
                key_fingerprint(&key, &opts).unwrap(),
                key_fingerprint(&key.clone(), &opts).unwrap()
            );
        }

        /// Repeated fingerprints of a structurally identical query agree.
        #[test]
        fn prop_query_fingerprint_deterministic(query in query_strategy()) {
            let opts = FingerprintOptions::default();
            prop_assert_eq!(
                query_fingerprint(&query, &opts).unwrap(),
                query_fingerprint(&query.clone(), &opts).unwrap()
            );
        }

        /// The hashed form is exactly the fold of the raw form.
        #[test]
        fn prop_hash_is_fold_of_raw(query in query_strategy()) {
            let raw = query_fingerprint(&query, &FingerprintOptions { hash: false }).unwrap();
            let hashed = query_fingerprint(&query, &FingerprintOptions { hash: true }).unwrap();
            prop_assert_eq!(hashed, fold_hash(&raw).to_string());
        }

        /// Reversing a multi-filter query's filters changes the raw form.
        #[test]
        fn prop_filter_order_sensitive(query in query_strategy()) {
            prop_assume!(query.filters.len() >= 2);
            prop_assume!(query.filters.first() != query.filters.last());
            let mut reversed = query.clone();
            reversed.filters.reverse();
            let opts = FingerprintOptions { hash: false };
            prop_assert_ne!(
                query_fingerprint(&query, &opts).unwrap(),
                query_fingerprint(&reversed, &opts).unwrap()
            );
        }
    }
}
