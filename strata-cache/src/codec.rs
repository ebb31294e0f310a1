//! Serialization boundary for cached query results.
//!
//! Query results cross the dispatcher boundary as a single JSON value
//! holding the entity page and its pagination info. Decode failures
//! surface the fingerprint so a corrupted or schema-drifted entry can
//! be located and purged.

use serde_json::Value;
use strata_core::{QueryResult, StoreError};

use crate::CacheEntity;

/// Encode a query result for storage under `fingerprint`.
pub fn encode<E: CacheEntity>(
    fingerprint: &str,
    result: &QueryResult<E>,
) -> Result<Value, StoreError> {
    serde_json::to_value(result).map_err(|e| StoreError::EncodeFailed {
        fingerprint: fingerprint.to_string(),
        reason: e.to_string(),
    })
}

/// Decode a stored query result retrieved under `fingerprint`.
pub fn decode<E: CacheEntity>(
    fingerprint: &str,
    value: &Value,
) -> Result<QueryResult<E>, StoreError> {
    serde_json::from_value(value.clone()).map_err(|e| StoreError::DecodeFailed {
        fingerprint: fingerprint.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use strata_core::{Key, KeyedEntity, PageInfo};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        title: String,
    }

    #[test]
    fn test_round_trip_preserves_page_info() {
        let result = QueryResult::new(
            vec![KeyedEntity::new(
                Key::new("Post", 1),
                Post { title: "hello".into() },
            )],
            PageInfo {
                end_cursor: Some("abc".into()),
                more_results: true,
            },
        );
        let encoded = encode("gcq:1", &result).unwrap();
        let decoded: QueryResult<Post> = decode("gcq:1", &encoded).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_decode_failure_names_fingerprint() {
        let err = decode::<Post>("gcq:42", &json!({"bogus": true})).unwrap_err();
        match err {
            StoreError::DecodeFailed { fingerprint, .. } => assert_eq!(fingerprint, "gcq:42"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
