//! Structured entity keys.
//!
//! A [`Key`] identifies one entity in the remote datastore: an optional
//! namespace plus an ordered path of kind/identifier segments, where
//! ancestors precede the entity itself (e.g. `GranDad:John / User:555`).
//! Two keys are equivalent iff namespace and path serialize identically.

use serde::{Deserialize, Serialize};

/// Identifier half of a path segment: numeric id or string name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyId {
    /// Numeric identifier
    Int(i64),
    /// String name identifier
    Name(String),
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyId::Int(id) => write!(f, "{}", id),
            KeyId::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Int(id)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

/// One kind/identifier pair in a key path.
///
/// The identifier is optional: a trailing segment without one denotes
/// an incomplete key (an entity whose id the datastore has not
/// allocated yet).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    /// Entity kind name (e.g. "User").
    pub kind: String,
    /// Identifier within the kind, if allocated.
    pub id: Option<KeyId>,
}

impl PathSegment {
    /// Create a complete segment.
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id.into()),
        }
    }

    /// Create an incomplete segment (kind only).
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
        }
    }
}

/// Structured identifier for one datastore entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Optional namespace the entity lives in.
    pub namespace: Option<String>,
    /// Ordered path, ancestors first.
    pub path: Vec<PathSegment>,
}

impl Key {
    /// Create a key with a single kind/id segment and no namespace.
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        Self {
            namespace: None,
            path: vec![PathSegment::new(kind, id)],
        }
    }

    /// Create a key from a full path.
    pub fn from_path(path: Vec<PathSegment>) -> Self {
        Self {
            namespace: None,
            path,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Prepend an ancestor segment.
    pub fn with_ancestor(mut self, kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        self.path.insert(0, PathSegment::new(kind, id));
        self
    }

    /// The kind of the entity itself (last path segment), if any.
    pub fn kind(&self) -> Option<&str> {
        self.path.last().map(|segment| segment.kind.as_str())
    }

    /// The identifier of the entity itself, if allocated.
    pub fn id(&self) -> Option<&KeyId> {
        self.path.last().and_then(|segment| segment.id.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_new_single_segment() {
        let key = Key::new("User", 123);
        assert_eq!(key.kind(), Some("User"));
        assert_eq!(key.id(), Some(&KeyId::Int(123)));
        assert!(key.namespace.is_none());
    }

    #[test]
    fn test_key_with_namespace_and_ancestor() {
        let key = Key::new("User", "john")
            .with_ancestor("Team", 42)
            .with_namespace("com.example.dev");

        assert_eq!(key.namespace.as_deref(), Some("com.example.dev"));
        assert_eq!(key.path.len(), 2);
        assert_eq!(key.path[0].kind, "Team");
        assert_eq!(key.kind(), Some("User"));
    }

    #[test]
    fn test_key_equality_is_structural() {
        let a = Key::new("User", 1).with_namespace("ns");
        let b = Key::new("User", 1).with_namespace("ns");
        let c = Key::new("User", 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_id_display() {
        assert_eq!(KeyId::Int(555).to_string(), "555");
        assert_eq!(KeyId::Name("john".into()).to_string(), "john");
    }

    #[test]
    fn test_incomplete_segment_has_no_id() {
        let key = Key::from_path(vec![PathSegment::incomplete("Task")]);
        assert_eq!(key.kind(), Some("Task"));
        assert!(key.id().is_none());
    }

    #[test]
    fn test_key_serde_roundtrip() {
        let key = Key::new("User", 123).with_ancestor("Team", "core");
        let json = serde_json::to_value(&key).expect("serialize");
        let back: Key = serde_json::from_value(json).expect("deserialize");
        assert_eq!(key, back);
    }
}
