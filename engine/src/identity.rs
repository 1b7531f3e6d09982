//! Record identity scheme.
//!
//! Every record carries a store-assigned [`LocalId`] and, once an
//! authoritative backend has seen it, a [`RemoteId`]. Either can be used to
//! look a record up; stores resolve the local identifier first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON key holding the local identifier.
pub const LOCAL_ID_KEY: &str = "__id";

/// JSON key holding the remote identifier.
pub const REMOTE_ID_KEY: &str = "id";

/// Identifier assigned by the store instance holding a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    /// Generate a fresh, process-unique identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LocalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LocalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by an authoritative backend.
///
/// Servers hand out either numeric or string keys; both render as a single
/// URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Int(i64),
    Str(String),
}

impl RemoteId {
    /// Read a remote identifier out of a JSON value.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(RemoteId::Int),
            serde_json::Value::String(s) => Some(RemoteId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RemoteId::Int(n) => serde_json::Value::from(*n),
            RemoteId::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl From<i64> for RemoteId {
    fn from(value: i64) -> Self {
        RemoteId::Int(value)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        RemoteId::Str(value.to_string())
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Int(n) => write!(f, "{n}"),
            RemoteId::Str(s) => f.write_str(s),
        }
    }
}

/// A reference to a record by either of its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentifierRef {
    Local(LocalId),
    Remote(RemoteId),
}

impl fmt::Display for IdentifierRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierRef::Local(id) => write!(f, "{LOCAL_ID_KEY}={id}"),
            IdentifierRef::Remote(id) => write!(f, "{REMOTE_ID_KEY}={id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique() {
        let a = LocalId::generate();
        let b = LocalId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn remote_id_from_json() {
        assert_eq!(RemoteId::from_json(&json!(12345)), Some(RemoteId::Int(12345)));
        assert_eq!(
            RemoteId::from_json(&json!("abc")),
            Some(RemoteId::Str("abc".into()))
        );
        assert_eq!(RemoteId::from_json(&json!(null)), None);
        assert_eq!(RemoteId::from_json(&json!(1.5)), None);
    }

    #[test]
    fn remote_id_path_segment() {
        assert_eq!(RemoteId::Int(12345).to_string(), "12345");
        assert_eq!(RemoteId::from("pluto").to_string(), "pluto");
    }

    #[test]
    fn identifier_ref_display() {
        let local = IdentifierRef::Local(LocalId::from("a1"));
        assert_eq!(local.to_string(), "__id=a1");

        let remote = IdentifierRef::Remote(RemoteId::Int(7));
        assert_eq!(remote.to_string(), "id=7");
    }
}
