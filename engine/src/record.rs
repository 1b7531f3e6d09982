//! Record types for storing data.

use crate::identity::{LocalId, RemoteId, LOCAL_ID_KEY, REMOTE_ID_KEY};
use serde::{Deserialize, Serialize};

/// Open attribute map of a record, excluding identifiers.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A data record held by a store.
///
/// Serializes as a flat JSON object: `{"__id": .., "id": .., ...attributes}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier assigned by the holding store
    #[serde(rename = "__id")]
    pub local_id: LocalId,
    /// Identifier assigned by an authoritative backend
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
    /// Everything else
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Record {
    /// Create a new record. Identifier keys in `attributes` are dropped.
    pub fn new(local_id: LocalId, remote_id: Option<RemoteId>, mut attributes: Attributes) -> Self {
        strip_identifiers(&mut attributes);
        Self {
            local_id,
            remote_id,
            attributes,
        }
    }

    /// Get an attribute by name.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Overwrite every attribute (replace semantics).
    pub fn replace_attributes(&mut self, mut attributes: Attributes) {
        strip_identifiers(&mut attributes);
        self.attributes = attributes;
    }

    /// Overwrite only the given attributes (patch semantics).
    pub fn merge_attributes(&mut self, attributes: &Attributes) {
        for (key, value) in attributes {
            if is_identifier_key(key) {
                continue;
            }
            self.attributes.insert(key.clone(), value.clone());
        }
    }

    /// Whether every given attribute is present with an equal value.
    pub fn matches(&self, filter: &Attributes) -> bool {
        filter.iter().all(|(key, expected)| match key.as_str() {
            LOCAL_ID_KEY => expected.as_str() == Some(self.local_id.as_str()),
            REMOTE_ID_KEY => self.remote_id.as_ref().map(RemoteId::to_json).as_ref() == Some(expected),
            _ => self.attributes.get(key) == Some(expected),
        })
    }

    /// JSON form including identifiers.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = self.attributes.clone();
        object.insert(
            LOCAL_ID_KEY.to_string(),
            serde_json::Value::from(self.local_id.as_str()),
        );
        if let Some(remote_id) = &self.remote_id {
            object.insert(REMOTE_ID_KEY.to_string(), remote_id.to_json());
        }
        serde_json::Value::Object(object)
    }
}

pub(crate) fn is_identifier_key(key: &str) -> bool {
    key == LOCAL_ID_KEY || key == REMOTE_ID_KEY
}

pub(crate) fn strip_identifiers(attributes: &mut Attributes) {
    attributes.remove(LOCAL_ID_KEY);
    attributes.remove(REMOTE_ID_KEY);
}
