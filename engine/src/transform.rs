//! Transforms: the unit of change.
//!
//! Changes are expressed as transforms, not direct mutations. A store applies
//! a transform to its own records and announces it, which is what lets a
//! second store replay the same change against its own state.

use crate::error::{Error, Result};
use crate::identity::{IdentifierRef, LocalId, RemoteId, LOCAL_ID_KEY, REMOTE_ID_KEY};
use crate::record::{is_identifier_key, Attributes};
use crate::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four mutation verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Add,
    Replace,
    Patch,
    Remove,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Add => "add",
            Verb::Replace => "replace",
            Verb::Patch => "patch",
            Verb::Remove => "remove",
        }
    }

    /// Whether the verb must resolve to an existing record.
    pub fn targets_existing(&self) -> bool {
        !matches!(self, Verb::Add)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = InvalidPayload;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "add" => Ok(Verb::Add),
            "replace" => Ok(Verb::Replace),
            "patch" => Ok(Verb::Patch),
            "remove" => Ok(Verb::Remove),
            other => Err(InvalidPayload(format!("unknown verb '{other}'"))),
        }
    }
}

/// A payload that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidPayload(pub String);

/// Transform payload: optional identifier references plus attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub struct Payload {
    pub local_id: Option<LocalId>,
    pub remote_id: Option<RemoteId>,
    pub attributes: Attributes,
}

impl Payload {
    /// Attributes only, no identifiers. Non-object values yield an empty
    /// payload; [`Transform::add`] rejects them before they get here.
    pub fn attributes(value: serde_json::Value) -> Self {
        match Payload::try_from(value) {
            Ok(payload) => Payload {
                local_id: None,
                remote_id: None,
                attributes: payload.attributes,
            },
            Err(_) => Payload::default(),
        }
    }

    /// A bare local identifier reference.
    pub fn local(id: impl Into<LocalId>) -> Self {
        Payload::default().with_local_id(id)
    }

    /// A bare remote identifier reference.
    pub fn remote(id: impl Into<RemoteId>) -> Self {
        Payload::default().with_remote_id(id)
    }

    pub fn with_local_id(mut self, id: impl Into<LocalId>) -> Self {
        self.local_id = Some(id.into());
        self
    }

    pub fn with_remote_id(mut self, id: impl Into<RemoteId>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        let name = name.into();
        if !is_identifier_key(&name) {
            self.attributes.insert(name, value);
        }
        self
    }

    /// The identifier a store resolves first: local, then remote.
    pub fn target(&self) -> Option<IdentifierRef> {
        self.local_id
            .clone()
            .map(IdentifierRef::Local)
            .or_else(|| self.remote_id.clone().map(IdentifierRef::Remote))
    }

    pub fn has_identifier(&self) -> bool {
        self.local_id.is_some() || self.remote_id.is_some()
    }

    /// Loose JSON form: identifiers under `__id`/`id` next to the attributes.
    pub fn to_value(&self) -> serde_json::Value {
        let mut object = self.attributes.clone();
        if let Some(local_id) = &self.local_id {
            object.insert(
                LOCAL_ID_KEY.to_string(),
                serde_json::Value::from(local_id.as_str()),
            );
        }
        if let Some(remote_id) = &self.remote_id {
            object.insert(REMOTE_ID_KEY.to_string(), remote_id.to_json());
        }
        serde_json::Value::Object(object)
    }
}

impl TryFrom<serde_json::Value> for Payload {
    type Error = InvalidPayload;

    /// Objects have `__id`/`id` lifted out; a bare string is a local
    /// identifier and a bare integer a remote one.
    fn try_from(value: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(mut object) => {
                let local_id = match object.remove(LOCAL_ID_KEY) {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(s)) => Some(LocalId::from(s)),
                    Some(other) => {
                        return Err(InvalidPayload(format!(
                            "{LOCAL_ID_KEY} must be a string, got {other}"
                        )))
                    }
                };
                let remote_id = match object.remove(REMOTE_ID_KEY) {
                    None | Some(serde_json::Value::Null) => None,
                    Some(raw) => Some(RemoteId::from_json(&raw).ok_or_else(|| {
                        InvalidPayload(format!(
                            "{REMOTE_ID_KEY} must be an integer or string, got {raw}"
                        ))
                    })?),
                };
                Ok(Payload {
                    local_id,
                    remote_id,
                    attributes: object,
                })
            }
            serde_json::Value::String(s) => Ok(Payload::local(s)),
            serde_json::Value::Number(ref n) => n
                .as_i64()
                .map(Payload::remote)
                .ok_or_else(|| InvalidPayload(format!("unusable identifier {value}"))),
            other => Err(InvalidPayload(format!("unusable payload {other}"))),
        }
    }
}

impl From<Payload> for serde_json::Value {
    fn from(payload: Payload) -> Self {
        payload.to_value()
    }
}

/// A verb, a record type and a payload describing one mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub verb: Verb,
    pub record_type: RecordType,
    pub payload: Payload,
}

impl Transform {
    /// Create a validated transform.
    ///
    /// `replace`, `patch` and `remove` must carry at least one identifier.
    pub fn new(verb: Verb, record_type: impl Into<RecordType>, payload: Payload) -> Result<Self> {
        let transform = Self {
            verb,
            record_type: record_type.into(),
            payload,
        };
        transform.validate()?;
        Ok(transform)
    }

    /// Parse a loosely-typed transform, as received from JSON callers.
    pub fn parse(verb: &str, record_type: &str, payload: serde_json::Value) -> Result<Self> {
        let verb_parsed =
            Verb::from_str(verb).map_err(|e| Error::invalid(verb, record_type, e.0))?;
        let payload =
            Payload::try_from(payload).map_err(|e| Error::invalid(verb, record_type, e.0))?;
        Self::new(verb_parsed, record_type, payload)
    }

    /// An `add` of the given attributes. Anything but a JSON object is rejected.
    pub fn add(record_type: impl Into<RecordType>, attributes: serde_json::Value) -> Result<Self> {
        let record_type = record_type.into();
        if !attributes.is_object() {
            return Err(Error::invalid(
                Verb::Add,
                record_type,
                format!("add payload must be an object, got {attributes}"),
            ));
        }
        Self::new(Verb::Add, record_type, Payload::attributes(attributes))
    }

    /// Check the transform is well formed.
    pub fn validate(&self) -> Result<()> {
        if self.record_type.trim().is_empty() {
            return Err(Error::invalid(self.verb, "", "record type is empty"));
        }
        if self.verb.targets_existing() && !self.payload.has_identifier() {
            return Err(Error::invalid(
                self.verb,
                self.record_type.clone(),
                "payload carries no identifier",
            ));
        }
        Ok(())
    }

    /// The identifier used to resolve the target record.
    pub fn target(&self) -> Option<IdentifierRef> {
        self.payload.target()
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::invalid(self.verb, self.record_type.clone(), reason)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(target) => write!(f, "{} {} ({})", self.verb, self.record_type, target),
            None => write!(f, "{} {}", self.verb, self.record_type),
        }
    }
}
