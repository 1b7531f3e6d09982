//! The store contract.
//!
//! Every backend implements [`Store`]: apply a transform, find records,
//! report a length, and announce applied transforms through its
//! [`Notifier`]. All operations are `async` even when the backend is not, so
//! callers and sync links can treat every store the same way.

use crate::error::{Error, Result};
use crate::identity::{IdentifierRef, LocalId, RemoteId};
use crate::record::Attributes;
use crate::transform::{InvalidPayload, Payload, Transform, Verb};
use crate::{Notifier, Record};
use async_trait::async_trait;

/// What `find_record` looks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every record of the type
    All,
    /// Exactly one record, by local ID
    Local(LocalId),
    /// Exactly one record, by remote ID
    Remote(RemoteId),
    /// Every record whose attributes equal all given ones
    Filter(Attributes),
}

impl Query {
    /// Build a filter query from a JSON object.
    pub fn filter(value: serde_json::Value) -> std::result::Result<Self, InvalidPayload> {
        match value {
            serde_json::Value::Object(map) => Ok(Query::Filter(map)),
            other => Err(InvalidPayload(format!("filter must be an object, got {other}"))),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Query::Local(_) | Query::Remote(_))
    }
}

impl From<IdentifierRef> for Query {
    fn from(id: IdentifierRef) -> Self {
        match id {
            IdentifierRef::Local(id) => Query::Local(id),
            IdentifierRef::Remote(id) => Query::Remote(id),
        }
    }
}

/// Result of `find_record`.
#[derive(Debug, Clone, PartialEq)]
pub enum Found {
    One(Record),
    Many(Vec<Record>),
}

impl Found {
    /// The single record, or the first of many.
    pub fn into_one(self) -> Option<Record> {
        match self {
            Found::One(record) => Some(record),
            Found::Many(records) => records.into_iter().next(),
        }
    }

    pub fn into_many(self) -> Vec<Record> {
        match self {
            Found::One(record) => vec![record],
            Found::Many(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Found::One(_) => 1,
            Found::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The contract every backend implements.
#[async_trait]
pub trait Store: Send + Sync {
    /// Apply a transform.
    ///
    /// On success the resulting record is persisted, a `DidTransform` event
    /// is emitted and a snapshot of the record is returned (`None` for
    /// `remove`). A failed transform has no effect and emits nothing.
    async fn transform(&self, transform: Transform) -> Result<Option<Record>>;

    /// Find one record, every record, or the records matching a filter.
    async fn find_record(&self, record_type: &str, query: Query) -> Result<Found>;

    /// Number of records held locally for a type.
    fn length(&self, record_type: &str) -> usize;

    /// Observer registry for this store's notifications.
    fn notifier(&self) -> &Notifier;
}

/// Convenience wrappers over [`Store`].
#[async_trait]
pub trait StoreExt: Store {
    async fn add(&self, record_type: &str, attributes: serde_json::Value) -> Result<Record> {
        let transform = Transform::add(record_type, attributes)?;
        self.transform(transform)
            .await?
            .ok_or_else(|| Error::invalid(Verb::Add, record_type, "store returned no record"))
    }

    async fn replace(&self, record_type: &str, payload: Payload) -> Result<Record> {
        let transform = Transform::new(Verb::Replace, record_type, payload)?;
        self.transform(transform)
            .await?
            .ok_or_else(|| Error::invalid(Verb::Replace, record_type, "store returned no record"))
    }

    async fn patch(&self, record_type: &str, payload: Payload) -> Result<Record> {
        let transform = Transform::new(Verb::Patch, record_type, payload)?;
        self.transform(transform)
            .await?
            .ok_or_else(|| Error::invalid(Verb::Patch, record_type, "store returned no record"))
    }

    async fn remove(&self, record_type: &str, payload: Payload) -> Result<()> {
        let transform = Transform::new(Verb::Remove, record_type, payload)?;
        self.transform(transform).await?;
        Ok(())
    }

    async fn find_one(&self, record_type: &str, id: IdentifierRef) -> Result<Record> {
        let key = id.to_string();
        self.find_record(record_type, Query::from(id))
            .await?
            .into_one()
            .ok_or_else(|| Error::not_found(record_type, key))
    }

    async fn find_all(&self, record_type: &str) -> Result<Vec<Record>> {
        Ok(self.find_record(record_type, Query::All).await?.into_many())
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn transform(&self, transform: Transform) -> Result<Option<Record>> {
        (**self).transform(transform).await
    }

    async fn find_record(&self, record_type: &str, query: Query) -> Result<Found> {
        (**self).find_record(record_type, query).await
    }

    fn length(&self, record_type: &str) -> usize {
        (**self).length(record_type)
    }

    fn notifier(&self) -> &Notifier {
        (**self).notifier()
    }
}

/// Identifier of the record a mutating transform must resolve, for errors.
pub(crate) fn describe_target(transform: &Transform) -> String {
    transform
        .target()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_from_identifier() {
        assert_eq!(
            Query::from(IdentifierRef::Local(LocalId::from("a"))),
            Query::Local(LocalId::from("a"))
        );
        assert!(Query::from(IdentifierRef::Remote(RemoteId::Int(1))).is_single());
        assert!(!Query::All.is_single());
    }

    #[test]
    fn filter_query_from_json() {
        match Query::filter(json!({"classification": "terrestrial"})).unwrap() {
            Query::Filter(map) => assert_eq!(map["classification"], json!("terrestrial")),
            other => panic!("expected filter, got {other:?}"),
        }
        assert!(Query::filter(json!(null)).is_err());
        assert!(Query::filter(json!(["classification", "terrestrial"])).is_err());
    }

    #[test]
    fn found_accessors() {
        let record = Record::new(LocalId::from("a"), None, Attributes::new());

        let one = Found::One(record.clone());
        assert_eq!(one.len(), 1);
        assert_eq!(one.clone().into_many(), vec![record.clone()]);
        assert_eq!(one.into_one(), Some(record.clone()));

        let none = Found::Many(vec![]);
        assert!(none.is_empty());
        assert_eq!(none.into_one(), None);
    }
}
