//! REST-backed store.
//!
//! Each transform becomes one HTTP request:
//!
//! | verb    | request                          | body                         |
//! |---------|----------------------------------|------------------------------|
//! | add     | `POST /<type>s`                  | attributes                   |
//! | replace | `PUT /<type>s/<remoteId>`        | attributes plus `id`         |
//! | patch   | `PATCH /<type>s/<remoteId>`      | payload attributes only      |
//! | remove  | `DELETE /<type>s/<remoteId>`     | none                         |
//!
//! Finds issue `GET /<type>s/<remoteId>` or `GET /<type>s[?attr=value..]`.
//! Responses are authoritative: they are folded into a local cache whose
//! records carry a store-assigned local ID next to the server's `id`.

use crate::config::RestConfig;
use crate::error::{Error, Result};
use crate::identity::{LocalId, RemoteId, REMOTE_ID_KEY};
use crate::record::{strip_identifiers, Attributes};
use crate::store::{describe_target, Found, Query, Store};
use crate::table::Table;
use crate::transform::{Payload, Transform, Verb};
use crate::transport::{HttpTransport, Method, Transport};
use crate::{Notifier, Record, RecordType};
use async_trait::async_trait;
use dashmap::DashMap;

/// A [`Store`] whose mutations are realized as HTTP requests.
#[derive(Debug)]
pub struct RestStore<T = HttpTransport> {
    config: RestConfig,
    transport: T,
    cache: DashMap<RecordType, Table>,
    notifier: Notifier,
}

/// How response attributes are folded into a cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fold {
    Replace,
    Merge,
}

/// Identifier and attributes read from a response (or, when the server sent
/// nothing usable, from the request payload).
#[derive(Debug)]
struct Incoming {
    remote_id: Option<RemoteId>,
    attributes: Attributes,
}

impl Incoming {
    /// Read a record object; anything other than an object yields `None`.
    fn from_response(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let remote_id = object.get(REMOTE_ID_KEY).and_then(RemoteId::from_json);
        let mut attributes = object.clone();
        strip_identifiers(&mut attributes);
        Some(Self {
            remote_id,
            attributes,
        })
    }

    /// The response when it carries a record, the payload otherwise.
    fn from_mutation(response: &serde_json::Value, payload: &Payload) -> Self {
        match Self::from_response(response) {
            Some(incoming) if incoming.remote_id.is_some() || !incoming.attributes.is_empty() => {
                Self {
                    remote_id: incoming.remote_id.or_else(|| payload.remote_id.clone()),
                    attributes: incoming.attributes,
                }
            }
            _ => Self {
                remote_id: payload.remote_id.clone(),
                attributes: payload.attributes.clone(),
            },
        }
    }
}

impl RestStore<HttpTransport> {
    /// Create a store talking HTTP through `reqwest`.
    pub fn new(config: RestConfig) -> Self {
        Self::with_transport(config, HttpTransport::new())
    }
}

impl<T: Transport> RestStore<T> {
    /// Create a store over any transport.
    pub fn with_transport(config: RestConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            cache: DashMap::new(),
            notifier: Notifier::new(),
        }
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Cached copy of a record, without touching the network.
    pub fn cached(&self, record_type: &str, local_id: &LocalId) -> Option<Record> {
        self.cache
            .get(record_type)
            .and_then(|t| t.get(local_id).cloned())
    }

    /// Remote id addressed by a mutating transform.
    fn remote_target(&self, transform: &Transform) -> Result<RemoteId> {
        let payload = &transform.payload;
        if let Some(remote_id) = &payload.remote_id {
            return Ok(remote_id.clone());
        }

        let local_id = payload
            .local_id
            .as_ref()
            .ok_or_else(|| transform.invalid("payload carries no identifier"))?;
        let record = self
            .cached(&transform.record_type, local_id)
            .ok_or_else(|| Error::not_found(&transform.record_type, describe_target(transform)))?;

        record.remote_id.ok_or_else(|| {
            transform.invalid(format!("record {local_id} has no remote id yet"))
        })
    }

    /// Fold incoming data into the cache and return the resulting record.
    fn absorb(
        &self,
        record_type: &str,
        lookup: Option<&LocalId>,
        adopt: Option<&LocalId>,
        incoming: Incoming,
        fold: Fold,
    ) -> Record {
        let mut table = self.cache.entry(record_type.to_string()).or_default();

        let existing = table
            .resolve_either(lookup, incoming.remote_id.as_ref())
            .cloned();
        let mut record = match existing {
            Some(record) => record,
            None => {
                let local_id = match adopt {
                    Some(id) if !table.contains(id) => id.clone(),
                    _ => LocalId::generate(),
                };
                Record::new(local_id, None, Attributes::new())
            }
        };

        if incoming.remote_id.is_some() {
            record.remote_id = incoming.remote_id;
        }
        match fold {
            Fold::Replace => record.replace_attributes(incoming.attributes),
            Fold::Merge => record.merge_attributes(&incoming.attributes),
        }

        table.upsert(record.clone());
        record
    }

    async fn apply(&self, transform: &Transform) -> Result<(Option<Record>, Option<Record>)> {
        let record_type = transform.record_type.as_str();
        let payload = &transform.payload;

        match transform.verb {
            Verb::Add => {
                if let Some(local_id) = &payload.local_id {
                    if self.cached(record_type, local_id).is_some() {
                        return Err(
                            transform.invalid(format!("local id {local_id} is already in use"))
                        );
                    }
                }

                let url = self.config.resource_url(record_type);
                let body = serde_json::Value::Object(payload.attributes.clone());
                let response = self.transport.request(Method::Post, &url, Some(body)).await?;

                let record = self.absorb(
                    record_type,
                    None,
                    payload.local_id.as_ref(),
                    Incoming::from_mutation(&response, payload),
                    Fold::Replace,
                );
                Ok((Some(record.clone()), Some(record)))
            }
            Verb::Replace => {
                let remote_id = self.remote_target(transform)?;
                let url = self.config.record_url(record_type, &remote_id);
                let mut body = payload.attributes.clone();
                body.insert(REMOTE_ID_KEY.to_string(), remote_id.to_json());
                let response = self
                    .transport
                    .request(Method::Put, &url, Some(serde_json::Value::Object(body)))
                    .await?;

                let mut incoming = Incoming::from_mutation(&response, payload);
                incoming.remote_id.get_or_insert(remote_id);
                let record = self.absorb(
                    record_type,
                    payload.local_id.as_ref(),
                    payload.local_id.as_ref(),
                    incoming,
                    Fold::Replace,
                );
                Ok((Some(record.clone()), Some(record)))
            }
            Verb::Patch => {
                let remote_id = self.remote_target(transform)?;
                let url = self.config.record_url(record_type, &remote_id);
                let body = serde_json::Value::Object(payload.attributes.clone());
                let response = self
                    .transport
                    .request(Method::Patch, &url, Some(body))
                    .await?;

                let mut incoming = Incoming::from_mutation(&response, payload);
                incoming.remote_id.get_or_insert(remote_id);
                let record = self.absorb(
                    record_type,
                    payload.local_id.as_ref(),
                    payload.local_id.as_ref(),
                    incoming,
                    Fold::Merge,
                );
                Ok((Some(record.clone()), Some(record)))
            }
            Verb::Remove => {
                let remote_id = self.remote_target(transform)?;
                let url = self.config.record_url(record_type, &remote_id);
                self.transport.request(Method::Delete, &url, None).await?;

                let removed = self.cache.get_mut(record_type).and_then(|mut table| {
                    let local_id = table
                        .resolve_either(payload.local_id.as_ref(), Some(&remote_id))
                        .map(|r| r.local_id.clone())?;
                    table.remove(&local_id)
                });
                Ok((None, removed))
            }
        }
    }

    /// GET a collection and fold each element into the cache, in order.
    async fn fetch_many(&self, record_type: &str, url: &str) -> Result<Found> {
        let response = self.transport.request(Method::Get, url, None).await?;
        let items = response.as_array().ok_or_else(|| Error::Backend {
            status: None,
            body: format!("expected an array, got {response}"),
            context: format!("{} {url}", Method::Get),
        })?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let incoming = Incoming::from_response(item).ok_or_else(|| Error::Backend {
                status: None,
                body: format!("expected a record object, got {item}"),
                context: format!("{} {url}", Method::Get),
            })?;
            records.push(self.absorb(record_type, None, None, incoming, Fold::Replace));
        }
        Ok(Found::Many(records))
    }

    /// GET one record and fold it into the cache.
    async fn fetch_one(
        &self,
        record_type: &str,
        remote_id: RemoteId,
        lookup: Option<&LocalId>,
    ) -> Result<Found> {
        let url = self.config.record_url(record_type, &remote_id);
        let response = self.transport.request(Method::Get, &url, None).await?;
        let mut incoming = Incoming::from_response(&response).ok_or_else(|| Error::Backend {
            status: None,
            body: format!("expected a record object, got {response}"),
            context: format!("{} {url}", Method::Get),
        })?;
        incoming.remote_id.get_or_insert(remote_id);

        Ok(Found::One(self.absorb(
            record_type,
            lookup,
            None,
            incoming,
            Fold::Replace,
        )))
    }
}

/// Encode a filter as a query string: `?attr=value&...`.
pub fn filter_query(filter: &Attributes) -> String {
    if filter.is_empty() {
        return String::new();
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in filter {
        match value {
            serde_json::Value::String(s) => serializer.append_pair(key, s),
            other => serializer.append_pair(key, &other.to_string()),
        };
    }
    format!("?{}", serializer.finish())
}

#[async_trait]
impl<T: Transport> Store for RestStore<T> {
    async fn transform(&self, transform: Transform) -> Result<Option<Record>> {
        transform.validate()?;

        let (result, notified) = self.apply(&transform).await?;

        tracing::debug!(
            verb = %transform.verb,
            record_type = %transform.record_type,
            remote_id = ?notified.as_ref().and_then(|r| r.remote_id.as_ref()).map(|id| id.to_string()),
            "rest store applied transform"
        );

        self.notifier.did_transform(transform, notified);
        Ok(result)
    }

    async fn find_record(&self, record_type: &str, query: Query) -> Result<Found> {
        match query {
            Query::All => {
                let url = self.config.resource_url(record_type);
                self.fetch_many(record_type, &url).await
            }
            Query::Filter(filter) => {
                let url = format!(
                    "{}{}",
                    self.config.resource_url(record_type),
                    filter_query(&filter)
                );
                self.fetch_many(record_type, &url).await
            }
            Query::Remote(remote_id) => self.fetch_one(record_type, remote_id, None).await,
            Query::Local(local_id) => {
                let cached = self
                    .cached(record_type, &local_id)
                    .ok_or_else(|| Error::not_found(record_type, &local_id))?;
                match cached.remote_id {
                    Some(remote_id) => {
                        self.fetch_one(record_type, remote_id, Some(&local_id))
                            .await
                    }
                    None => Ok(Found::One(cached)),
                }
            }
        }
    }

    fn length(&self, record_type: &str) -> usize {
        self.cache.get(record_type).map(|t| t.len()).unwrap_or(0)
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}
