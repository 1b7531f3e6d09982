//! In-process store backed by one ordered table per record type.

use crate::error::{Error, Result};
use crate::identity::{LocalId, RemoteId};
use crate::store::{describe_target, Found, Query, Store};
use crate::table::Table;
use crate::transform::{Transform, Verb};
use crate::{Notifier, Record, RecordType};
use async_trait::async_trait;
use dashmap::DashMap;

/// A [`Store`] that keeps every record in memory.
///
/// Mutations are synchronous under the hood; each call still yields to the
/// scheduler once so results are always deferred.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<RecordType, Table>,
    notifier: Notifier,
}

/// Outcome of applying a transform to a table.
struct Applied {
    /// Returned to the caller
    result: Option<Record>,
    /// Carried by the notification
    notified: Option<Record>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record types this store currently holds a table for.
    pub fn record_types(&self) -> Vec<RecordType> {
        let mut types: Vec<_> = self.tables.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }

    fn apply(&self, transform: &Transform) -> Result<Applied> {
        match transform.verb {
            Verb::Add => {
                let mut table = self
                    .tables
                    .entry(transform.record_type.clone())
                    .or_default();
                apply_add(&mut table, transform)
            }
            Verb::Replace | Verb::Patch => {
                let mut table = self.existing_table(transform)?;
                apply_update(&mut table, transform)
            }
            Verb::Remove => {
                let mut table = self.existing_table(transform)?;
                apply_remove(&mut table, transform)
            }
        }
    }

    fn existing_table(
        &self,
        transform: &Transform,
    ) -> Result<dashmap::mapref::one::RefMut<'_, RecordType, Table>> {
        self.tables
            .get_mut(&transform.record_type)
            .ok_or_else(|| Error::not_found(&transform.record_type, describe_target(transform)))
    }
}

fn apply_add(table: &mut Table, transform: &Transform) -> Result<Applied> {
    let payload = &transform.payload;

    let local_id = match &payload.local_id {
        Some(id) if table.contains(id) => {
            return Err(transform.invalid(format!("local id {id} is already in use")));
        }
        Some(id) => id.clone(),
        None => LocalId::generate(),
    };

    if let Some(remote_id) = &payload.remote_id {
        if table.contains_remote(remote_id) {
            return Err(transform.invalid(format!("remote id {remote_id} is already in use")));
        }
    }

    let record = Record::new(
        local_id,
        payload.remote_id.clone(),
        payload.attributes.clone(),
    );
    table.upsert(record.clone());

    Ok(Applied {
        result: Some(record.clone()),
        notified: Some(record),
    })
}

fn resolve(table: &Table, transform: &Transform) -> Result<Record> {
    let payload = &transform.payload;
    table
        .resolve_either(payload.local_id.as_ref(), payload.remote_id.as_ref())
        .cloned()
        .ok_or_else(|| Error::not_found(&transform.record_type, describe_target(transform)))
}

/// Adopt a remote id carried by the payload, if it does not contradict the
/// record's current one.
fn reconcile_remote_id(
    table: &Table,
    record: &mut Record,
    remote_id: Option<&RemoteId>,
    transform: &Transform,
) -> Result<()> {
    let Some(remote_id) = remote_id else {
        return Ok(());
    };

    match &record.remote_id {
        Some(current) if current == remote_id => Ok(()),
        Some(current) => Err(transform.invalid(format!(
            "record {} already has remote id {current}, payload says {remote_id}",
            record.local_id
        ))),
        None => {
            if table.contains_remote(remote_id) {
                return Err(transform.invalid(format!("remote id {remote_id} is already in use")));
            }
            record.remote_id = Some(remote_id.clone());
            Ok(())
        }
    }
}

fn apply_update(table: &mut Table, transform: &Transform) -> Result<Applied> {
    let mut record = resolve(table, transform)?;
    reconcile_remote_id(
        table,
        &mut record,
        transform.payload.remote_id.as_ref(),
        transform,
    )?;

    if transform.verb == Verb::Replace {
        record.replace_attributes(transform.payload.attributes.clone());
    } else {
        record.merge_attributes(&transform.payload.attributes);
    }
    table.upsert(record.clone());

    Ok(Applied {
        result: Some(record.clone()),
        notified: Some(record),
    })
}

fn apply_remove(table: &mut Table, transform: &Transform) -> Result<Applied> {
    let record = resolve(table, transform)?;
    let removed = table.remove(&record.local_id);

    Ok(Applied {
        result: None,
        notified: removed,
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn transform(&self, transform: Transform) -> Result<Option<Record>> {
        transform.validate()?;
        tokio::task::yield_now().await;

        // Table guard is released before handlers run.
        let applied = self.apply(&transform)?;

        tracing::debug!(
            verb = %transform.verb,
            record_type = %transform.record_type,
            local_id = ?applied.notified.as_ref().map(|r| r.local_id.to_string()),
            "memory store applied transform"
        );

        self.notifier.did_transform(transform, applied.notified);
        Ok(applied.result)
    }

    async fn find_record(&self, record_type: &str, query: Query) -> Result<Found> {
        tokio::task::yield_now().await;

        let Some(table) = self.tables.get(record_type) else {
            return match query {
                Query::Local(id) => Err(Error::not_found(record_type, id)),
                Query::Remote(id) => Err(Error::not_found(record_type, id)),
                Query::All | Query::Filter(_) => Ok(Found::Many(Vec::new())),
            };
        };

        match query {
            Query::All => Ok(Found::Many(table.records().cloned().collect())),
            Query::Local(id) => table
                .get(&id)
                .cloned()
                .map(Found::One)
                .ok_or_else(|| Error::not_found(record_type, id)),
            Query::Remote(id) => table
                .get_remote(&id)
                .cloned()
                .map(Found::One)
                .ok_or_else(|| Error::not_found(record_type, id)),
            Query::Filter(filter) => Ok(Found::Many(table.filter(&filter).cloned().collect())),
        }
    }

    fn length(&self, record_type: &str) -> usize {
        self.tables
            .get(record_type)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentifierRef;
    use crate::notify::{EventKind, StoreEvent};
    use crate::store::StoreExt;
    use crate::transform::Payload;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    async fn jupiter(store: &MemoryStore) -> Record {
        store
            .add("planet", json!({"name": "Jupiter", "classification": "gas giant"}))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_assigns_local_id() {
        let store = MemoryStore::new();
        assert_eq!(store.length("planet"), 0);

        let planet = jupiter(&store).await;

        assert!(!planet.local_id.as_str().is_empty());
        assert_eq!(planet.remote_id, None);
        assert_eq!(planet.get("name"), Some(&json!("Jupiter")));
        assert_eq!(planet.get("classification"), Some(&json!("gas giant")));
        assert_eq!(store.length("planet"), 1);
    }

    #[tokio::test]
    async fn add_is_not_idempotent() {
        let store = MemoryStore::new();
        let a = jupiter(&store).await;
        let b = jupiter(&store).await;

        assert_ne!(a.local_id, b.local_id);
        assert_eq!(store.length("planet"), 2);
    }

    #[tokio::test]
    async fn add_adopts_free_local_id_and_rejects_taken_one() {
        let store = MemoryStore::new();
        let payload = Payload::attributes(json!({"name": "Mars"})).with_local_id("mars-1");
        let record = store
            .transform(Transform::new(Verb::Add, "planet", payload.clone()).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.local_id, LocalId::from("mars-1"));

        let err = store
            .transform(Transform::new(Verb::Add, "planet", payload).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransform { .. }));
        assert_eq!(store.length("planet"), 1);
    }

    #[tokio::test]
    async fn replace_overwrites_attributes_and_keeps_local_id() {
        let store = MemoryStore::new();
        let planet = jupiter(&store).await;

        let updated = store
            .replace(
                "planet",
                Payload::attributes(json!({"name": "Earth"})).with_local_id(planet.local_id.clone()),
            )
            .await
            .unwrap();

        assert_eq!(updated.local_id, planet.local_id);
        assert_eq!(updated.get("name"), Some(&json!("Earth")));
        assert_eq!(updated.get("classification"), None);
    }

    #[tokio::test]
    async fn replace_is_idempotent_in_effect() {
        let store = MemoryStore::new();
        let planet = jupiter(&store).await;
        let payload = Payload::attributes(json!({"name": "Earth", "classification": "terrestrial"}))
            .with_local_id(planet.local_id.clone());

        let first = store.replace("planet", payload.clone()).await.unwrap();
        let second = store.replace("planet", payload).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.length("planet"), 1);
    }

    #[tokio::test]
    async fn patch_merges_given_attributes_only() {
        let store = MemoryStore::new();
        let planet = jupiter(&store).await;

        let updated = store
            .patch(
                "planet",
                Payload::local(planet.local_id.clone()).with_attribute("name", json!("Earth")),
            )
            .await
            .unwrap();

        assert_eq!(updated.local_id, planet.local_id);
        assert_eq!(updated.get("name"), Some(&json!("Earth")));
        assert_eq!(updated.get("classification"), Some(&json!("gas giant")));
    }

    #[tokio::test]
    async fn patch_can_assign_remote_id_then_resolve_by_it() {
        let store = MemoryStore::new();
        let planet = jupiter(&store).await;

        store
            .patch("planet", Payload::local(planet.local_id.clone()).with_remote_id(12345i64))
            .await
            .unwrap();

        let found = store
            .find_one("planet", IdentifierRef::Remote(RemoteId::Int(12345)))
            .await
            .unwrap();
        assert_eq!(found.local_id, planet.local_id);

        let err = store
            .patch("planet", Payload::local(planet.local_id.clone()).with_remote_id(999i64))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransform { .. }));
    }

    #[tokio::test]
    async fn remove_drops_record() {
        let store = MemoryStore::new();
        let planet = jupiter(&store).await;
        jupiter(&store).await;

        store
            .remove("planet", Payload::local(planet.local_id.clone()))
            .await
            .unwrap();

        assert_eq!(store.length("planet"), 1);
        let err = store
            .find_record("planet", Query::Local(planet.local_id.clone()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn mutating_unknown_record_fails_without_notifying() {
        let store = MemoryStore::new();
        let events = Arc::new(Mutex::new(0));
        let counter = events.clone();
        store
            .notifier()
            .subscribe(EventKind::DidTransform, move |_| *counter.lock().unwrap() += 1);

        let err = store
            .patch("planet", Payload::local("ghost").with_attribute("name", json!("X")))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        jupiter(&store).await;
        let err = store.remove("planet", Payload::remote(42i64)).await.unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(*events.lock().unwrap(), 1);
        assert_eq!(store.length("planet"), 1);
    }

    #[tokio::test]
    async fn find_all_and_filter() {
        let store = MemoryStore::new();
        for (name, class) in [
            ("Mercury", "terrestrial"),
            ("Jupiter", "gas giant"),
            ("Earth", "terrestrial"),
        ] {
            store
                .add("planet", json!({"name": name, "classification": class}))
                .await
                .unwrap();
        }

        let all = store.find_all("planet").await.unwrap();
        assert_eq!(all.len(), 3);

        let rocky = store
            .find_record("planet", Query::filter(json!({"classification": "terrestrial"})).unwrap())
            .await
            .unwrap()
            .into_many();
        let names: Vec<_> = rocky.iter().map(|r| r.get("name").unwrap().clone()).collect();
        assert_eq!(names, vec![json!("Mercury"), json!("Earth")]);

        let none = store
            .find_record(
                "planet",
                Query::filter(json!({"classification": "terrestrial", "name": "Jupiter"})).unwrap(),
            )
            .await
            .unwrap();
        assert!(none.is_empty());

        assert!(store.find_all("moon").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_are_snapshots() {
        let store = MemoryStore::new();
        let mut planet = jupiter(&store).await;
        planet.attributes.insert("name".into(), json!("Vulcan"));

        let stored = store
            .find_one("planet", IdentifierRef::Local(planet.local_id.clone()))
            .await
            .unwrap();
        assert_eq!(stored.get("name"), Some(&json!("Jupiter")));
    }

    #[tokio::test]
    async fn notification_carries_invoked_transform_and_record() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.notifier().subscribe(EventKind::DidTransform, move |e| {
            let StoreEvent::DidTransform(e) = e;
            sink.lock().unwrap().push(e.clone());
        });

        let planet = jupiter(&store).await;
        store
            .remove("planet", Payload::local(planet.local_id.clone()))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].transform.verb, Verb::Add);
        assert_eq!(seen[0].transform.payload.local_id, None);
        assert_eq!(seen[0].record.as_ref(), Some(&planet));
        assert_eq!(seen[1].transform.verb, Verb::Remove);
        assert_eq!(seen[1].record.as_ref(), Some(&planet));
    }

    #[tokio::test]
    async fn record_types_lists_tables() {
        let store = MemoryStore::new();
        store.add("planet", json!({})).await.unwrap();
        store.add("moon", json!({})).await.unwrap();
        assert_eq!(store.record_types(), vec!["moon".to_string(), "planet".to_string()]);
    }
}
