//! Edge case tests for tandem-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tandem_engine::{
    Error, EventKind, IdentifierRef, LocalId, MemoryStore, Payload, Query, RemoteId, Store,
    StoreExt, Transform, Verb,
};

// ============================================================================
// Transform parsing
// ============================================================================

#[test]
fn unknown_verb_is_rejected() {
    let err = Transform::parse("upsert", "planet", json!({"name": "X"})).unwrap_err();
    assert!(matches!(err, Error::InvalidTransform { ref verb, .. } if verb == "upsert"));
}

#[test]
fn mutations_without_identifier_are_rejected() {
    for verb in ["replace", "patch", "remove"] {
        let err = Transform::parse(verb, "planet", json!({"name": "X"})).unwrap_err();
        assert!(matches!(err, Error::InvalidTransform { .. }), "{verb}");
    }
}

#[test]
fn empty_record_type_is_rejected() {
    assert!(Transform::add("", json!({})).is_err());
    assert!(Transform::add("   ", json!({})).is_err());
}

#[test]
fn non_string_local_id_is_rejected() {
    let err = Transform::parse("patch", "planet", json!({"__id": 5})).unwrap_err();
    assert!(matches!(err, Error::InvalidTransform { .. }));
}

#[test]
fn bare_identifiers_are_accepted() {
    let by_local = Transform::parse("remove", "planet", json!("a1")).unwrap();
    assert_eq!(
        by_local.target(),
        Some(IdentifierRef::Local(LocalId::from("a1")))
    );

    let by_remote = Transform::parse("remove", "planet", json!(12345)).unwrap();
    assert_eq!(
        by_remote.target(),
        Some(IdentifierRef::Remote(RemoteId::Int(12345)))
    );

    assert!(Transform::parse("remove", "planet", json!(1.5)).is_err());
    assert!(Transform::parse("remove", "planet", json!([1])).is_err());
}

#[test]
fn string_remote_ids() {
    let t = Transform::parse("patch", "planet", json!({"id": "abc-1", "name": "X"})).unwrap();
    assert_eq!(t.payload.remote_id, Some(RemoteId::from("abc-1")));
}

#[test]
fn local_id_wins_when_both_are_given() {
    let t = Transform::new(
        Verb::Patch,
        "planet",
        Payload::local("a1").with_remote_id(7i64),
    )
    .unwrap();
    assert_eq!(t.target(), Some(IdentifierRef::Local(LocalId::from("a1"))));
}

// ============================================================================
// Attribute values
// ============================================================================

#[tokio::test]
async fn unicode_and_nested_attributes_survive() {
    let store = MemoryStore::new();

    let attributes = json!({
        "name": "木星",
        "notes": "Hello\nWorld\tTab",
        "moons": [{"name": "Io"}, {"name": "Europa"}],
        "rings": null
    });
    let record = store.add("planet", attributes.clone()).await.unwrap();

    let found = store
        .find_one("planet", IdentifierRef::Local(record.local_id))
        .await
        .unwrap();
    assert_eq!(found.get("name"), Some(&json!("木星")));
    assert_eq!(found.get("moons"), attributes.get("moons"));
    assert_eq!(found.get("rings"), Some(&json!(null)));
}

#[tokio::test]
async fn empty_attribute_set() {
    let store = MemoryStore::new();
    let record = store.add("planet", json!({})).await.unwrap();

    assert!(record.attributes.is_empty());
    assert_eq!(store.length("planet"), 1);
}

#[tokio::test]
async fn non_object_attributes_add_nothing() {
    let store = MemoryStore::new();
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    store
        .notifier()
        .subscribe(EventKind::DidTransform, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    for attributes in [json!([1, 2]), json!(null), json!("Jupiter"), json!(42)] {
        let err = store.add("planet", attributes.clone()).await.unwrap_err();
        assert!(
            matches!(err, Error::InvalidTransform { ref verb, .. } if verb == "add"),
            "{attributes}"
        );
    }

    assert_eq!(store.length("planet"), 0);
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn identifier_keys_in_attributes_are_not_attributes() {
    let store = MemoryStore::new();
    let record = store
        .add("planet", json!({"__id": "chosen", "id": 9, "name": "Mars"}))
        .await
        .unwrap();

    assert_ne!(record.local_id, LocalId::from("chosen"));
    assert_eq!(record.remote_id, None);
    assert_eq!(record.get("__id"), None);
    assert_eq!(
        record.to_json(),
        json!({"__id": record.local_id.as_str(), "name": "Mars"})
    );
}

// ============================================================================
// Record types
// ============================================================================

#[tokio::test]
async fn record_types_are_isolated() {
    let store = MemoryStore::new();
    let planet = store.add("planet", json!({"name": "Earth"})).await.unwrap();
    store.add("moon", json!({"name": "Luna"})).await.unwrap();

    assert_eq!(store.length("planet"), 1);
    assert_eq!(store.length("moon"), 1);
    assert_eq!(store.length("star"), 0);

    let err = store
        .find_one("moon", IdentifierRef::Local(planet.local_id))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn queries_on_unknown_type() {
    let store = MemoryStore::new();

    assert!(store.find_all("comet").await.unwrap().is_empty());
    assert!(store
        .find_record("comet", Query::filter(json!({"name": "Halley"})).unwrap())
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .find_one("comet", IdentifierRef::Remote(RemoteId::Int(1)))
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn filter_on_missing_attribute_matches_nothing() {
    let store = MemoryStore::new();
    store.add("planet", json!({"name": "Venus"})).await.unwrap();

    let found = store
        .find_record("planet", Query::filter(json!({"moons": 0})).unwrap())
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn removing_twice_fails_the_second_time() {
    let store = MemoryStore::new();
    let record = store.add("planet", json!({"name": "Pluto"})).await.unwrap();

    store
        .remove("planet", Payload::local(record.local_id.clone()))
        .await
        .unwrap();
    let err = store
        .remove("planet", Payload::local(record.local_id))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
