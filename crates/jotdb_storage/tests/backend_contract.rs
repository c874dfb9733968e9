//! Contract tests exercised through `Box<dyn KvBackend>`, the way the
//! layers above consume a backend.

use jotdb_storage::{BackendRegistry, KvBackend, MemoryBackend};
use serde_json::json;

fn boxed() -> Box<dyn KvBackend> {
    Box::new(MemoryBackend::new())
}

#[test]
fn crud_through_a_trait_object() {
    let mut backend = boxed();

    assert!(!backend.exists("k").unwrap());
    backend.set("k", json!({"n": 1})).unwrap();
    assert!(backend.exists("k").unwrap());
    assert_eq!(backend.get("k").unwrap(), Some(json!({"n": 1})));

    assert!(backend.erase("k").unwrap());
    assert!(!backend.erase("k").unwrap());
    assert_eq!(backend.get("k").unwrap(), None);
}

#[test]
fn keys_and_clean_through_a_trait_object() {
    let mut backend = boxed();
    for (key, n) in [("alpha", 1), ("abeta", 2), ("gamma", 3)] {
        backend.set(key, json!(n)).unwrap();
    }

    let mut matched = backend.keys("a*").unwrap();
    matched.sort();
    assert_eq!(matched, vec!["abeta", "alpha"]);

    let single = backend.keys("?amma").unwrap();
    assert_eq!(single, vec!["gamma"]);

    backend.clean().unwrap();
    assert!(backend.keys("*").unwrap().is_empty());
}

#[test]
fn dumps_is_a_json_object_and_loads_restores_it() {
    let mut backend = boxed();
    backend.set("a", json!([1, 2, {"x": null}])).unwrap();
    backend.set("b", json!("text")).unwrap();

    let dump = backend.dumps().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&dump).unwrap();
    assert!(parsed.is_object());

    let mut restored = boxed();
    restored.loads(&dump).unwrap();
    assert_eq!(restored.dumps().unwrap().len(), dump.len());
    assert_eq!(restored.get("a").unwrap(), backend.get("a").unwrap());
}

#[test]
fn loads_failure_writes_nothing() {
    let mut backend = boxed();
    assert!(backend.loads(r#"["an", "array"]"#).is_err());
    assert!(backend.loads(r#"{"truncated": "#).is_err());
    assert!(backend.keys("*").unwrap().is_empty());
}

#[test]
fn file_dump_and_load_across_backends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contract.json");

    let mut writer = boxed();
    writer.set("k", json!({"file": true})).unwrap();
    writer.dump_file(&path).unwrap();

    let mut reader = boxed();
    reader.set("keep", json!(1)).unwrap();
    reader.load_file(&path).unwrap();

    // load merges, it does not clean
    assert!(reader.exists("keep").unwrap());
    assert_eq!(reader.get("k").unwrap(), Some(json!({"file": true})));
}

#[test]
fn registry_handles_share_through_trait_objects() {
    let registry = BackendRegistry::new();
    let mut left: Box<dyn KvBackend> = Box::new(registry.get_or_create("app"));
    let right: Box<dyn KvBackend> = Box::new(registry.get_or_create("app"));

    left.set("k", json!(7)).unwrap();
    assert_eq!(right.get("k").unwrap(), Some(json!(7)));
    assert_eq!(left.id(), right.id());
    assert!(left.is_shared() && right.is_shared());
}

#[test]
fn private_backends_have_distinct_identities() {
    let a = MemoryBackend::new();
    let b = MemoryBackend::new();
    assert_ne!(a.id(), b.id());
    // a clone is the same map and keeps the identity
    assert_eq!(a.id(), a.clone().id());
}

#[test]
fn deep_bytes_track_content_growth() {
    let mut backend = boxed();
    backend.set("k", json!("short")).unwrap();
    let small = backend.bytes_used(true);
    backend.set("k", json!("a much longer payload than before")).unwrap();
    assert!(backend.bytes_used(true) > small);
}
