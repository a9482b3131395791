//! Hash cache persistence

use chunksync::hash::{compute_hash, HashStore};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_store_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("state").join("hashes.json");
    let target = dir.path().join("t.bin");
    fs::write(&target, b"abc").unwrap();

    let mut store = HashStore::load(&db);
    assert!(store.is_empty());
    store.record(&target, compute_hash(&target).unwrap());
    store.save().unwrap();

    let reloaded = HashStore::load(&db);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(
        reloaded.get(&target),
        Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );

    // Plain JSON object keyed by target path.
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&db).unwrap()).unwrap();
    assert!(raw.is_object());
    assert_eq!(raw.as_object().unwrap().len(), 1);
}

#[test]
fn test_corrupt_store_loads_empty_and_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hashes.json");
    fs::write(&db, "{ not json").unwrap();

    let mut store = HashStore::load(&db);
    assert!(store.is_empty());

    store.record(&dir.path().join("x"), "00");
    store.save().unwrap();
    assert_eq!(HashStore::load(&db).len(), 1);
}
