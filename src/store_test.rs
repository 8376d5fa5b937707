use std::sync::Arc;

use super::*;
use crate::settings::{CombinePolicy, MemorySettings};
use crate::storage::MemoryStorage;
use crate::wkt::{Coord, Ring};

fn square(x: f64, y: f64, size: f64) -> Geometry {
    let ring: Ring = vec![
        Coord::new(x, y),
        Coord::new(x + size, y),
        Coord::new(x + size, y + size),
        Coord::new(x, y + size),
        Coord::new(x, y),
    ];
    Geometry::Polygon(vec![ring])
}

fn settings(persist: bool) -> Arc<MemorySettings> {
    Arc::new(MemorySettings::new(true, CombinePolicy::Join, persist))
}

fn store_with(persist: bool) -> (GeometryStore, Arc<MemoryStorage>, Arc<MemorySettings>) {
    let storage = Arc::new(MemoryStorage::new());
    let prefs = settings(persist);
    let store = GeometryStore::new(storage.clone(), prefs.clone());
    (store, storage, prefs)
}

// =============================================================
// Add / dedup
// =============================================================

#[tokio::test]
async fn add_assigns_id_and_content_hash() {
    let (mut store, _, _) = store_with(false);
    let id = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();

    let record = store.record(id).unwrap();
    assert_eq!(record.wkt, "POLYGON((0 0,10 0,10 10,0 10,0 0))");
    assert_eq!(record.hash, crate::checksum::checksum(&record.wkt));
}

#[tokio::test]
async fn add_is_idempotent_for_identical_content() {
    let (mut store, _, _) = store_with(false);
    let first = store.add(&square(0.0, 0.0, 10.0)).await;
    let second = store.add(&square(0.0, 0.0, 10.0)).await;

    assert_eq!(first, second, "duplicate add must return the existing id");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn add_distinct_content_appends_in_order() {
    let (mut store, _, _) = store_with(false);
    let a = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    let b = store.add(&square(50.0, 0.0, 10.0)).await.unwrap();

    assert_ne!(a, b);
    let ids = store.get().iter().map(|r| r.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![a, b]);
}

// =============================================================
// Persistence scenarios
// =============================================================

#[tokio::test]
async fn nothing_survives_reload_with_persist_disabled() {
    let (mut store, storage, _) = store_with(false);
    store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    assert_eq!(store.len(), 1, "cache is authoritative for the session");

    // Simulated reload: a fresh store over the same storage.
    let mut reloaded = GeometryStore::new(storage, settings(false));
    assert!(reloaded.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn roundtrip_with_persist_enabled() {
    let (mut store, storage, prefs) = store_with(true);
    let id = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    let wkt = store.record(id).unwrap().wkt.clone();

    let mut reloaded = GeometryStore::new(storage, prefs);
    let records = reloaded.load().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].wkt, wkt);
}

#[tokio::test]
async fn remove_deletes_from_cache_and_storage() {
    let (mut store, storage, prefs) = store_with(true);
    let id = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();

    store.remove(id).await;
    assert!(store.is_empty());

    let mut reloaded = GeometryStore::new(storage, prefs);
    assert!(reloaded.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_unknown_id_still_persists() {
    let (mut store, storage, _) = store_with(true);
    store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    store.remove(Uuid::new_v4()).await;

    assert_eq!(store.len(), 1);
    assert!(storage.get_item(crate::consts::GEOMETRIES_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn clear_flags_are_independent() {
    let (mut store, storage, _) = store_with(true);
    store.add(&square(0.0, 0.0, 10.0)).await.unwrap();

    // Clear only the working set: persisted copy remains.
    store.clear(true, false).await;
    assert!(store.is_empty());
    assert!(storage.get_item(crate::consts::GEOMETRIES_KEY).await.unwrap().is_some());

    // Clear only persistence.
    store.clear(false, true).await;
    assert!(storage.get_item(crate::consts::GEOMETRIES_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn load_after_working_set_clear_restores_records() {
    let (mut store, _, _) = store_with(true);
    let id = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    let wkt = store.record(id).unwrap().wkt.clone();

    store.clear(true, false).await;
    let records = store.load().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].wkt, wkt);
}

// =============================================================
// Update / change detection
// =============================================================

#[tokio::test]
async fn update_rewrites_text_and_rekeys_hash() {
    let (mut store, _, _) = store_with(false);
    let id = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    let old_hash = store.record(id).unwrap().hash.clone();

    let new_wkt = "POLYGON((0 0,20 0,20 20,0 20,0 0))";
    store.update(id, new_wkt).await;

    let record = store.record(id).unwrap();
    assert_eq!(record.id, id, "surrogate id is stable across edits");
    assert_eq!(record.wkt, new_wkt);
    assert_ne!(record.hash, old_hash);
    assert_eq!(record.hash, crate::checksum::checksum(new_wkt));
}

#[tokio::test]
async fn update_unknown_id_is_a_noop() {
    let (mut store, _, _) = store_with(false);
    store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    store.update(Uuid::new_v4(), "POINT(1 1)").await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.get()[0].wkt, "POLYGON((0 0,10 0,10 10,0 10,0 0))");
}

#[tokio::test]
async fn changed_false_when_texts_match() {
    let (mut store, _, _) = store_with(false);
    let id = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();
    let before = store.get().to_vec();

    assert!(!store.changed(id, &square(0.0, 0.0, 10.0)).await);
    assert_eq!(store.get(), before.as_slice(), "store untouched on no-op");
}

#[tokio::test]
async fn changed_commits_new_text_and_keeps_id() {
    let (mut store, _, _) = store_with(false);
    let id = store.add(&square(0.0, 0.0, 10.0)).await.unwrap();

    assert!(store.changed(id, &square(0.0, 0.0, 25.0)).await);

    let record = store.record(id).unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.wkt, "POLYGON((0 0,25 0,25 25,0 25,0 0))");
    assert_eq!(record.hash, crate::checksum::checksum(&record.wkt));
}

#[tokio::test]
async fn changed_false_for_unknown_id() {
    let (mut store, _, _) = store_with(false);
    assert!(!store.changed(Uuid::new_v4(), &square(0.0, 0.0, 1.0)).await);
}

// =============================================================
// Load hygiene
// =============================================================

#[tokio::test]
async fn load_rekeys_stale_hashes() {
    let storage = Arc::new(MemoryStorage::new());
    let prefs = settings(true);

    let tampered = vec![GeometryRecord {
        id: Uuid::new_v4(),
        hash: "0000".to_owned(),
        wkt: "POINT(1 2)".to_owned(),
    }];
    storage
        .set_item(crate::consts::GEOMETRIES_KEY, &serde_json::to_string(&tampered).unwrap())
        .await
        .unwrap();

    let mut store = GeometryStore::new(storage, prefs);
    let records = store.load().await.unwrap();
    assert_eq!(records[0].hash, crate::checksum::checksum("POINT(1 2)"));
}

#[tokio::test]
async fn load_drops_duplicate_content() {
    let storage = Arc::new(MemoryStorage::new());
    let prefs = settings(true);

    let hash = crate::checksum::checksum("POINT(1 2)");
    let twins = vec![
        GeometryRecord { id: Uuid::new_v4(), hash: hash.clone(), wkt: "POINT(1 2)".to_owned() },
        GeometryRecord { id: Uuid::new_v4(), hash, wkt: "POINT(1 2)".to_owned() },
    ];
    storage
        .set_item(crate::consts::GEOMETRIES_KEY, &serde_json::to_string(&twins).unwrap())
        .await
        .unwrap();

    let mut store = GeometryStore::new(storage, prefs);
    assert_eq!(store.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn load_corrupt_payload_is_an_error() {
    let storage = Arc::new(MemoryStorage::new());
    let prefs = settings(true);
    storage.set_item(crate::consts::GEOMETRIES_KEY, "not records").await.unwrap();

    let mut store = GeometryStore::new(storage, prefs);
    assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
}
