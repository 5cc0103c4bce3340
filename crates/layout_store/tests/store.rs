//! Tests for the directory and in-memory store engines.
//!
//! Covers init idempotence, the not-initialized guard, additive schema
//! upgrades and exact-name spell lookups.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::assertions_on_result_states,
    clippy::let_underscore_must_use,
    clippy::tests_outside_test_module,
    reason = "Test code may unwrap and panic for simplicity"
)]

use std::fs;

use serde_json::{Value, json};
use tempfile::TempDir;

use layout_store::{
    LayoutKey, LayoutStore, STORE_SCHEMA_VERSION, Spell, StorageError, StoreConfig, validate_layout,
};

fn directory_store(dir: &TempDir) -> LayoutStore {
    LayoutStore::new(StoreConfig::directory(dir.path()))
}

/// Every operation refuses to run before `init()`.
#[tokio::test]
async fn operations_before_init_are_rejected() {
    let store = LayoutStore::in_memory();
    let loaded = store.load_layout(&LayoutKey::Global).await;
    assert!(matches!(loaded, Err(StorageError::NotInitialized)));
    let saved = store
        .save_spells(&[Spell::new("Light", "Glow.")])
        .await;
    assert!(matches!(saved, Err(StorageError::NotInitialized)));
    let spell = store.get_spell("Light").await;
    assert!(matches!(spell, Err(StorageError::NotInitialized)));
}

/// `init()` twice is harmless and keeps what was written in between.
#[tokio::test]
async fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = directory_store(&dir);
    store.init().await.unwrap();
    store
        .save_layout(&LayoutKey::Global, json!({"version": "1.0.0", "sections": {}}))
        .await
        .unwrap();
    store.init().await.unwrap();
    assert!(store.load_layout(&LayoutKey::Global).await.unwrap().is_some());
}

#[tokio::test]
async fn absent_keys_load_as_none() {
    let store = LayoutStore::in_memory();
    store.init().await.unwrap();
    assert_eq!(store.load_layout(&LayoutKey::Global).await.unwrap(), None);
    assert_eq!(
        store
            .load_layout(&LayoutKey::Character(String::from("ghost")))
            .await
            .unwrap(),
        None
    );
    assert_eq!(store.get_spell("Wish").await.unwrap(), None);
}

/// Data written through one handle is visible to a fresh handle on the same directory.
#[tokio::test]
async fn directory_store_persists_across_handles() {
    let dir = TempDir::new().unwrap();
    let layout = json!({"version": "1.0.0", "sections": {"a": {"left": "1px"}}});
    {
        let store = directory_store(&dir);
        store.init().await.unwrap();
        store
            .save_layout(&LayoutKey::Character(String::from("hero")), layout.clone())
            .await
            .unwrap();
        store
            .save_spells(&[Spell::new("Shield", "A barrier.")])
            .await
            .unwrap();
    }
    let reopened = directory_store(&dir);
    reopened.init().await.unwrap();
    assert_eq!(
        reopened
            .load_layout(&LayoutKey::Character(String::from("hero")))
            .await
            .unwrap(),
        Some(layout)
    );
    assert_eq!(reopened.layout_keys().await.unwrap(), vec![String::from("hero")]);
    assert_eq!(
        reopened.get_spell("Shield").await.unwrap().map(|spell| spell.description),
        Some(String::from("A barrier."))
    );
}

/// Interleaved writers neither trip over each other nor lose an update on disk.
#[tokio::test]
async fn concurrent_spell_saves_all_reach_disk() {
    let dir = TempDir::new().unwrap();
    let store = directory_store(&dir);
    store.init().await.unwrap();
    for round in 0..50 {
        let light = [Spell::new(format!("Light {round}"), "Glow.")];
        let shield = [Spell::new(format!("Shield {round}"), "A barrier.")];
        let (left, right) = tokio::join!(store.save_spells(&light), store.save_spells(&shield));
        assert!(left.is_ok(), "{left:?}");
        assert!(right.is_ok(), "{right:?}");
    }

    let reopened = directory_store(&dir);
    reopened.init().await.unwrap();
    assert_eq!(reopened.get_all_spells().await.unwrap().len(), 100);
}

/// A store written by the first schema gains the newer collections and keeps its layouts.
#[tokio::test]
async fn upgrade_from_first_schema_is_additive() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("layouts.json"),
        r#"{"old-hero": {"version": "0.9.0", "sections": {}}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("meta.json"), r#"{"schema": 1, "collections": ["layouts"]}"#).unwrap();

    let store = directory_store(&dir);
    store.init().await.unwrap();

    assert!(dir.path().join("global_layout.json").exists());
    assert!(dir.path().join("spell_cache.json").exists());
    let meta: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta["schema"], json!(STORE_SCHEMA_VERSION));
    assert!(
        store
            .load_layout(&LayoutKey::Character(String::from("old-hero")))
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn corrupt_collection_reports_unavailable() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("layouts.json"), "{not json").unwrap();
    let store = directory_store(&dir);
    let opened = store.init().await;
    assert!(matches!(opened, Err(StorageError::Unavailable { .. })));
    assert!(!store.is_initialized());
}

#[tokio::test]
async fn spell_names_are_case_sensitive_and_upserted() {
    let store = LayoutStore::in_memory();
    store.init().await.unwrap();
    store
        .save_spells(&[Spell::new("Fireball", "Boom."), Spell::new("Light", "Glow.")])
        .await
        .unwrap();
    store
        .save_spells(&[Spell::new("Fireball", "Bigger boom.")])
        .await
        .unwrap();

    assert_eq!(store.get_spell("fireball").await.unwrap(), None);
    let fireball = store.get_spell("Fireball").await.unwrap().unwrap();
    assert_eq!(fireball.description, "Bigger boom.");
    let names: Vec<String> = store
        .get_all_spells()
        .await
        .unwrap()
        .into_iter()
        .map(|spell| spell.name)
        .collect();
    assert_eq!(names, vec![String::from("Fireball"), String::from("Light")]);
}

#[tokio::test]
async fn remove_layout_reports_whether_it_existed() {
    let store = LayoutStore::in_memory();
    store.init().await.unwrap();
    let key = LayoutKey::Character(String::from("hero"));
    store
        .save_layout(&key, json!({"version": "1.0.0", "sections": {}}))
        .await
        .unwrap();
    assert!(store.remove_layout(&key).await.unwrap());
    assert!(!store.remove_layout(&key).await.unwrap());
    assert!(store.layout_keys().await.unwrap().is_empty());
}

#[test]
fn layout_validation_checks_structure_only() {
    assert!(validate_layout(&json!({"version": "1.0.0", "sections": {}})));
    assert!(validate_layout(
        &json!({"version": "1.0.0", "sections": {"x": {"left": "nonsense"}}})
    ));
    assert!(!validate_layout(&json!({"sections": {}})));
    assert!(!validate_layout(&json!({"version": "1.0.0", "sections": []})));
    assert!(!validate_layout(&json!("1.0.0")));
}
