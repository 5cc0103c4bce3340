//! Storage-backed save/restore, export/import and reference resolution.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::assertions_on_result_states,
    clippy::let_underscore_must_use,
    clippy::tests_outside_test_module,
    reason = "Test code may unwrap and panic for simplicity"
)]

use std::cell::Cell;
use std::fs;
use std::sync::Arc;

use layout_store::{LayoutKey, LayoutStore, StoreConfig};
use print_layout::{
    LayoutConfig, LayoutDocument, LayoutError, LayoutService, PrintSheet, ReferenceState,
    SectionGeometry, scan,
};
use serde_json::json;
use spell_cache::{SourceError, Spell, SpellSource};
use tempfile::TempDir;

const PAGE: &str = concat!(
    "<html><body><div id=\"sheet\">",
    "<section id=\"actions\"><h2>Actions</h2><p>Longsword +5</p></section>",
    "<section id=\"features\"><h3>Features</h3><p>Darkvision</p></section>",
    "</div></body></html>"
);

/// Upstream stub answering from a fixed list.
struct StubSource {
    items: Vec<Spell>,
    calls: Cell<usize>,
    offline: Cell<bool>,
}

impl StubSource {
    fn with(items: Vec<Spell>) -> Self {
        Self {
            items,
            calls: Cell::new(0),
            offline: Cell::new(false),
        }
    }

    fn empty() -> Self {
        Self::with(Vec::new())
    }
}

impl SpellSource for StubSource {
    async fn fetch(&self, name: &str) -> Result<Vec<Spell>, SourceError> {
        self.calls.set(self.calls.get() + 1);
        if name == "Offline" || self.offline.get() {
            return Err(SourceError::Transport(String::from("connection refused")));
        }
        Ok(self.items.clone())
    }
}

fn sheet() -> PrintSheet {
    let _ = env_logger::builder().is_test(true).try_init();
    PrintSheet::from_html(PAGE, LayoutConfig::default()).unwrap()
}

fn light() -> Spell {
    let mut spell = Spell::new("Light", "The object sheds bright light.");
    spell.level = Some(0);
    spell.school = Some(String::from("Evocation"));
    spell
}

async fn directory_service(dir: &TempDir, source: StubSource) -> LayoutService<StubSource> {
    LayoutService::open(StoreConfig::directory(dir.path()), source)
        .await
        .unwrap()
}

/// A layout saved by one session is restored by the next.
#[tokio::test]
async fn saved_layout_restores_in_a_new_session() {
    let dir = TempDir::new().unwrap();
    let saved = {
        let service = directory_service(&dir, StubSource::empty()).await;
        assert!(!service.is_degraded());
        let mut sheet = sheet();
        let actions = sheet.extract_by_id("actions", None).unwrap();
        sheet
            .set_geometry(&actions.floating_id, &SectionGeometry::at(200, 40))
            .unwrap();
        service.save(&sheet).await.unwrap()
    };

    let service = directory_service(&dir, StubSource::empty()).await;
    let mut restored = sheet();
    let (report, resolutions) = service.restore(&mut restored, None).await.unwrap().unwrap();
    assert!(report.is_clean());
    assert!(resolutions.is_empty());
    assert_eq!(scan(&restored), saved);
}

#[tokio::test]
async fn nothing_stored_restores_nothing() {
    let service = LayoutService::open(StoreConfig::memory(), StubSource::empty())
        .await
        .unwrap();
    let mut sheet = sheet();
    assert!(service.restore(&mut sheet, Some("42")).await.unwrap().is_none());
    assert!(sheet.floating_ids().is_empty());
}

/// Without a global layout, the legacy per-character blob is used.
#[tokio::test]
async fn legacy_character_layout_is_a_fallback() {
    let store = Arc::new(LayoutStore::in_memory());
    store.init().await.unwrap();
    store
        .save_layout(
            &LayoutKey::Character(String::from("42")),
            json!({
                "version": "1.3.0",
                "sections": {},
                "clones": [{"id": "ps-clone-1", "title": "Legacy", "html": "<p>old</p>"}]
            }),
        )
        .await
        .unwrap();
    let service = LayoutService::with_store(store, StubSource::empty(), false);

    assert!(service.load(None).await.unwrap().is_none());
    let doc = service.load(Some("42")).await.unwrap().unwrap();
    assert_eq!(doc.clones[0].title, "Legacy");
}

#[tokio::test]
async fn corrupt_stored_layout_is_invalid() {
    let store = Arc::new(LayoutStore::in_memory());
    store.init().await.unwrap();
    store
        .save_layout(&LayoutKey::Global, json!({"sections": []}))
        .await
        .unwrap();
    let service = LayoutService::with_store(store, StubSource::empty(), false);
    assert!(matches!(service.load(None).await, Err(LayoutError::InvalidDocument(_))));
}

/// An unusable store degrades to memory instead of failing.
#[tokio::test]
async fn unavailable_storage_degrades_to_memory() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "occupied").unwrap();

    let service = LayoutService::open(StoreConfig::directory(&blocker), StubSource::empty())
        .await
        .unwrap();
    assert!(service.is_degraded());

    let mut sheet = sheet();
    sheet.extract_by_id("actions", None).unwrap();
    service.save(&sheet).await.unwrap();
    assert!(service.load(None).await.unwrap().is_some());
}

/// Reference content renders once fetched and is cached for next time.
#[tokio::test]
async fn references_resolve_through_the_cache() {
    let service = LayoutService::open(StoreConfig::memory(), StubSource::with(vec![light()]))
        .await
        .unwrap();
    let mut sheet = sheet();
    let pending = sheet
        .open_reference("Light", &SectionGeometry::default())
        .unwrap();

    let resolutions = service
        .resolve_references(&mut sheet, &[pending.clone()])
        .await;
    assert_eq!(resolutions.len(), 1);
    assert!(resolutions[0].outcome.is_ok());

    let html = sheet.to_html();
    assert!(html.contains("Cantrip · Evocation"));
    assert!(html.contains("sheds bright light"));
    assert_eq!(
        sheet.registry().get(&pending.floating_id).unwrap().ref_state,
        Some(ReferenceState::Ready)
    );

    let retried = sheet.retry_reference(&pending.floating_id).unwrap();
    service.resolve_references(&mut sheet, &[retried]).await;
    assert_eq!(service.cache().source().calls.get(), 1);
}

/// A failed fetch shows a retry affordance and is reported, not raised.
#[tokio::test]
async fn failed_references_offer_a_retry() {
    let service = LayoutService::open(StoreConfig::memory(), StubSource::empty())
        .await
        .unwrap();
    let mut sheet = sheet();
    let pending = sheet
        .open_reference("Offline", &SectionGeometry::default())
        .unwrap();

    let resolutions = service.resolve_references(&mut sheet, &[pending.clone()]).await;
    assert!(matches!(
        &resolutions[0].outcome,
        Err(LayoutError::ReferenceFetchFailed { name, .. }) if name == "Offline"
    ));
    assert!(sheet.to_html().contains("ps-retry"));
    assert!(matches!(
        sheet.registry().get(&pending.floating_id).unwrap().ref_state,
        Some(ReferenceState::Failed(_))
    ));
}

/// A reference merged into another element keeps a working retry.
#[tokio::test]
async fn merged_references_can_be_retried() {
    let service = LayoutService::open(StoreConfig::memory(), StubSource::with(vec![light()]))
        .await
        .unwrap();
    let mut sheet = sheet();
    let pending = sheet
        .open_reference("Light", &SectionGeometry::default())
        .unwrap();
    let target = sheet
        .create_clone(None, "Prepared", "<p>list</p>", &SectionGeometry::default())
        .unwrap();
    sheet.merge(&pending.floating_id, &target).unwrap();
    assert!(!sheet.registry().contains(&pending.floating_id));

    service.cache().source().offline.set(true);
    let failed = service.resolve_references(&mut sheet, &[pending.clone()]).await;
    assert!(failed[0].outcome.is_err());
    assert!(sheet.to_html().contains("ps-retry"));

    service.cache().source().offline.set(false);
    let retried = sheet.retry_reference(&pending.floating_id).unwrap();
    assert_eq!(retried, pending);
    assert!(sheet.to_html().contains("Loading Light"));

    let resolved = service.resolve_references(&mut sheet, &[retried]).await;
    assert!(resolved[0].outcome.is_ok());
    let html = sheet.to_html();
    assert!(html.contains("sheds bright light"));
    assert!(!html.contains("ps-retry"));
}

/// Export embeds cached items; import seeds the cache so no fetch is needed.
#[tokio::test]
async fn export_then_import_needs_no_upstream() {
    let exporter = LayoutService::open(StoreConfig::memory(), StubSource::with(vec![light()]))
        .await
        .unwrap();
    let mut sheet = sheet();
    let pending = sheet
        .open_reference("Light", &SectionGeometry::at(10, 10))
        .unwrap();
    exporter.resolve_references(&mut sheet, &[pending]).await;
    let exported = exporter.export(&sheet).await.unwrap();
    assert_eq!(exported.spell_cache, vec![light()]);

    let json = exported.to_json_pretty().unwrap();
    let doc = LayoutDocument::from_json(&json).unwrap();

    let importer = LayoutService::open(StoreConfig::memory(), StubSource::empty())
        .await
        .unwrap();
    let mut target = self::sheet();
    let (report, resolutions) = importer.import(&mut target, &doc).await.unwrap();
    assert!(report.is_clean());
    assert!(resolutions.iter().all(|resolution| resolution.outcome.is_ok()));
    assert_eq!(importer.cache().source().calls.get(), 0);
    assert!(target.to_html().contains("sheds bright light"));

    // the stored layout does not carry the embedded cache
    let stored = importer.load(None).await.unwrap().unwrap();
    assert!(stored.spell_cache.is_empty());
    assert_eq!(stored.spell_details.len(), 1);
}

#[tokio::test]
async fn import_refuses_older_documents_before_touching_anything() {
    let service = LayoutService::open(StoreConfig::memory(), StubSource::empty())
        .await
        .unwrap();
    let doc = LayoutDocument::from_value(json!({
        "version": "1.1.0",
        "sections": {},
        "spell_cache": [{"name": "Light", "desc": "Glow."}]
    }))
    .unwrap();
    let mut sheet = sheet();
    let before = sheet.to_html();

    let refused = service.import(&mut sheet, &doc).await;
    assert!(matches!(refused, Err(LayoutError::VersionMismatch { .. })));
    assert_eq!(sheet.to_html(), before);
    assert_eq!(service.store().get_spell("Light").await.unwrap(), None);
    assert_eq!(service.load(None).await.unwrap(), None);
}
