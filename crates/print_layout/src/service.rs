//! Storage-backed save, restore, export and import.

use std::sync::Arc;

use layout_store::{LayoutKey, LayoutStore, StorageError, StoreConfig};
use log::{info, warn};
use spell_cache::{ReferenceCache, SpellSource};

use crate::applier::{self, ApplyReport};
use crate::error::LayoutError;
use crate::model::LayoutDocument;
use crate::reference::{self, PendingReference, ReferenceResolution};
use crate::scanner;
use crate::sheet::PrintSheet;

/// Owns the store handle and the reference cache for one session.
#[derive(Debug)]
pub struct LayoutService<S> {
    cache: ReferenceCache<S>,
    degraded: bool,
}

impl<S: SpellSource> LayoutService<S> {
    /// Open the configured store.
    ///
    /// When the engine cannot be opened the service falls back to an
    /// in-memory store: editing keeps working, nothing survives the process.
    ///
    /// # Errors
    ///
    /// Returns a storage error other than `Unavailable`; an unavailable store
    /// degrades to memory instead.
    pub async fn open(config: StoreConfig, source: S) -> Result<Self, LayoutError> {
        let store = LayoutStore::new(config);
        match store.init().await {
            Ok(()) => Ok(Self::with_store(Arc::new(store), source, false)),
            Err(StorageError::Unavailable { reason }) => {
                warn!("storage unavailable ({reason}); layouts will not persist");
                let fallback = LayoutStore::in_memory();
                fallback.init().await?;
                Ok(Self::with_store(Arc::new(fallback), source, true))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Use an already initialized store.
    pub const fn with_store(store: Arc<LayoutStore>, source: S, degraded: bool) -> Self {
        Self {
            cache: ReferenceCache::new(store, source),
            degraded,
        }
    }

    /// Whether persistence fell back to memory.
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub const fn store(&self) -> &Arc<LayoutStore> {
        self.cache.store()
    }

    pub const fn cache(&self) -> &ReferenceCache<S> {
        &self.cache
    }

    /// Scan the sheet and store it as the global layout.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the layout cannot be written.
    pub async fn save(&self, sheet: &PrintSheet) -> Result<LayoutDocument, LayoutError> {
        let doc = scanner::scan(sheet);
        self.store()
            .save_layout(&LayoutKey::Global, doc.to_value()?)
            .await?;
        info!("saved layout ({} floating elements)", doc.sections.len());
        Ok(doc)
    }

    /// The global layout, else the legacy layout stored for `character_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `InvalidDocument` for a corrupt stored layout.
    pub async fn load(&self, character_id: Option<&str>) -> Result<Option<LayoutDocument>, LayoutError> {
        if let Some(global) = self.store().load_layout(&LayoutKey::Global).await? {
            return LayoutDocument::from_value(global).map(Some);
        }
        let Some(character) = character_id else {
            return Ok(None);
        };
        let legacy = self
            .store()
            .load_layout(&LayoutKey::Character(character.to_owned()))
            .await?;
        if legacy.is_some() {
            info!("no global layout; using the layout saved for character {character}");
        }
        legacy.map(LayoutDocument::from_value).transpose()
    }

    /// Load and apply the stored layout, then resolve its reference content.
    ///
    /// `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`LayoutService::load`] and [`apply`].
    pub async fn restore(
        &self,
        sheet: &mut PrintSheet,
        character_id: Option<&str>,
    ) -> Result<Option<(ApplyReport, Vec<ReferenceResolution>)>, LayoutError> {
        let Some(doc) = self.load(character_id).await? else {
            return Ok(None);
        };
        let report = applier::apply(sheet, &doc)?;
        let resolutions = self.resolve_references(sheet, &report.pending).await;
        Ok(Some((report, resolutions)))
    }

    /// Scan the sheet and embed every cached item it refers to.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the reference cache cannot be read.
    pub async fn export(&self, sheet: &PrintSheet) -> Result<LayoutDocument, LayoutError> {
        let mut doc = scanner::scan(sheet);
        for key in doc.reference_keys() {
            match self.store().get_spell(&key).await? {
                Some(spell) => doc.spell_cache.push(spell),
                None => warn!("reference `{key}` is not cached; export will refetch it"),
            }
        }
        Ok(doc)
    }

    /// Store the embedded reference items, apply the document, and keep it as
    /// the global layout.
    ///
    /// # Errors
    ///
    /// Returns `VersionMismatch` before anything is stored or applied, and
    /// storage errors from seeding the cache or saving the layout.
    pub async fn import(
        &self,
        sheet: &mut PrintSheet,
        doc: &LayoutDocument,
    ) -> Result<(ApplyReport, Vec<ReferenceResolution>), LayoutError> {
        applier::check_version(doc)?;
        self.store().save_spells(&doc.spell_cache).await?;
        let report = applier::apply(sheet, doc)?;
        let mut stored = doc.clone();
        stored.spell_cache.clear();
        self.store()
            .save_layout(&LayoutKey::Global, stored.to_value()?)
            .await?;
        let resolutions = self.resolve_references(sheet, &report.pending).await;
        Ok((report, resolutions))
    }

    /// Fetch pending reference content and render it.
    ///
    /// Failures render a retry affordance and are reported, never raised.
    pub async fn resolve_references(
        &self,
        sheet: &mut PrintSheet,
        pending: &[PendingReference],
    ) -> Vec<ReferenceResolution> {
        let fetched = reference::fetch_all(&self.cache, pending).await;
        pending
            .iter()
            .zip(fetched)
            .map(|(item, outcome)| {
                let rendered = sheet.render_reference(item, &outcome).map(|_| ());
                ReferenceResolution {
                    pending: item.clone(),
                    outcome: rendered.and(outcome.map(|_| ()).map_err(LayoutError::from)),
                }
            })
            .collect()
    }
}
