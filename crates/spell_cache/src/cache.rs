use std::slice;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::ReferenceError;
use crate::source::SpellSource;
use layout_store::{LayoutStore, Spell};

/// Store-first lookup of reference items.
#[derive(Debug)]
pub struct ReferenceCache<S> {
    store: Arc<LayoutStore>,
    source: S,
}

impl<S: SpellSource> ReferenceCache<S> {
    pub const fn new(store: Arc<LayoutStore>, source: S) -> Self {
        Self { store, source }
    }

    pub const fn store(&self) -> &Arc<LayoutStore> {
        &self.store
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Return the item named exactly `name`.
    ///
    /// A stored item is returned without touching the source. On a miss the
    /// source is asked exactly once; the exact match is persisted and returned.
    /// Nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError::FetchFailed` if the store cannot be read, the
    /// source fails, no exact match comes back, or the match cannot be cached.
    pub async fn fetch_with_cache(&self, name: &str) -> Result<Spell, ReferenceError> {
        if let Some(hit) = self.store.get_spell(name).await? {
            debug!("reference `{name}` served from cache");
            return Ok(hit);
        }

        let items = self
            .source
            .fetch(name)
            .await
            .map_err(|err| ReferenceError::fetch_failed(name, err))?;
        let Some(found) = items.into_iter().find(|item| item.name == name) else {
            return Err(ReferenceError::fetch_failed(
                name,
                "no item with that exact name in the payload",
            ));
        };

        if let Err(err) = self.store.save_spells(slice::from_ref(&found)).await {
            warn!("fetched reference `{name}` but could not cache it: {err}");
        } else {
            info!("cached reference `{name}`");
        }
        Ok(found)
    }
}
