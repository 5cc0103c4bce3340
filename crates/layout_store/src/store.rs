use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex as WriteLock;

use crate::config::{StoreConfig, StoreLocation};
use crate::error::StorageError;
use crate::spell::Spell;

/// Current on-disk schema. Each bump only introduces collections.
pub const STORE_SCHEMA_VERSION: u32 = 3;

const META_FILE: &str = "meta.json";

/// The logical collections, in the order they were introduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Layouts,
    GlobalLayout,
    SpellCache,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Layouts, Self::GlobalLayout, Self::SpellCache];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Layouts => "layouts",
            Self::GlobalLayout => "global_layout",
            Self::SpellCache => "spell_cache",
        }
    }

    /// Store schema that first carried this collection.
    pub const fn introduced_in(self) -> u32 {
        match self {
            Self::Layouts => 1,
            Self::GlobalLayout => 2,
            Self::SpellCache => 3,
        }
    }

    fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

/// Key of a stored layout blob.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LayoutKey {
    /// The layout shared by every character.
    Global,
    /// Legacy per-character layout.
    Character(String),
}

impl LayoutKey {
    pub const fn collection(&self) -> Collection {
        match self {
            Self::Global => Collection::GlobalLayout,
            Self::Character(_) => Collection::Layouts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreMeta {
    schema: u32,
    #[serde(default)]
    collections: Vec<String>,
}

#[derive(Debug, Default)]
struct Collections {
    layouts: BTreeMap<String, Value>,
    global_layout: Option<Value>,
    spell_cache: BTreeMap<String, Spell>,
}

impl Collections {
    fn encode(&self, collection: Collection) -> Result<Vec<u8>, StorageError> {
        let encoded = match collection {
            Collection::Layouts => serde_json::to_vec_pretty(&self.layouts),
            Collection::GlobalLayout => serde_json::to_vec_pretty(&self.global_layout),
            Collection::SpellCache => serde_json::to_vec_pretty(&self.spell_cache),
        };
        encoded.map_err(|source| StorageError::Encode {
            collection: collection.name(),
            source,
        })
    }
}

/// Structural check of a layout blob: `version` present and `sections` an object.
///
/// Geometry values are not inspected.
pub fn validate_layout(doc: &Value) -> bool {
    let Some(object) = doc.as_object() else {
        return false;
    };
    let has_version = object
        .get("version")
        .is_some_and(|version| !version.is_null());
    let has_sections = object.get("sections").is_some_and(Value::is_object);
    has_version && has_sections
}

/// Handle to the persistent store. Cheap to share behind an `Arc`.
///
/// The state lock is never held across an await: every mutation updates the
/// in-memory collections and releases it. Writes to disk are serialized by a
/// separate async lock and always encode the latest state, so interleaved
/// writers cannot leave an older snapshot on disk.
#[derive(Debug)]
pub struct LayoutStore {
    config: StoreConfig,
    state: Mutex<Option<Collections>>,
    writing: WriteLock<()>,
}

impl LayoutStore {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
            writing: WriteLock::new(()),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::memory())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Collections>>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Unavailable {
            reason: String::from("store state poisoned"),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_ok_and(|guard| guard.is_some())
    }

    /// Open or create the store. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the directory cannot be created or a collection file is unreadable or corrupt.
    pub async fn init(&self) -> Result<(), StorageError> {
        if self.is_initialized() {
            return Ok(());
        }
        let collections = match &self.config.location {
            StoreLocation::Memory => Collections::default(),
            StoreLocation::Directory(dir) => open_directory(dir).await?,
        };
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(collections);
        }
        Ok(())
    }

    fn with_collections<T, F>(&self, read: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Collections) -> T,
    {
        let guard = self.lock()?;
        guard.as_ref().map(read).ok_or(StorageError::NotInitialized)
    }

    fn mutate<T, F>(&self, mutate: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Collections) -> T,
    {
        let mut guard = self.lock()?;
        let collections = guard.as_mut().ok_or(StorageError::NotInitialized)?;
        Ok(mutate(collections))
    }

    /// Write the current contents of `collection` to disk.
    async fn persist(&self, collection: Collection) -> Result<(), StorageError> {
        let StoreLocation::Directory(dir) = &self.config.location else {
            return Ok(());
        };
        let _writing = self.writing.lock().await;
        let encoded = self.with_collections(|collections| collections.encode(collection))??;
        let path = dir.join(collection.file_name());
        write_atomic(&path, &encoded)
            .await
            .map_err(|err| StorageError::Write {
                collection: collection.name(),
                reason: err.to_string(),
            })?;
        debug!("persisted {} ({} bytes)", collection.name(), encoded.len());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`, or `Write`/`Encode` if persisting fails.
    pub async fn save_layout(&self, key: &LayoutKey, data: Value) -> Result<(), StorageError> {
        self.mutate(|collections| match key {
            LayoutKey::Global => collections.global_layout = Some(data),
            LayoutKey::Character(id) => {
                collections.layouts.insert(id.clone(), data);
            }
        })?;
        self.persist(key.collection()).await
    }

    /// Load a layout blob; an absent key is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`.
    #[allow(clippy::unused_async, reason = "uniform async store interface")]
    pub async fn load_layout(&self, key: &LayoutKey) -> Result<Option<Value>, StorageError> {
        self.with_collections(|collections| match key {
            LayoutKey::Global => collections.global_layout.clone(),
            LayoutKey::Character(id) => collections.layouts.get(id).cloned(),
        })
    }

    /// Remove a layout blob, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`, or `Write` if persisting fails.
    pub async fn remove_layout(&self, key: &LayoutKey) -> Result<bool, StorageError> {
        let existed = self.mutate(|collections| match key {
            LayoutKey::Global => collections.global_layout.take().is_some(),
            LayoutKey::Character(id) => collections.layouts.remove(id).is_some(),
        })?;
        if existed {
            self.persist(key.collection()).await?;
        }
        Ok(existed)
    }

    /// Character ids that have a legacy per-character layout.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`.
    #[allow(clippy::unused_async, reason = "uniform async store interface")]
    pub async fn layout_keys(&self) -> Result<Vec<String>, StorageError> {
        self.with_collections(|collections| collections.layouts.keys().cloned().collect())
    }

    /// Upsert reference items keyed by exact name.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`, or `Write`/`Encode` if persisting fails.
    pub async fn save_spells(&self, items: &[Spell]) -> Result<(), StorageError> {
        if items.is_empty() {
            return self.with_collections(|_| ());
        }
        self.mutate(|collections| {
            for item in items {
                collections
                    .spell_cache
                    .insert(item.name.clone(), item.clone());
            }
        })?;
        self.persist(Collection::SpellCache).await
    }

    /// Point lookup by exact, case-sensitive name.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`.
    #[allow(clippy::unused_async, reason = "uniform async store interface")]
    pub async fn get_spell(&self, name: &str) -> Result<Option<Spell>, StorageError> {
        self.with_collections(|collections| collections.spell_cache.get(name).cloned())
    }

    /// Every cached item, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`.
    #[allow(clippy::unused_async, reason = "uniform async store interface")]
    pub async fn get_all_spells(&self) -> Result<Vec<Spell>, StorageError> {
        self.with_collections(|collections| collections.spell_cache.values().cloned().collect())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, bytes).await?;
    fs::rename(&staging, path).await
}

fn unavailable(path: &Path, reason: impl Display) -> StorageError {
    StorageError::Unavailable {
        reason: format!("{}: {reason}", path.display()),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| unavailable(path, format!("corrupt collection: {err}"))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(unavailable(path, err)),
    }
}

/// Open a directory store, creating any collection the on-disk schema predates.
/// Existing collection files are read, never rewritten here.
async fn open_directory(dir: &Path) -> Result<Collections, StorageError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|err| unavailable(dir, err))?;

    let meta_path = dir.join(META_FILE);
    let meta: Option<StoreMeta> = read_json(&meta_path).await?;
    let on_disk_schema = meta.as_ref().map_or(0, |found| found.schema);
    if on_disk_schema > STORE_SCHEMA_VERSION {
        warn!(
            "store schema {on_disk_schema} is newer than {STORE_SCHEMA_VERSION}; unknown collections are left alone"
        );
    }

    let mut collections = Collections::default();
    for collection in Collection::ALL {
        let path = dir.join(collection.file_name());
        let found = match collection {
            Collection::Layouts => read_json(&path)
                .await?
                .map(|layouts| collections.layouts = layouts),
            Collection::GlobalLayout => read_json(&path)
                .await?
                .map(|global| collections.global_layout = global),
            Collection::SpellCache => read_json(&path)
                .await?
                .map(|spells| collections.spell_cache = spells),
        };
        if found.is_none() {
            info!(
                "creating collection {} (store schema {on_disk_schema} -> {STORE_SCHEMA_VERSION})",
                collection.name()
            );
            let encoded = collections.encode(collection)?;
            write_atomic(&path, &encoded)
                .await
                .map_err(|err| unavailable(&path, err))?;
        }
    }

    if on_disk_schema < STORE_SCHEMA_VERSION {
        let upgraded = StoreMeta {
            schema: STORE_SCHEMA_VERSION,
            collections: Collection::ALL
                .iter()
                .map(|collection| collection.name().to_owned())
                .collect(),
        };
        let encoded = serde_json::to_vec_pretty(&upgraded).map_err(|source| StorageError::Encode {
            collection: META_FILE,
            source,
        })?;
        write_atomic(&meta_path, &encoded)
            .await
            .map_err(|err| unavailable(&meta_path, err))?;
    }

    debug!(
        "opened store at {} ({} layouts, {} cached spells)",
        dir.display(),
        collections.layouts.len(),
        collections.spell_cache.len()
    );
    Ok(collections)
}
