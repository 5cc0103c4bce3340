//! Durable, versioned key-value persistence for print layouts.
//!
//! Three logical collections live behind one [`LayoutStore`] handle:
//! `layouts` (legacy per-character blobs), `global_layout` (singleton) and
//! `spell_cache` (reference items keyed by exact name). Schema upgrades only
//! ever add collections.

mod config;
mod error;
mod spell;
mod store;

pub use config::{StoreConfig, StoreLocation};
pub use error::StorageError;
pub use spell::Spell;
pub use store::{Collection, LayoutKey, LayoutStore, STORE_SCHEMA_VERSION, validate_layout};
