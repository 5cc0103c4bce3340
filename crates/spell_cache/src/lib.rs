//! Reference content service.
//!
//! [`ReferenceCache::fetch_with_cache`] answers from the store when it can and
//! performs exactly one upstream fetch when it cannot. Upstreams implement
//! [`SpellSource`]; [`HttpSpellSource`] covers `http(s)://` and `file://`
//! endpoints.

mod cache;
mod config;
mod error;
mod source;

pub use cache::ReferenceCache;
pub use config::SpellSourceConfig;
pub use error::{ReferenceError, SourceError};
pub use layout_store::Spell;
pub use source::{HttpSpellSource, SpellPayload, SpellSource};
