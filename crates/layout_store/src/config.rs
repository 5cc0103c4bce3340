//! Store location configuration.
//!
//! Mirrors the engine configuration pattern: explicit construction for tests,
//! `from_env` for binaries.

use std::env;
use std::path::PathBuf;

/// Where the store keeps its collections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    /// One JSON file per collection inside this directory.
    Directory(PathBuf),
    /// Process-local only; nothing survives the process.
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: StoreLocation,
}

impl StoreConfig {
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::Directory(path.into()),
        }
    }

    #[must_use]
    pub const fn memory() -> Self {
        Self {
            location: StoreLocation::Memory,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `PRINTSHEET_STORE_DIR`: store directory; `memory` selects the in-memory engine
    /// - `XDG_DATA_HOME` / `HOME`: fallback base for `printsheet/` when the above is unset
    ///
    /// Falls back to the in-memory engine when no directory can be derived.
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(dir) = env::var("PRINTSHEET_STORE_DIR") {
            if dir.eq_ignore_ascii_case("memory") {
                return Self::memory();
            }
            if !dir.trim().is_empty() {
                return Self::directory(dir);
            }
        }
        let base = env::var("XDG_DATA_HOME")
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .filter(|value| !value.is_empty())
                    .map(|home| PathBuf::from(home).join(".local").join("share"))
            });
        base.map_or_else(Self::memory, |dir| Self::directory(dir.join("printsheet")))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}
