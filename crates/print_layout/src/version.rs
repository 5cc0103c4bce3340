//! Layout document schema versions.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// Version written into every scanned document.
pub const LAYOUT_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 3, 0);

/// A `major.minor.patch` triple compared numerically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a version (expected major.minor.patch)")]
pub struct VersionParseError(pub String);

/// How a document version relates to [`LAYOUT_SCHEMA_VERSION`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compatibility {
    Current,
    /// Written by an older schema; never applied.
    Older,
    /// Written by a newer schema; applied on a best-effort basis.
    Newer,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn compatibility(self) -> Compatibility {
        match self.cmp(&LAYOUT_SCHEMA_VERSION) {
            Ordering::Less => Compatibility::Older,
            Ordering::Equal => Compatibility::Current,
            Ordering::Greater => Compatibility::Newer,
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = VersionParseError;

    /// Missing minor/patch components read as zero; a leading `v` is ignored.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionParseError(text.to_owned());
        let trimmed = text.trim();
        let bare = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        // pre-release and build suffixes do not take part in the comparison
        let core_part = bare.split(['-', '+']).next().unwrap_or_default();
        let mut parts = core_part.split('.');
        let mut next = |required: bool| -> Result<u32, VersionParseError> {
            match parts.next() {
                Some(part) => part.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let version = Self::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
