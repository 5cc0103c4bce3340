//! Pixel lengths as they appear in inline styles and layout documents.

use core::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A CSS pixel length. Always written as `"<n>px"`; bare numbers and unitless
/// numeric strings are accepted on read.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Px(pub f64);

impl Px {
    pub const ZERO: Self = Self(0.0);

    /// Parse `"12px"`, `"12.5"` or `" 12 px "`. Other units are rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim_end();
        number
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Self)
    }

    #[must_use]
    pub fn offset(self, delta: f64) -> Self {
        Self(self.0 + delta)
    }

    /// Rounded to two decimals; drag arithmetic produces long fractions.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self((self.0 * 100.0).round() / 100.0)
    }
}

impl fmt::Display for Px {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `+ 0.0` folds negative zero
        write!(formatter, "{}px", self.rounded().0 + 0.0)
    }
}

impl From<f64> for Px {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<i32> for Px {
    fn from(value: i32) -> Self {
        Self(f64::from(value))
    }
}

impl Serialize for Px {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct PxVisitor;

impl Visitor<'_> for PxVisitor {
    type Value = Px;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a pixel length such as \"120px\" or a number")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Px, E> {
        Px::parse(value).ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Px, E> {
        Ok(Px(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Px, E> {
        Ok(Px(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Px, E> {
        Ok(Px(value as f64))
    }
}

impl<'de> Deserialize<'de> for Px {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PxVisitor)
    }
}
