//! The persisted layout document.
//!
//! Field names follow the stored JSON: collections are snake case
//! (`spell_details`, `spell_cache`), record fields camel case (`originalId`,
//! `zIndex`). Every collection defaults to empty when absent.

use std::collections::BTreeMap;

use layout_store::Spell;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::LayoutError;
use crate::px::Px;
use crate::version::LAYOUT_SCHEMA_VERSION;

/// Geometry and decoration of one floating element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionGeometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Px>,
    #[serde(
        default,
        deserialize_with = "lenient_z_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub z_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<String>,
    /// Structural position key (`"<container>:<child>"`) to pixel width.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inner_widths: BTreeMap<String, Px>,
}

impl SectionGeometry {
    #[must_use]
    pub fn at(left: impl Into<Px>, top: impl Into<Px>) -> Self {
        Self {
            left: Some(left.into()),
            top: Some(top.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sized(mut self, width: impl Into<Px>, height: impl Into<Px>) -> Self {
        self.width = Some(width.into());
        self.height = Some(height.into());
        self
    }

    /// Fill unset position and size fields from `fallback`.
    #[must_use]
    pub fn with_fallback(mut self, fallback: &Self) -> Self {
        self.left = self.left.or(fallback.left);
        self.top = self.top.or(fallback.top);
        self.width = self.width.or(fallback.width);
        self.height = self.height.or(fallback.height);
        self.z_index = self.z_index.or(fallback.z_index);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Px>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub id: String,
    pub original_id: String,
    #[serde(default)]
    pub title: String,
    /// Empty means "re-snapshot the live original".
    #[serde(default)]
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Px>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRecord {
    pub id: String,
    pub asset_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Px>,
    #[serde(
        default,
        deserialize_with = "lenient_z_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub z_index: Option<i32>,
}

/// A reference-content element. Only the pointer is stored, never the rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellPointer {
    pub id: String,
    #[serde(alias = "spellName")]
    pub ref_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Px>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Px>,
}

/// One side of a recorded merge, with enough to find or rebuild it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OperandRef {
    /// A host page element, extracted under `floating_id`.
    Sheet {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        floating_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    /// A section or clone.
    Floating {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        html: Option<String>,
    },
    /// A reference-content element.
    Reference {
        id: String,
        #[serde(alias = "spellName")]
        ref_key: String,
    },
}

impl OperandRef {
    /// Id of the floating element this operand stands for.
    pub fn floating_id(&self) -> &str {
        match self {
            Self::Sheet {
                id, floating_id, ..
            } => floating_id.as_deref().unwrap_or(id),
            Self::Floating { id, .. } | Self::Reference { id, .. } => id,
        }
    }

    /// Host page element id, for sheet operands.
    pub fn original_id(&self) -> Option<&str> {
        match self {
            Self::Sheet { id, .. } => Some(id),
            Self::Floating { .. } | Self::Reference { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub source: OperandRef,
    pub target: OperandRef,
}

impl MergeRecord {
    pub fn involves(&self, floating_id: &str) -> bool {
        self.source.floating_id() == floating_id || self.target.floating_id() == floating_id
    }
}

/// The unit of persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub version: String,
    #[serde(default)]
    pub sections: BTreeMap<String, SectionGeometry>,
    #[serde(default)]
    pub clones: Vec<CloneRecord>,
    #[serde(default)]
    pub extractions: Vec<ExtractionRecord>,
    #[serde(default)]
    pub merges: Vec<MergeRecord>,
    #[serde(default)]
    pub shapes: Vec<ShapeRecord>,
    #[serde(default)]
    pub spell_details: Vec<SpellPointer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spell_cache: Vec<Spell>,
}

impl Default for LayoutDocument {
    fn default() -> Self {
        Self {
            version: LAYOUT_SCHEMA_VERSION.to_string(),
            sections: BTreeMap::new(),
            clones: Vec::new(),
            extractions: Vec::new(),
            merges: Vec::new(),
            shapes: Vec::new(),
            spell_details: Vec::new(),
            spell_cache: Vec::new(),
        }
    }
}

impl LayoutDocument {
    /// Decode a stored blob after the structural check.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if the blob fails the structural check or does
    /// not decode.
    pub fn from_value(value: Value) -> Result<Self, LayoutError> {
        if !layout_store::validate_layout(&value) {
            return Err(LayoutError::InvalidDocument(String::from(
                "expected an object with `version` and a `sections` object",
            )));
        }
        serde_json::from_value(value).map_err(|err| LayoutError::InvalidDocument(err.to_string()))
    }

    /// # Errors
    ///
    /// Returns `InvalidDocument` for malformed JSON or an invalid document.
    pub fn from_json(text: &str) -> Result<Self, LayoutError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| LayoutError::InvalidDocument(err.to_string()))?;
        Self::from_value(value)
    }

    /// # Errors
    ///
    /// Returns `InvalidDocument` if serialization fails.
    pub fn to_value(&self) -> Result<Value, LayoutError> {
        serde_json::to_value(self).map_err(|err| LayoutError::InvalidDocument(err.to_string()))
    }

    /// # Errors
    ///
    /// Returns `InvalidDocument` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, LayoutError> {
        serde_json::to_string_pretty(self).map_err(|err| LayoutError::InvalidDocument(err.to_string()))
    }

    /// Reference keys named by pointers and reference merge operands.
    pub fn reference_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .spell_details
            .iter()
            .map(|pointer| pointer.ref_key.clone())
            .collect();
        for record in &self.merges {
            for operand in [&record.source, &record.target] {
                if let OperandRef::Reference { ref_key, .. } = operand {
                    keys.push(ref_key.clone());
                }
            }
        }
        keys.sort();
        keys.dedup();
        keys
    }
}

fn lenient_z_index<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_i64().and_then(|value| i32::try_from(value).ok()),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test code may use unwrap for simplicity")]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operands_are_tagged_by_kind() {
        let record: MergeRecord = serde_json::from_value(json!({
            "source": {"kind": "reference", "id": "ps-spell-1", "spellName": "Light"},
            "target": {"kind": "sheet", "id": "features", "floatingId": "ps-extract-2"}
        }))
        .unwrap();
        assert_eq!(record.source.floating_id(), "ps-spell-1");
        assert_eq!(record.target.floating_id(), "ps-extract-2");
        assert_eq!(record.target.original_id(), Some("features"));
        let written = serde_json::to_value(&record).unwrap();
        assert_eq!(written["source"]["refKey"], json!("Light"));
        assert_eq!(written["target"]["floatingId"], json!("ps-extract-2"));
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let doc = LayoutDocument::from_value(json!({"version": "1.3.0", "sections": {
            "ps-section-actions": {"left": 10, "top": "20px", "zIndex": "4"}
        }}))
        .unwrap();
        assert!(doc.clones.is_empty() && doc.merges.is_empty() && doc.spell_cache.is_empty());
        let geometry = &doc.sections["ps-section-actions"];
        assert_eq!(geometry.left, Some(Px(10.0)));
        assert_eq!(geometry.z_index, Some(4));
        let written = doc.to_value().unwrap();
        assert_eq!(written["sections"]["ps-section-actions"]["left"], json!("10px"));
        assert!(written.get("spell_cache").is_none());
    }

    #[test]
    fn structurally_invalid_blobs_are_rejected() {
        assert!(matches!(
            LayoutDocument::from_value(json!({"sections": {}})),
            Err(LayoutError::InvalidDocument(_))
        ));
    }
}
