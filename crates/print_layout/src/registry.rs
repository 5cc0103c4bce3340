//! Authoritative bookkeeping for floating elements.
//!
//! The DOM is a projection of this registry: every floating element in the
//! container has exactly one [`FloatingEntry`], every hidden host element has
//! exactly one original record, and the merge log lists the merges that built
//! the current arrangement, in order.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::LayoutError;
use crate::model::MergeRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatingKind {
    Section,
    Clone,
    Extraction,
    Shape,
    Reference,
}

impl FloatingKind {
    pub const ALL: [Self; 5] = [
        Self::Section,
        Self::Clone,
        Self::Extraction,
        Self::Shape,
        Self::Reference,
    ];

    /// Class that identifies the kind in the DOM.
    pub const fn marker_class(self) -> &'static str {
        match self {
            Self::Section => "ps-section",
            Self::Clone => "ps-clone",
            Self::Extraction => "ps-extraction",
            Self::Shape => "ps-shape",
            Self::Reference => "ps-spell",
        }
    }

    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Section => "ps-section",
            Self::Clone => "ps-clone",
            Self::Extraction => "ps-extract",
            Self::Shape => "ps-shape",
            Self::Reference => "ps-spell",
        }
    }

    /// Everything but built-in sections.
    pub const fn is_user_created(self) -> bool {
        !matches!(self, Self::Section)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Clone => "clone",
            Self::Extraction => "extraction",
            Self::Shape => "shape",
            Self::Reference => "reference",
        }
    }
}

/// An absorbed merge source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Associated {
    pub floating_id: String,
    /// Host element to unhide on rollback; `None` for clones and reference content.
    pub original_id: Option<String>,
}

/// Rendering state of a reference-content element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceState {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloatingEntry {
    pub id: String,
    pub kind: FloatingKind,
    pub title: String,
    pub original_id: Option<String>,
    pub ref_key: Option<String>,
    pub ref_state: Option<ReferenceState>,
    pub asset_path: Option<String>,
    /// Absorbed merge sources, transitively, in merge order.
    pub associated: Vec<Associated>,
    pub border_style: Option<String>,
}

impl FloatingEntry {
    pub fn new(id: impl Into<String>, kind: FloatingKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            original_id: None,
            ref_key: None,
            ref_state: None,
            asset_path: None,
            associated: Vec::new(),
            border_style: None,
        }
    }

    /// Host elements this entry keeps hidden: its own original, then absorbed ones.
    pub fn originals(&self) -> Vec<String> {
        self.original_id
            .iter()
            .chain(self.associated.iter().filter_map(|item| item.original_id.as_ref()))
            .cloned()
            .collect()
    }

    /// This entry's id plus every absorbed id.
    pub fn family_ids(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        ids.extend(self.associated.iter().map(|item| item.floating_id.clone()));
        ids
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginalState {
    /// Hidden and shown inside `floating_id`.
    Extracted { floating_id: String },
    /// Extracted into `floating_id`, which was then merged into `into`.
    Merged { floating_id: String, into: String },
}

impl OriginalState {
    /// The live floating element that currently holds the content.
    pub fn holder(&self) -> &str {
        match self {
            Self::Extracted { floating_id } => floating_id,
            Self::Merged { into, .. } => into,
        }
    }
}

/// A hidden host element and the inline `display` it had before hiding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalRecord {
    pub state: OriginalState,
    pub prior_display: Option<String>,
}

#[derive(Debug, Default)]
pub struct ContentRegistry {
    entries: BTreeMap<String, FloatingEntry>,
    originals: BTreeMap<String, OriginalRecord>,
    merges: Vec<MergeRecord>,
    /// Every id ever registered or reserved; never minted again.
    spent: BTreeSet<String>,
    next_serial: u64,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `DuplicateId` if an entry with the same id exists.
    pub fn insert(&mut self, entry: FloatingEntry) -> Result<(), LayoutError> {
        if self.entries.contains_key(&entry.id) {
            return Err(LayoutError::DuplicateId(entry.id));
        }
        self.reserve_id(&entry.id);
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Keep `id` from being minted, and move the serial past its numeric suffix.
    ///
    /// Merged-away and rolled-back ids stay reserved: a stored merge record may
    /// still name them.
    pub fn reserve_id(&mut self, id: &str) {
        if let Some(serial) = id
            .rsplit_once('-')
            .and_then(|(_, suffix)| suffix.parse::<u64>().ok())
        {
            self.next_serial = self.next_serial.max(serial);
        }
        self.spent.insert(id.to_owned());
    }

    pub fn is_reserved(&self, id: &str) -> bool {
        self.spent.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&FloatingEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut FloatingEntry> {
        self.entries.get_mut(id)
    }

    /// # Errors
    ///
    /// Returns `UnknownElement` if there is no such entry.
    pub fn entry(&self, id: &str) -> Result<&FloatingEntry, LayoutError> {
        self.get(id)
            .ok_or_else(|| LayoutError::UnknownElement(id.to_owned()))
    }

    /// # Errors
    ///
    /// Returns `UnknownElement` if there is no such entry.
    pub fn entry_mut(&mut self, id: &str) -> Result<&mut FloatingEntry, LayoutError> {
        self.get_mut(id)
            .ok_or_else(|| LayoutError::UnknownElement(id.to_owned()))
    }

    pub fn remove(&mut self, id: &str) -> Option<FloatingEntry> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FloatingEntry> {
        self.entries.values()
    }

    pub fn ids_of_kind(&self, kind: FloatingKind) -> Vec<String> {
        self.entries
            .values()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Next `{prefix}-{n}` that is not reserved and for which `taken` is false.
    pub fn mint_id<F>(&mut self, prefix: &str, taken: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        loop {
            self.next_serial += 1;
            let candidate = format!("{prefix}-{}", self.next_serial);
            if !self.spent.contains(&candidate) && !taken(&candidate) {
                return candidate;
            }
        }
    }

    // -----------------------
    // Originals
    // -----------------------

    pub fn original(&self, original_id: &str) -> Option<&OriginalRecord> {
        self.originals.get(original_id)
    }

    pub fn originals(&self) -> impl Iterator<Item = (&String, &OriginalRecord)> {
        self.originals.iter()
    }

    /// # Errors
    ///
    /// Returns `AlreadyExtracted` if the original is already tracked.
    pub fn mark_extracted(
        &mut self,
        original_id: &str,
        floating_id: &str,
        prior_display: Option<String>,
    ) -> Result<(), LayoutError> {
        if self.originals.contains_key(original_id) {
            return Err(LayoutError::AlreadyExtracted(original_id.to_owned()));
        }
        self.originals.insert(
            original_id.to_owned(),
            OriginalRecord {
                state: OriginalState::Extracted {
                    floating_id: floating_id.to_owned(),
                },
                prior_display,
            },
        );
        Ok(())
    }

    /// Point an extracted or merged original at its new holder.
    pub fn mark_merged(&mut self, original_id: &str, floating_id: &str, into: &str) {
        if let Some(record) = self.originals.get_mut(original_id) {
            record.state = OriginalState::Merged {
                floating_id: floating_id.to_owned(),
                into: into.to_owned(),
            };
        }
    }

    /// Forget an original, returning its record if it was tracked.
    pub fn release_original(&mut self, original_id: &str) -> Option<OriginalRecord> {
        self.originals.remove(original_id)
    }

    // -----------------------
    // Merge log
    // -----------------------

    pub fn merges(&self) -> &[MergeRecord] {
        &self.merges
    }

    pub fn record_merge(&mut self, record: MergeRecord) {
        self.reserve_id(record.source.floating_id());
        self.reserve_id(record.target.floating_id());
        self.merges.push(record);
    }

    /// Drop every merge record that touches any of `floating_ids`.
    pub fn drop_merges_involving(&mut self, floating_ids: &[String]) -> usize {
        let before = self.merges.len();
        self.merges
            .retain(|record| !floating_ids.iter().any(|id| record.involves(id)));
        before - self.merges.len()
    }

    pub fn clear_merges(&mut self) {
        self.merges.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test code may use unwrap for simplicity")]
mod tests {
    use super::*;
    use crate::model::OperandRef;

    fn floating(id: &str) -> OperandRef {
        OperandRef::Floating {
            id: id.to_owned(),
            title: None,
            html: None,
        }
    }

    #[test]
    fn minted_ids_skip_taken_names() {
        let mut registry = ContentRegistry::new();
        registry
            .insert(FloatingEntry::new("ps-clone-1", FloatingKind::Clone, "A"))
            .unwrap();
        let id = registry.mint_id("ps-clone", |candidate| candidate == "ps-clone-2");
        assert_eq!(id, "ps-clone-3");
        assert!(matches!(
            registry.insert(FloatingEntry::new("ps-clone-1", FloatingKind::Clone, "B")),
            Err(LayoutError::DuplicateId(_))
        ));
    }

    #[test]
    fn removed_and_reserved_ids_are_never_minted() {
        let mut registry = ContentRegistry::new();
        registry
            .insert(FloatingEntry::new("ps-clone-1", FloatingKind::Clone, "A"))
            .unwrap();
        registry.remove("ps-clone-1");
        registry.reserve_id("ps-spell-7");
        assert!(registry.is_reserved("ps-clone-1"));
        assert_eq!(registry.mint_id("ps-clone", |_| false), "ps-clone-8");
    }

    #[test]
    fn originals_cannot_be_extracted_twice() {
        let mut registry = ContentRegistry::new();
        registry.mark_extracted("spells", "ps-extract-1", None).unwrap();
        assert!(matches!(
            registry.mark_extracted("spells", "ps-extract-2", None),
            Err(LayoutError::AlreadyExtracted(_))
        ));
        registry.mark_merged("spells", "ps-extract-1", "ps-section-a");
        assert_eq!(
            registry.original("spells").map(|record| record.state.holder()),
            Some("ps-section-a")
        );
        assert!(registry.release_original("spells").is_some());
        assert!(registry.release_original("spells").is_none());
    }

    #[test]
    fn dropping_merges_matches_either_side() {
        let mut registry = ContentRegistry::new();
        registry.record_merge(MergeRecord {
            source: floating("a"),
            target: floating("b"),
        });
        registry.record_merge(MergeRecord {
            source: floating("c"),
            target: floating("d"),
        });
        assert_eq!(registry.drop_merges_involving(&[String::from("b")]), 1);
        assert_eq!(registry.merges().len(), 1);
    }
}
