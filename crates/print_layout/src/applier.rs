//! [`LayoutDocument`] -> live DOM.
//!
//! Applying is idempotent: everything a previous apply created is rolled back
//! first. A document from an older schema is refused before anything is
//! touched. After that, no single element can abort the pass; failures are
//! collected as [`DroppedEntry`] values.

use std::collections::BTreeSet;

use log::{info, warn};
use tracing::info_span;

use crate::error::LayoutError;
use crate::model::{LayoutDocument, SectionGeometry};
use crate::reference::PendingReference;
use crate::registry::FloatingKind;
use crate::sheet::PrintSheet;
use crate::version::{Compatibility, LAYOUT_SCHEMA_VERSION, SchemaVersion};

/// A document entry that could not be restored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedEntry {
    /// `section`, `clone`, `extraction`, `shape`, `reference` or `merge`.
    pub kind: &'static str,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub dropped: Vec<DroppedEntry>,
    /// Reference elements created in their loading state; their content is
    /// fetched after `apply` returns.
    pub pending: Vec<PendingReference>,
    /// Set when the document came from a newer schema.
    pub newer_version: Option<SchemaVersion>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Refuse documents from older schemas; warn about newer ones.
///
/// # Errors
///
/// - `InvalidDocument` if the version string does not parse
/// - `VersionMismatch` if the document predates the current schema
pub fn check_version(doc: &LayoutDocument) -> Result<Compatibility, LayoutError> {
    let found = doc
        .version
        .parse::<SchemaVersion>()
        .map_err(|err| LayoutError::InvalidDocument(err.to_string()))?;
    let compatibility = found.compatibility();
    match compatibility {
        Compatibility::Older => {
            warn!(
                "layout version {found} is older than {LAYOUT_SCHEMA_VERSION}; refusing to apply it"
            );
            return Err(LayoutError::VersionMismatch {
                found,
                current: LAYOUT_SCHEMA_VERSION,
            });
        }
        Compatibility::Newer => warn!(
            "layout version {found} is newer than {LAYOUT_SCHEMA_VERSION}; unknown fields are ignored"
        ),
        Compatibility::Current => {}
    }
    Ok(compatibility)
}

/// Rebuild the arrangement described by `doc` on `sheet`.
///
/// # Errors
///
/// Returns the version errors of [`check_version`] before touching the sheet,
/// and an error if resetting the previous arrangement fails. Per-element
/// failures are reported in [`ApplyReport::dropped`] instead.
pub fn apply(sheet: &mut PrintSheet, doc: &LayoutDocument) -> Result<ApplyReport, LayoutError> {
    let _span = info_span!("layout.apply").entered();
    let compatibility = check_version(doc)?;
    sheet.reset()?;

    let mut pass = Pass {
        sheet,
        doc,
        report: ApplyReport::default(),
    };
    if compatibility == Compatibility::Newer {
        pass.report.newer_version = doc.version.parse::<SchemaVersion>().ok();
    }
    pass.reserve_ids();
    pass.sections()?;
    pass.clones();
    pass.extractions();
    pass.shapes();
    pass.references();
    pass.merges();
    pass.stale_sections();

    let report = pass.report;
    info!(
        "applied layout {} ({} dropped, {} references pending)",
        doc.version,
        report.dropped.len(),
        report.pending.len()
    );
    Ok(report)
}

struct Pass<'sheet, 'doc> {
    sheet: &'sheet mut PrintSheet,
    doc: &'doc LayoutDocument,
    report: ApplyReport,
}

impl Pass<'_, '_> {
    fn drop_entry(&mut self, kind: &'static str, id: &str, err: &LayoutError) {
        warn!("dropped {kind} `{id}`: {err}");
        self.report.dropped.push(DroppedEntry {
            kind,
            id: id.to_owned(),
            reason: err.to_string(),
        });
    }

    /// Stored geometry for `id`, with the record's own fields as fallback.
    fn geometry_for(&self, id: &str, fallback: &SectionGeometry) -> SectionGeometry {
        self.doc
            .sections
            .get(id)
            .cloned()
            .unwrap_or_default()
            .with_fallback(fallback)
    }

    /// Border style and inner widths, once the element exists.
    fn decorate(&mut self, id: &str, geometry: &SectionGeometry) -> Result<(), LayoutError> {
        match geometry.border_style.as_deref() {
            Some(style) if !self.sheet.config().is_border_style(style) => {
                warn!("`{id}` uses unknown border style `{style}`; left undecorated");
                self.sheet.apply_border_style(id, None)?;
            }
            style => self.sheet.apply_border_style(id, style)?,
        }
        self.sheet.apply_inner_widths(id, &geometry.inner_widths, false)
    }

    /// Ids named anywhere in the document must not be minted for new elements,
    /// even those that end up dropped or merged away.
    fn reserve_ids(&mut self) {
        let doc = self.doc;
        let named = doc
            .sections
            .keys()
            .map(String::as_str)
            .chain(doc.clones.iter().map(|record| record.id.as_str()))
            .chain(doc.extractions.iter().map(|record| record.id.as_str()))
            .chain(doc.shapes.iter().map(|record| record.id.as_str()))
            .chain(doc.spell_details.iter().map(|pointer| pointer.id.as_str()))
            .chain(doc.merges.iter().flat_map(|record| {
                [record.source.floating_id(), record.target.floating_id()]
            }));
        for id in named {
            self.sheet.registry.reserve_id(id);
        }
    }

    fn sections(&mut self) -> Result<(), LayoutError> {
        let doc = self.doc;
        for (id, geometry) in &doc.sections {
            if self.sheet.kind_of(id) != Some(FloatingKind::Section) {
                continue;
            }
            self.sheet.set_geometry(id, geometry)?;
            self.decorate(id, geometry)?;
        }
        Ok(())
    }

    fn clones(&mut self) {
        let doc = self.doc;
        for record in &doc.clones {
            let fallback = SectionGeometry {
                left: record.left,
                top: record.top,
                width: record.width,
                height: record.height,
                ..SectionGeometry::default()
            };
            let geometry = self.geometry_for(&record.id, &fallback);
            let created = self
                .sheet
                .create_clone(Some(record.id.clone()), &record.title, &record.html, &geometry)
                .and_then(|id| self.decorate(&id, &geometry));
            if let Err(err) = created {
                self.drop_entry("clone", &record.id, &err);
            }
        }
    }

    fn extractions(&mut self) {
        let doc = self.doc;
        for record in &doc.extractions {
            let fallback = SectionGeometry {
                left: record.left,
                top: record.top,
                ..SectionGeometry::default()
            };
            let geometry = self.geometry_for(&record.id, &fallback);
            let title = Some(record.title.as_str()).filter(|title| !title.trim().is_empty());
            let sheet = &mut *self.sheet;
            let created = sheet.host_element(&record.original_id).and_then(|element| {
                let html = if record.html.trim().is_empty() {
                    sheet.snapshot_html(element)?
                } else {
                    record.html.clone()
                };
                sheet.extract_with_html(element, Some(record.id.clone()), title, &html, &geometry)
            });
            if let Err(err) = created.and_then(|_| self.decorate(&record.id, &geometry)) {
                self.drop_entry("extraction", &record.id, &err);
            }
        }
    }

    fn shapes(&mut self) {
        let doc = self.doc;
        for record in &doc.shapes {
            let fallback = SectionGeometry {
                left: record.left,
                top: record.top,
                width: record.width,
                height: record.height,
                z_index: record.z_index,
                ..SectionGeometry::default()
            };
            let geometry = self.geometry_for(&record.id, &fallback);
            let created = self
                .sheet
                .create_shape(Some(record.id.clone()), &record.asset_path, &geometry)
                .and_then(|id| self.decorate(&id, &geometry));
            if let Err(err) = created {
                self.drop_entry("shape", &record.id, &err);
            }
        }
    }

    fn references(&mut self) {
        let doc = self.doc;
        for pointer in &doc.spell_details {
            let fallback = SectionGeometry {
                left: pointer.left,
                top: pointer.top,
                ..SectionGeometry::default()
            };
            let geometry = self.geometry_for(&pointer.id, &fallback);
            let created = self
                .sheet
                .create_reference(Some(pointer.id.clone()), &pointer.ref_key, &geometry);
            match created {
                Ok(pending) => {
                    if let Err(err) = self.decorate(&pointer.id, &geometry) {
                        self.drop_entry("reference", &pointer.id, &err);
                    }
                    self.report.pending.push(pending);
                }
                Err(err) => self.drop_entry("reference", &pointer.id, &err),
            }
        }
    }

    fn merges(&mut self) {
        let doc = self.doc;
        for record in &doc.merges {
            match self.sheet.merge_operands(&record.source, &record.target) {
                Ok(pending) => self.report.pending.extend(pending),
                Err(err) => {
                    let id = format!(
                        "{} -> {}",
                        record.source.floating_id(),
                        record.target.floating_id()
                    );
                    self.drop_entry("merge", &id, &err);
                }
            }
        }
    }

    /// Geometry records that matched nothing.
    fn stale_sections(&mut self) {
        let consumed: BTreeSet<&str> = self
            .doc
            .merges
            .iter()
            .map(|record| record.source.floating_id())
            .collect();
        let stale: Vec<String> = self
            .doc
            .sections
            .keys()
            .filter(|id| !self.sheet.registry().contains(id) && !consumed.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            self.drop_entry("section", &id, &LayoutError::UnknownElement(id.clone()));
        }
    }
}
