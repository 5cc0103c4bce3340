//! Live DOM -> [`LayoutDocument`].

use html::NodeId;
use log::debug;
use tracing::info_span;

use crate::floating;
use crate::model::{
    CloneRecord, ExtractionRecord, LayoutDocument, SectionGeometry, ShapeRecord, SpellPointer,
};
use crate::px::Px;
use crate::registry::{FloatingEntry, FloatingKind};
use crate::sheet::PrintSheet;

/// Capture the current arrangement.
///
/// Floating elements are visited in container order and classified by their
/// marker class. Every one of them contributes a geometry record; clones and
/// extractions also store their own content, reference elements only a
/// pointer. Merges come from the registry's merge log. The reference cache is
/// not embedded here.
pub fn scan(sheet: &PrintSheet) -> LayoutDocument {
    let _span = info_span!("layout.scan").entered();
    let dom = sheet.dom();
    let mut doc = LayoutDocument::default();

    for node in dom.element_children(sheet.container()) {
        let Some(id) = dom.id_of(node) else {
            continue;
        };
        let Some(kind) = floating::kind_of(dom, node) else {
            continue;
        };
        let Some(entry) = sheet.registry().get(id) else {
            debug!("skipping unregistered floating element `{id}`");
            continue;
        };
        if entry.kind != kind {
            debug!("`{id}` is marked {} but registered as {}", kind.label(), entry.kind.label());
        }
        let geometry = scan_geometry(sheet, node, entry);
        record_content(sheet, node, entry, &geometry, &mut doc);
        doc.sections.insert(id.to_owned(), geometry);
    }

    doc.merges = sheet.registry().merges().to_vec();
    debug!(
        "scanned {} floating elements ({} clones, {} extractions, {} merges)",
        doc.sections.len(),
        doc.clones.len(),
        doc.extractions.len(),
        doc.merges.len()
    );
    doc
}

fn scan_geometry(sheet: &PrintSheet, node: NodeId, entry: &FloatingEntry) -> SectionGeometry {
    let dom = sheet.dom();
    let mut geometry = floating::read_geometry(dom, node);
    geometry.border_style.clone_from(&entry.border_style);
    let containers = floating::structural_containers(dom, node, &entry.id, sheet.config());
    for (ordinal, container) in containers.into_iter().enumerate() {
        for (index, child) in dom.element_children(container).into_iter().enumerate() {
            if let Some(width) = dom.style(child, "width").and_then(|value| Px::parse(&value)) {
                geometry.inner_widths.insert(format!("{ordinal}:{index}"), width);
            }
        }
    }
    geometry
}

fn record_content(
    sheet: &PrintSheet,
    node: NodeId,
    entry: &FloatingEntry,
    geometry: &SectionGeometry,
    doc: &mut LayoutDocument,
) {
    let dom = sheet.dom();
    match entry.kind {
        FloatingKind::Section => {}
        FloatingKind::Clone => doc.clones.push(CloneRecord {
            id: entry.id.clone(),
            title: entry.title.clone(),
            html: floating::own_html(dom, node, &entry.id),
            left: geometry.left,
            top: geometry.top,
            width: geometry.width,
            height: geometry.height,
        }),
        FloatingKind::Extraction => doc.extractions.push(ExtractionRecord {
            id: entry.id.clone(),
            original_id: entry.original_id.clone().unwrap_or_default(),
            title: entry.title.clone(),
            html: floating::own_html(dom, node, &entry.id),
            left: geometry.left,
            top: geometry.top,
        }),
        FloatingKind::Shape => doc.shapes.push(ShapeRecord {
            id: entry.id.clone(),
            asset_path: entry.asset_path.clone().unwrap_or_default(),
            left: geometry.left,
            top: geometry.top,
            width: geometry.width,
            height: geometry.height,
            z_index: geometry.z_index,
        }),
        FloatingKind::Reference => doc.spell_details.push(SpellPointer {
            id: entry.id.clone(),
            ref_key: entry.ref_key.clone().unwrap_or_default(),
            left: geometry.left,
            top: geometry.top,
        }),
    }
}
