//! Scan -> JSON -> apply -> scan reproduces the same document.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::assertions_on_result_states,
    clippy::let_underscore_must_use,
    clippy::tests_outside_test_module,
    reason = "Test code may unwrap and panic for simplicity"
)]

use std::collections::BTreeMap;

use print_layout::{
    LayoutConfig, LayoutDocument, OperandRef, PrintSheet, Px, SectionDefault, SectionGeometry,
    apply, scan,
};

const PAGE: &str = concat!(
    "<html><body><div id=\"sheet\">",
    "<section id=\"actions\"><h2>Actions</h2><p>Longsword +5</p></section>",
    "<section id=\"features\"><h3>Features</h3><p>Darkvision</p></section>",
    "<section id=\"stats\"><div class=\"stats__content\"><div>STR 10</div><div>DEX 16</div></div></section>",
    "</div></body></html>"
);

fn config() -> LayoutConfig {
    LayoutConfig {
        default_sections: vec![SectionDefault {
            id: String::from("ps-section-stats"),
            region_id: Some(String::from("stats")),
            title: String::from("Abilities"),
            geometry: SectionGeometry::at(0, 0).sized(300, 120),
        }],
        ..LayoutConfig::default()
    }
}

fn fresh_sheet() -> PrintSheet {
    let mut sheet = PrintSheet::from_html(PAGE, config()).unwrap();
    sheet.install_default_sections().unwrap();
    sheet
}

/// Build an arrangement that exercises every record kind except references.
fn arranged_sheet() -> PrintSheet {
    let mut sheet = fresh_sheet();
    sheet
        .set_geometry("ps-section-stats", &SectionGeometry::at(12, 480))
        .unwrap();
    sheet.set_inner_width("ps-section-stats", "0:1", Px(96.0)).unwrap();
    sheet.set_border_style("ps-section-stats", Some("ornate")).unwrap();

    let actions = sheet.extract_by_id("actions", None).unwrap();
    let features = sheet.extract_by_id("features", None).unwrap();
    sheet.merge(&features.floating_id, &actions.floating_id).unwrap();
    sheet
        .set_geometry(&actions.floating_id, &SectionGeometry::at(340, 16))
        .unwrap();
    sheet.set_border_style(&actions.floating_id, Some("double")).unwrap();

    sheet
        .create_clone(
            Some(String::from("ps-clone-notes")),
            "Notes",
            "<p>Remember the map</p>",
            &SectionGeometry::at(400, 300).sized(200, 80),
        )
        .unwrap();
    sheet
        .add_shape("assets/divider.svg", &SectionGeometry::at(0, 620).sized(600, 24))
        .unwrap();
    sheet
}

/// Absorbed ids per floating element.
fn associated_ids(sheet: &PrintSheet) -> BTreeMap<String, Vec<String>> {
    sheet
        .registry()
        .entries()
        .map(|entry| {
            let absorbed = entry
                .associated
                .iter()
                .map(|item| item.floating_id.clone())
                .collect();
            (entry.id.clone(), absorbed)
        })
        .collect()
}

#[test]
fn scan_apply_scan_is_stable() {
    let arranged = arranged_sheet();
    let original = scan(&arranged);
    let json = original.to_json_pretty().unwrap();
    let decoded = LayoutDocument::from_json(&json).unwrap();
    assert_eq!(decoded, original);

    let mut restored = fresh_sheet();
    let report = apply(&mut restored, &decoded).unwrap();
    assert!(report.is_clean(), "dropped: {:?}", report.dropped);
    assert!(report.pending.is_empty());

    assert_eq!(scan(&restored), original);
    assert_eq!(associated_ids(&restored), associated_ids(&arranged));
}

/// Elements created after a reload never reuse an id a stored merge still names.
#[test]
fn elements_added_after_a_reload_survive_the_next_one() {
    let mut sheet = fresh_sheet();
    let scratch = sheet
        .create_clone(None, "Scratch", "<p>old notes</p>", &SectionGeometry::default())
        .unwrap();
    sheet.merge(&scratch, "ps-section-stats").unwrap();
    let first = scan(&sheet);

    let mut reloaded = fresh_sheet();
    assert!(apply(&mut reloaded, &first).unwrap().is_clean());
    let added = reloaded
        .create_clone(None, "Fresh", "<p>new notes</p>", &SectionGeometry::default())
        .unwrap();
    assert_ne!(added, scratch);
    let second = scan(&reloaded);

    let mut again = fresh_sheet();
    let report = apply(&mut again, &second).unwrap();
    assert!(report.is_clean(), "dropped: {:?}", report.dropped);
    assert_eq!(again.floating_ids(), ["ps-section-stats", added.as_str()]);
    let html = again.to_html();
    assert!(html.contains("old notes"));
    assert!(html.contains("new notes"));
    assert_eq!(scan(&again), second);
    assert_eq!(associated_ids(&again), associated_ids(&reloaded));
    assert_eq!(associated_ids(&again)["ps-section-stats"], [scratch]);
}

#[test]
fn scanned_document_has_expected_shape() {
    let doc = scan(&arranged_sheet());

    assert_eq!(doc.sections.len(), 4);
    let stats = &doc.sections["ps-section-stats"];
    assert_eq!(stats.left, Some(Px(12.0)));
    assert_eq!(stats.top, Some(Px(480.0)));
    assert_eq!(stats.border_style.as_deref(), Some("ornate"));
    assert_eq!(stats.inner_widths.get("0:1"), Some(&Px(96.0)));

    assert_eq!(doc.extractions.len(), 1);
    let extraction = &doc.extractions[0];
    assert_eq!(extraction.original_id, "actions");
    assert!(extraction.html.contains("Longsword +5"));
    // absorbed content belongs to the merge record, not to the snapshot
    assert!(!extraction.html.contains("Darkvision"));

    assert_eq!(doc.merges.len(), 1);
    assert!(matches!(
        &doc.merges[0].source,
        OperandRef::Sheet { id, .. } if id == "features"
    ));

    assert_eq!(doc.clones.len(), 1);
    assert_eq!(doc.clones[0].width, Some(Px(200.0)));
    assert_eq!(doc.shapes.len(), 1);
    assert_eq!(doc.shapes[0].asset_path, "assets/divider.svg");
}

#[test]
fn pixel_values_serialize_as_strings() {
    let doc = scan(&arranged_sheet());
    let value = doc.to_value().unwrap();
    assert_eq!(value["sections"]["ps-section-stats"]["left"], "12px");
    assert_eq!(value["clones"][0]["height"], "80px");
}
