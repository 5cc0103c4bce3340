//! Extraction, merge and rollback lifecycle on a small character sheet.
//!
//! Every test starts from the same page and checks both the registry and the
//! DOM, since the DOM is only ever a projection of the registry.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::assertions_on_result_states,
    clippy::let_underscore_must_use,
    clippy::tests_outside_test_module,
    reason = "Test code may unwrap and panic for simplicity"
)]

use print_layout::{
    DragMode, DragSession, FloatingKind, LayoutConfig, LayoutError, PrintSheet, Px,
    SectionGeometry, TitleSource, apply, scan,
};

const PAGE: &str = concat!(
    "<html><head><title>Sheet</title></head><body>",
    "<div id=\"sheet\">",
    "<section id=\"actions\"><h2>Actions</h2><div class=\"ps-label\">Attack</div>",
    "<p>Longsword +5</p><button>Roll</button></section>",
    "<section id=\"features\"><h3>Features</h3><p>Darkvision</p>",
    "<span class=\"no-print\">edit</span></section>",
    "<section id=\"notes\"><p>Remember the map</p></section>",
    "</div></body></html>"
);

fn sheet() -> PrintSheet {
    let _ = env_logger::builder().is_test(true).try_init();
    PrintSheet::from_html(PAGE, LayoutConfig::default()).unwrap()
}

fn is_hidden(sheet: &PrintSheet, id: &str) -> bool {
    let node = sheet.dom().element_by_id(id).unwrap();
    sheet.dom().style(node, "display").as_deref() == Some("none")
}

fn border_classes(sheet: &PrintSheet, id: &str) -> Vec<String> {
    let node = sheet.floating_node(id).unwrap();
    sheet
        .dom()
        .classes(node)
        .into_iter()
        .filter(|class| class.starts_with("ps-border-"))
        .collect()
}

/// Extraction hides the original and shows a sanitized copy.
#[test]
fn extraction_hides_original_and_sanitizes_copy() {
    let mut sheet = sheet();
    let extracted = sheet.extract_by_id("actions", None).unwrap();

    assert_eq!(extracted.title, "Actions");
    assert_eq!(extracted.title_source, TitleSource::Heuristic);
    assert!(is_hidden(&sheet, "actions"));

    let node = sheet.floating_node(&extracted.floating_id).unwrap();
    let html = sheet.dom().outer_html(node);
    assert!(html.contains("Longsword +5"));
    assert!(!html.contains("<button"));
    assert!(!html.contains("id=\"actions\""));
    assert_eq!(sheet.kind_of(&extracted.floating_id), Some(FloatingKind::Extraction));
}

#[test]
fn untitled_extraction_falls_back_to_placeholder() {
    let mut sheet = sheet();
    let extracted = sheet.extract_by_id("notes", None).unwrap();
    assert_eq!(extracted.title, "Untitled");
    assert_eq!(extracted.title_source, TitleSource::Fallback);

    let suggested = sheet.extract_by_id("features", Some("  Traits ")).unwrap();
    assert_eq!(suggested.title, "Traits");
    assert_eq!(suggested.title_source, TitleSource::Suggested);
}

/// An element without an id gets one minted for this page only.
#[test]
fn extractions_of_id_less_elements_do_not_survive_a_reload() {
    let mut sheet = sheet();
    let notes = sheet.dom().element_by_id("notes").unwrap();
    let paragraph = sheet.dom().descendants_with_tag(notes, "p")[0];
    let extracted = sheet.extract(paragraph, None).unwrap();
    assert!(extracted.original_id.starts_with("ps-orig-"), "{}", extracted.original_id);
    assert!(is_hidden(&sheet, &extracted.original_id));

    let doc = scan(&sheet);
    let mut reloaded = self::sheet();
    let report = apply(&mut reloaded, &doc).unwrap();
    assert!(report.dropped.iter().any(|entry| {
        entry.kind == "extraction" && entry.id == extracted.floating_id
    }));
    assert!(reloaded.floating_ids().is_empty());
}

#[test]
fn non_printable_elements_are_dropped() {
    let mut sheet = sheet();
    let extracted = sheet.extract_by_id("features", None).unwrap();
    let node = sheet.floating_node(&extracted.floating_id).unwrap();
    assert!(!sheet.dom().outer_html(node).contains("edit"));
}

#[test]
fn an_original_is_extracted_at_most_once() {
    let mut sheet = sheet();
    sheet.extract_by_id("actions", None).unwrap();
    let again = sheet.extract_by_id("actions", None);
    assert!(matches!(again, Err(LayoutError::AlreadyExtracted(id)) if id == "actions"));
    assert_eq!(sheet.floating_ids().len(), 1);
}

#[test]
fn missing_original_is_reported() {
    let mut sheet = sheet();
    let missing = sheet.extract_by_id("spells", None);
    assert!(matches!(missing, Err(LayoutError::OriginalNotFound(id)) if id == "spells"));
    assert!(sheet.registry().is_empty());
}

/// Rolling back a merge target unhides every original it absorbed.
#[test]
fn rollback_restores_every_absorbed_original() {
    let mut sheet = sheet();
    let actions = sheet.extract_by_id("actions", None).unwrap();
    let features = sheet.extract_by_id("features", None).unwrap();
    let notes = sheet.extract_by_id("notes", Some("Notes")).unwrap();
    sheet.merge(&features.floating_id, &actions.floating_id).unwrap();
    sheet.merge(&actions.floating_id, &notes.floating_id).unwrap();
    assert_eq!(sheet.floating_ids(), vec![notes.floating_id.clone()]);

    let mut restored = sheet.rollback(&notes.floating_id).unwrap();
    restored.sort();
    assert_eq!(restored, ["actions", "features", "notes"]);
    for id in ["actions", "features", "notes"] {
        assert!(!is_hidden(&sheet, id), "{id} is still hidden");
    }
    assert!(sheet.floating_ids().is_empty());
    assert!(sheet.registry().is_empty());
    assert!(sheet.registry().merges().is_empty());
    assert_eq!(sheet.registry().originals().count(), 0);
}

/// Merging an element that already absorbed others never nests wrappers.
#[test]
fn merge_wrappers_never_nest() {
    let mut sheet = sheet();
    let geometry = SectionGeometry::default();
    let first = sheet.create_clone(None, "First", "<p>one</p>", &geometry).unwrap();
    let second = sheet.create_clone(None, "Second", "<p>two</p>", &geometry).unwrap();
    let third = sheet.create_clone(None, "Third", "<p>three</p>", &geometry).unwrap();

    sheet.merge(&second, &first).unwrap();
    sheet.merge(&first, &third).unwrap();

    let node = sheet.floating_node(&third).unwrap();
    let dom = sheet.dom();
    assert_eq!(dom.descendants_with_class(node, "ps-merge-wrapper").len(), 1);
    let blocks = dom.descendants_with_class(node, "ps-block");
    assert_eq!(blocks.len(), 3);
    assert!(blocks.iter().all(|block| dom.descendants_with_class(*block, "ps-block").is_empty()));
    let owners: Vec<&str> = blocks
        .iter()
        .filter_map(|block| dom.attr(*block, "data-block-owner"))
        .collect();
    assert_eq!(owners, [third.as_str(), first.as_str(), second.as_str()]);

    let titles: Vec<String> = dom
        .descendants_with_class(node, "ps-block-title")
        .into_iter()
        .map(|title| dom.text_content(title))
        .collect();
    assert_eq!(titles, ["First", "Second"]);
}

/// Extracting a merge wrapper yields its blocks' content, never another wrapper.
#[test]
fn extracting_a_merge_wrapper_flattens_it() {
    let mut sheet = sheet();
    let geometry = SectionGeometry::default();
    let first = sheet.create_clone(None, "First", "<p>one</p>", &geometry).unwrap();
    let second = sheet.create_clone(None, "Second", "<p>two</p>", &geometry).unwrap();
    sheet.merge(&second, &first).unwrap();

    let host = sheet.floating_node(&first).unwrap();
    let wrapper = sheet.dom().descendants_with_class(host, "ps-merge-wrapper")[0];
    let paragraph = sheet.dom().descendants_with_tag(host, "p")[0];
    assert!(matches!(
        sheet.extract(paragraph, None),
        Err(LayoutError::OriginalNotFound(_))
    ));

    let extracted = sheet.extract(wrapper, Some("Bundle")).unwrap();
    assert_eq!(extracted.title, "Bundle");
    assert!(is_hidden(&sheet, &extracted.original_id));

    let node = sheet.floating_node(&extracted.floating_id).unwrap();
    let dom = sheet.dom();
    assert!(dom.descendants_with_class(node, "ps-merge-wrapper").is_empty());
    assert!(dom.descendants_with_class(node, "ps-block").is_empty());
    let body = dom.descendants_with_class(node, "ps-body")[0];
    let top: Vec<String> = dom
        .element_children(body)
        .into_iter()
        .map(|child| dom.text_content(child))
        .collect();
    assert_eq!(top, ["one", "Second", "two"]);

    assert!(matches!(
        sheet.extract(wrapper, None),
        Err(LayoutError::AlreadyExtracted(_))
    ));
    let restored = sheet.rollback(&extracted.floating_id).unwrap();
    assert_eq!(restored, [extracted.original_id.clone()]);
    assert!(!is_hidden(&sheet, &extracted.original_id));
}

#[test]
fn invalid_merges_are_refused_without_side_effects() {
    let mut sheet = sheet();
    let clone = sheet
        .create_clone(None, "Clone", "<p>x</p>", &SectionGeometry::default())
        .unwrap();
    let shape = sheet
        .add_shape("assets/divider.svg", &SectionGeometry::default())
        .unwrap();

    assert!(matches!(sheet.merge(&clone, &clone), Err(LayoutError::InvalidMerge(_))));
    assert!(matches!(sheet.merge(&shape, &clone), Err(LayoutError::InvalidMerge(_))));
    assert!(matches!(sheet.merge(&clone, &shape), Err(LayoutError::InvalidMerge(_))));
    assert!(matches!(sheet.merge(&clone, "nope"), Err(LayoutError::UnknownElement(_))));
    assert_eq!(sheet.floating_ids().len(), 2);
    assert!(sheet.registry().merges().is_empty());
}

#[test]
fn sections_release_merges_but_survive_rollback() {
    let mut sheet = sheet();
    sheet
        .install_section("ps-section-summary", "Summary", "<p>Level 3 rogue</p>", &SectionGeometry::default())
        .unwrap();
    let actions = sheet.extract_by_id("actions", None).unwrap();
    sheet.merge(&actions.floating_id, "ps-section-summary").unwrap();
    assert!(matches!(
        sheet.merge("ps-section-summary", &actions.floating_id),
        Err(LayoutError::UnknownElement(_))
    ));

    let restored = sheet.rollback("ps-section-summary").unwrap();
    assert_eq!(restored, ["actions"]);
    assert!(!is_hidden(&sheet, "actions"));
    assert_eq!(sheet.floating_ids(), ["ps-section-summary"]);

    let node = sheet.floating_node("ps-section-summary").unwrap();
    let html = sheet.dom().inner_html(node);
    assert!(html.contains("Level 3 rogue"));
    assert!(!html.contains("ps-merge-wrapper"));
    assert!(!html.contains("Longsword"));
}

/// Exactly one border class is present at any time.
#[test]
fn border_styles_are_exclusive() {
    let mut sheet = sheet();
    let clone = sheet
        .create_clone(None, "Clone", "<p>x</p>", &SectionGeometry::default())
        .unwrap();

    sheet.set_border_style(&clone, Some("solid")).unwrap();
    sheet.set_border_style(&clone, Some("dashed")).unwrap();
    assert_eq!(border_classes(&sheet, &clone), ["ps-border-dashed"]);

    let unknown = sheet.set_border_style(&clone, Some("glitter"));
    assert!(unknown.is_err());
    assert_eq!(border_classes(&sheet, &clone), ["ps-border-dashed"]);

    sheet.set_border_style(&clone, None).unwrap();
    assert!(border_classes(&sheet, &clone).is_empty());
    assert_eq!(sheet.registry().get(&clone).unwrap().border_style, None);
}

#[test]
fn duplicate_flattens_merged_content_and_cascades() {
    let mut sheet = sheet();
    let actions = sheet.extract_by_id("actions", None).unwrap();
    let features = sheet.extract_by_id("features", None).unwrap();
    sheet.merge(&features.floating_id, &actions.floating_id).unwrap();

    let copy = sheet.duplicate(&actions.floating_id).unwrap();
    assert_eq!(sheet.kind_of(&copy), Some(FloatingKind::Clone));
    let node = sheet.floating_node(&copy).unwrap();
    let html = sheet.dom().inner_html(node);
    assert!(html.contains("Longsword +5"));
    assert!(html.contains("Darkvision"));
    assert!(!html.contains("ps-merge-wrapper"));

    // default placement is 24,24
    assert_eq!(sheet.dom().style(node, "left").as_deref(), Some("40px"));
    assert_eq!(sheet.dom().style(node, "top").as_deref(), Some("40px"));

    // the duplicate owns no original, so rolling it back unhides nothing
    assert!(sheet.rollback(&copy).unwrap().is_empty());
    assert!(is_hidden(&sheet, "actions"));
}

#[test]
fn reset_clears_everything_user_created() {
    let mut sheet = sheet();
    sheet
        .install_section("ps-section-summary", "Summary", "<p>Level 3 rogue</p>", &SectionGeometry::at(0, 0))
        .unwrap();
    let actions = sheet.extract_by_id("actions", None).unwrap();
    sheet
        .create_clone(None, "Clone", "<p>x</p>", &SectionGeometry::default())
        .unwrap();
    sheet.merge(&actions.floating_id, "ps-section-summary").unwrap();
    sheet.set_border_style("ps-section-summary", Some("double")).unwrap();

    sheet.reset().unwrap();

    assert_eq!(sheet.floating_ids(), ["ps-section-summary"]);
    assert!(!is_hidden(&sheet, "actions"));
    assert!(border_classes(&sheet, "ps-section-summary").is_empty());
    assert!(sheet.registry().merges().is_empty());
}

#[test]
fn drag_session_moves_and_raises() {
    let mut sheet = sheet();
    let clone = sheet
        .create_clone(None, "Clone", "<p>x</p>", &SectionGeometry::at(100, 100).sized(200, 100))
        .unwrap();
    let other = sheet
        .create_clone(None, "Other", "<p>y</p>", &SectionGeometry::at(0, 0))
        .unwrap();
    sheet.bring_to_front(&other).unwrap();

    let session = DragSession::begin(&sheet, &clone, DragMode::Move).unwrap();
    assert_eq!(session.preview(10.0, 5.0).left, Some(Px(110.0)));
    let placed = session.finish(&mut sheet, 10.0, 5.0).unwrap();
    assert_eq!(placed.z_index, Some(2));

    let node = sheet.floating_node(&clone).unwrap();
    assert_eq!(sheet.dom().style(node, "left").as_deref(), Some("110px"));
    assert_eq!(sheet.dom().style(node, "top").as_deref(), Some("105px"));
    assert_eq!(sheet.dom().style(node, "width").as_deref(), Some("200px"));

    let session = DragSession::begin(&sheet, &clone, DragMode::Move).unwrap();
    session.drop_onto(&mut sheet, &other).unwrap();
    assert_eq!(sheet.floating_ids(), [other]);
}

#[test]
fn inner_widths_address_structural_children() {
    let mut sheet = sheet();
    let clone = sheet
        .create_clone(
            None,
            "Stats",
            "<div class=\"stats__content\"><div>STR</div><div>DEX</div></div>",
            &SectionGeometry::default(),
        )
        .unwrap();
    sheet.set_inner_width(&clone, "0:1", Px(80.0)).unwrap();
    assert!(sheet.set_inner_width(&clone, "0:5", Px(80.0)).is_err());
    assert!(sheet.set_inner_width(&clone, "bogus", Px(80.0)).is_err());

    let node = sheet.floating_node(&clone).unwrap();
    let dex = sheet.dom().descendants_with_tag(node, "div").into_iter().find(|div| {
        sheet.dom().text_content(*div) == "DEX"
    });
    assert_eq!(sheet.dom().style(dex.unwrap(), "width").as_deref(), Some("80px"));
}
