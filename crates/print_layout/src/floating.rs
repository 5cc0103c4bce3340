//! DOM shape of floating elements.
//!
//! ```text
//! div#<id>.ps-floating.<marker> [style=position/left/top/width/height/z-index]
//!   div.ps-title
//!   div.ps-body
//!     div.ps-merge-wrapper               (only once something was merged in)
//!       div.ps-block[data-block-owner]   (the element's own content first)
//! ```

use anyhow::Error;
use html::{Document, NodeId};

use crate::config::LayoutConfig;
use crate::model::SectionGeometry;
use crate::px::Px;
use crate::registry::FloatingKind;

pub(crate) const FLOATING_CLASS: &str = "ps-floating";
pub(crate) const TITLE_CLASS: &str = "ps-title";
pub(crate) const BODY_CLASS: &str = "ps-body";
pub(crate) const WRAPPER_CLASS: &str = "ps-merge-wrapper";
pub(crate) const BLOCK_CLASS: &str = "ps-block";
pub(crate) const BLOCK_TITLE_CLASS: &str = "ps-block-title";
pub(crate) const BLOCK_OWNER_ATTR: &str = "data-block-owner";
pub(crate) const ORIGINAL_ATTR: &str = "data-original-id";
pub(crate) const REF_KEY_ATTR: &str = "data-ref-key";
pub(crate) const REF_BODY_CLASS: &str = "ps-ref-body";
pub(crate) const SHAPE_IMAGE_CLASS: &str = "ps-shape-image";

/// Create a detached floating element with an empty body.
pub(crate) fn build(dom: &mut Document, id: &str, kind: FloatingKind, title: &str) -> Result<NodeId, Error> {
    let node = dom.create_element("div");
    dom.set_attr(node, "id", id);
    dom.set_attr(node, "class", &format!("{FLOATING_CLASS} {}", kind.marker_class()));
    dom.set_style(node, "position", "absolute");
    if kind != FloatingKind::Shape {
        let heading = dom.create_element("div");
        dom.set_attr(heading, "class", TITLE_CLASS);
        let text = dom.create_text(title);
        dom.append_child(heading, text)?;
        dom.append_child(node, heading)?;
    }
    let body = dom.create_element("div");
    dom.set_attr(body, "class", BODY_CLASS);
    dom.append_child(node, body)?;
    Ok(node)
}

pub(crate) fn kind_of(dom: &Document, node: NodeId) -> Option<FloatingKind> {
    FloatingKind::ALL
        .into_iter()
        .find(|kind| dom.has_class(node, kind.marker_class()))
}

fn child_with_class(dom: &Document, node: NodeId, class: &str) -> Option<NodeId> {
    dom.element_children(node)
        .into_iter()
        .find(|child| dom.has_class(*child, class))
}

pub(crate) fn body_of(dom: &Document, node: NodeId) -> Option<NodeId> {
    child_with_class(dom, node, BODY_CLASS)
}

pub(crate) fn set_title(dom: &mut Document, node: NodeId, title: &str) -> Result<(), Error> {
    let Some(heading) = child_with_class(dom, node, TITLE_CLASS) else {
        return Ok(());
    };
    dom.clear_children(heading);
    let text = dom.create_text(title);
    dom.append_child(heading, text)
}

pub(crate) fn apply_geometry(dom: &mut Document, node: NodeId, geometry: &SectionGeometry) {
    let lengths = [
        ("left", geometry.left),
        ("top", geometry.top),
        ("width", geometry.width),
        ("height", geometry.height),
    ];
    for (property, value) in lengths {
        if let Some(length) = value {
            dom.set_style(node, property, &length.to_string());
        }
    }
    if let Some(z_index) = geometry.z_index {
        dom.set_style(node, "z-index", &z_index.to_string());
    }
}

/// Position, size and stacking as currently rendered; decoration is not read here.
pub(crate) fn read_geometry(dom: &Document, node: NodeId) -> SectionGeometry {
    let length = |property: &str| dom.style(node, property).and_then(|value| Px::parse(&value));
    SectionGeometry {
        left: length("left"),
        top: length("top"),
        width: length("width"),
        height: length("height"),
        z_index: dom
            .style(node, "z-index")
            .and_then(|value| value.trim().parse().ok()),
        ..SectionGeometry::default()
    }
}

pub(crate) fn wrapper_of(dom: &Document, body: NodeId) -> Option<NodeId> {
    child_with_class(dom, body, WRAPPER_CLASS)
}

pub(crate) fn blocks_of(dom: &Document, wrapper: NodeId) -> Vec<NodeId> {
    dom.element_children(wrapper)
        .into_iter()
        .filter(|child| dom.has_class(*child, BLOCK_CLASS))
        .collect()
}

/// Where the element's own content lives: its own merge block, else the body.
pub(crate) fn own_content_root(dom: &Document, node: NodeId, owner: &str) -> Option<NodeId> {
    let body = body_of(dom, node)?;
    let Some(wrapper) = wrapper_of(dom, body) else {
        return Some(body);
    };
    blocks_of(dom, wrapper)
        .into_iter()
        .find(|block| dom.attr(*block, BLOCK_OWNER_ATTR) == Some(owner))
}

/// Serialized own content, excluding anything absorbed by merges.
pub(crate) fn own_html(dom: &Document, node: NodeId, owner: &str) -> String {
    own_content_root(dom, node, owner)
        .map(|root| dom.inner_html(root))
        .unwrap_or_default()
}

/// Serialized body with any merge wrapper flattened into its blocks' content.
pub(crate) fn flattened_html(dom: &Document, node: NodeId) -> String {
    let Some(body) = body_of(dom, node) else {
        return String::new();
    };
    match wrapper_of(dom, body) {
        Some(wrapper) => wrapper_html(dom, wrapper),
        None => dom.inner_html(body),
    }
}

/// A merge wrapper's content with the wrapper and its blocks unwrapped.
pub(crate) fn wrapper_html(dom: &Document, wrapper: NodeId) -> String {
    dom.children(wrapper)
        .into_iter()
        .map(|child| {
            if dom.has_class(child, BLOCK_CLASS) {
                dom.inner_html(child)
            } else {
                dom.outer_html(child)
            }
        })
        .collect()
}

pub(crate) fn new_block(dom: &mut Document, owner: &str, title: Option<&str>) -> Result<NodeId, Error> {
    let block = dom.create_element("div");
    dom.set_attr(block, "class", BLOCK_CLASS);
    dom.set_attr(block, BLOCK_OWNER_ATTR, owner);
    if let Some(title) = title {
        let heading = dom.create_element("div");
        dom.set_attr(heading, "class", BLOCK_TITLE_CLASS);
        let text = dom.create_text(title);
        dom.append_child(heading, text)?;
        dom.append_child(block, heading)?;
    }
    Ok(block)
}

/// Give an untitled block a block title as its first child.
pub(crate) fn title_block(dom: &mut Document, block: NodeId, title: &str) -> Result<(), Error> {
    let children = dom.element_children(block);
    if children.iter().any(|child| dom.has_class(*child, BLOCK_TITLE_CLASS)) {
        return Ok(());
    }
    let heading = dom.create_element("div");
    dom.set_attr(heading, "class", BLOCK_TITLE_CLASS);
    let text = dom.create_text(title);
    dom.append_child(heading, text)?;
    match dom.children(block).first() {
        Some(first) => dom.insert_before(*first, heading),
        None => dom.append_child(block, heading),
    }
}

/// The body's merge wrapper, created around the current content if missing.
pub(crate) fn ensure_wrapper(dom: &mut Document, body: NodeId, owner: &str) -> Result<NodeId, Error> {
    if let Some(wrapper) = wrapper_of(dom, body) {
        return Ok(wrapper);
    }
    let wrapper = dom.create_element("div");
    dom.set_attr(wrapper, "class", WRAPPER_CLASS);
    let own = new_block(dom, owner, None)?;
    dom.move_children(body, own)?;
    dom.append_child(wrapper, own)?;
    dom.append_child(body, wrapper)?;
    Ok(wrapper)
}

/// Inner structural containers below the element's own content, in document order.
pub(crate) fn structural_containers(
    dom: &Document,
    node: NodeId,
    owner: &str,
    config: &LayoutConfig,
) -> Vec<NodeId> {
    let Some(root) = own_content_root(dom, node, owner) else {
        return Vec::new();
    };
    dom.descendants(root)
        .into_iter()
        .filter(|candidate| {
            dom.classes(*candidate)
                .iter()
                .any(|class| config.is_structural_class(class))
        })
        .collect()
}

/// Resolve an inner-width key (`"<container ordinal>:<child index>"`) to a node.
pub(crate) fn inner_width_target(
    dom: &Document,
    node: NodeId,
    owner: &str,
    config: &LayoutConfig,
    key: &str,
) -> Option<NodeId> {
    let (ordinal, index) = key.split_once(':')?;
    let ordinal: usize = ordinal.trim().parse().ok()?;
    let index: usize = index.trim().parse().ok()?;
    let container = *structural_containers(dom, node, owner, config).get(ordinal)?;
    dom.element_children(container).get(index).copied()
}
