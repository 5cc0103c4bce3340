mod sink;

use crate::dom::Document;
use crate::parser::sink::{Handle, RcSink, SinkData};
use anyhow::{Error, anyhow};
use html5ever::tendril::TendrilSink as _;
use html5ever::{ParseOpts, parse_document as html5ever_parse_document};
use indextree::NodeId;

fn parse_handles(html: &str) -> Result<Handle, Error> {
    html5ever_parse_document(RcSink::default(), ParseOpts::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|err| anyhow!("html parsing failed: {err}"))
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let SinkData::Element { name, .. } = &handle.data {
        if &*name.local == tag {
            return Some(Handle::clone(handle));
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

fn graft_children(document: &mut Document, parent: NodeId, handle: &Handle) -> Result<(), Error> {
    for child in handle.children.borrow().iter() {
        graft(document, parent, child)?;
    }
    Ok(())
}

/// Copy a parsed subtree into the arena under `parent`.
fn graft(document: &mut Document, parent: NodeId, handle: &Handle) -> Result<(), Error> {
    match &handle.data {
        SinkData::Document | SinkData::Skipped => graft_children(document, parent, handle),
        SinkData::Element {
            name,
            attrs,
            template_contents,
        } => {
            let node = document.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                document.set_attr(node, &attr.name.local, &attr.value);
            }
            document.append_child(parent, node)?;
            graft_children(document, node, template_contents.as_ref().unwrap_or(handle))
        }
        SinkData::Text { contents } => {
            let node = document.create_text(&contents.borrow());
            document.append_child(parent, node)
        }
        SinkData::Comment { contents } => {
            let node = document.create_comment(contents);
            document.append_child(parent, node)
        }
    }
}

/// Parse a complete HTML page into a new [`Document`].
///
/// # Errors
///
/// Returns an error if reading the input into the tree sink fails.
pub fn parse_document(html: &str) -> Result<Document, Error> {
    let parsed = parse_handles(html)?;
    let mut document = Document::new();
    let root = document.root();
    graft_children(&mut document, root, &parsed)?;
    Ok(document)
}

/// Parse an HTML fragment and append its body-level nodes to `parent`.
///
/// Returns the newly appended top-level nodes in order.
///
/// # Errors
///
/// Returns an error if the parsed nodes cannot be attached under `parent`.
pub fn parse_fragment_into(
    document: &mut Document,
    parent: NodeId,
    html: &str,
) -> Result<Vec<NodeId>, Error> {
    if !document.exists(parent) {
        return Err(anyhow!("fragment parent no longer exists"));
    }
    let parsed = parse_handles(html)?;
    let before = document.children(parent).len();
    if let Some(body) = find_element(&parsed, "body") {
        graft_children(document, parent, &body)?;
    }
    Ok(document.children(parent).into_iter().skip(before).collect())
}
