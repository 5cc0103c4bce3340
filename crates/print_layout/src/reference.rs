//! Reference content: loading placeholders, asynchronous fetch, rendering.
//!
//! Resolution is split in two so no borrow of the sheet is held across an
//! await: [`fetch_all`] only talks to the cache, [`PrintSheet::render_reference`]
//! only touches the DOM.

use anyhow::Error;
use futures::future::join_all;
use html::{Document, NodeId};
use log::{debug, warn};
use spell_cache::{ReferenceCache, ReferenceError, Spell, SpellSource};

use crate::error::LayoutError;
use crate::floating::REF_KEY_ATTR;
use crate::registry::ReferenceState;
use crate::sheet::PrintSheet;

pub(crate) const LOADING_CLASS: &str = "ps-loading";
pub(crate) const ERROR_CLASS: &str = "ps-error";
pub(crate) const RETRY_CLASS: &str = "ps-retry";

/// A reference element waiting for its content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReference {
    pub floating_id: String,
    pub ref_key: String,
}

/// What happened to one pending reference.
#[derive(Debug)]
pub struct ReferenceResolution {
    pub pending: PendingReference,
    pub outcome: Result<(), LayoutError>,
}

/// Id of the node that receives the rendered content. It keeps this id when
/// the element is merged elsewhere.
pub(crate) fn slot_id(floating_id: &str) -> String {
    format!("{floating_id}-ref")
}

fn paragraph(dom: &mut Document, parent: NodeId, class: &str, text: &str) -> Result<NodeId, Error> {
    let node = dom.create_element("p");
    dom.set_attr(node, "class", class);
    let content = dom.create_text(text);
    dom.append_child(node, content)?;
    dom.append_child(parent, node)?;
    Ok(node)
}

pub(crate) fn render_loading(dom: &mut Document, slot: NodeId, ref_key: &str) -> Result<(), Error> {
    dom.clear_children(slot);
    paragraph(dom, slot, LOADING_CLASS, &format!("Loading {ref_key}…"))?;
    Ok(())
}

fn render_failed(dom: &mut Document, slot: NodeId, ref_key: &str, reason: &str) -> Result<(), Error> {
    dom.clear_children(slot);
    paragraph(dom, slot, ERROR_CLASS, &format!("Could not load {ref_key}: {reason}"))?;
    let retry = dom.create_element("button");
    dom.set_attr(retry, "class", RETRY_CLASS);
    dom.set_attr(retry, "type", "button");
    dom.set_attr(retry, REF_KEY_ATTR, ref_key);
    let label = dom.create_text("Retry");
    dom.append_child(retry, label)?;
    dom.append_child(slot, retry)
}

fn render_spell(dom: &mut Document, slot: NodeId, spell: &Spell) -> Result<(), Error> {
    dom.clear_children(slot);
    let mut facts = Vec::new();
    match spell.level {
        Some(0) => facts.push(String::from("Cantrip")),
        Some(level) => facts.push(format!("Level {level}")),
        None => {}
    }
    if let Some(school) = spell.school.as_deref().filter(|school| !school.is_empty()) {
        facts.push(school.to_owned());
    }
    if let Some(range) = spell.range.as_deref().filter(|range| !range.is_empty()) {
        facts.push(format!("Range {range}"));
    }
    if !facts.is_empty() {
        paragraph(dom, slot, "ps-spell-meta", &facts.join(" · "))?;
    }
    for chunk in spell
        .description
        .split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
    {
        paragraph(dom, slot, "ps-spell-text", chunk)?;
    }
    Ok(())
}

/// Fetch every pending reference concurrently.
pub async fn fetch_all<S: SpellSource>(
    cache: &ReferenceCache<S>,
    pending: &[PendingReference],
) -> Vec<Result<Spell, ReferenceError>> {
    join_all(
        pending
            .iter()
            .map(|item| cache.fetch_with_cache(&item.ref_key)),
    )
    .await
}

impl PrintSheet {
    /// Render a fetch outcome into a reference element's slot.
    ///
    /// Returns `Ok(false)` when the element no longer exists; a rollback that
    /// raced the fetch is not an error.
    ///
    /// # Errors
    ///
    /// Returns a DOM error if the slot cannot be rewritten.
    pub fn render_reference(
        &mut self,
        pending: &PendingReference,
        outcome: &Result<Spell, ReferenceError>,
    ) -> Result<bool, LayoutError> {
        let Some(slot) = self.dom.element_by_id(&slot_id(&pending.floating_id)) else {
            debug!("reference `{}` vanished before it loaded", pending.floating_id);
            return Ok(false);
        };
        let state = match outcome {
            Ok(spell) => {
                render_spell(&mut self.dom, slot, spell)?;
                ReferenceState::Ready
            }
            Err(err) => {
                warn!("reference `{}` failed: {err}", pending.ref_key);
                render_failed(&mut self.dom, slot, &pending.ref_key, &err.to_string())?;
                ReferenceState::Failed(err.to_string())
            }
        };
        // merged-away sources have no entry of their own any more
        if let Some(entry) = self.registry.get_mut(&pending.floating_id) {
            entry.ref_state = Some(state);
        }
        Ok(true)
    }
}
