//! Extraction, cloning, merging and rollback.
//!
//! A tracked host element moves through `Live -> Extracted -> Merged` and back
//! to `Live` on rollback. Every operation here leaves the registry and the DOM
//! consistent before it returns, including on error.

use std::collections::BTreeMap;

use html::NodeId;
use log::{debug, info, warn};

use crate::error::LayoutError;
use crate::floating::{self, ORIGINAL_ATTR, REF_BODY_CLASS, REF_KEY_ATTR, SHAPE_IMAGE_CLASS};
use crate::model::{MergeRecord, OperandRef, SectionGeometry};
use crate::px::Px;
use crate::reference::{self, PendingReference};
use crate::registry::{Associated, FloatingEntry, FloatingKind, ReferenceState};
use crate::sheet::PrintSheet;

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Where an extraction's title came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TitleSource {
    /// Supplied by the caller.
    Suggested,
    /// First heading or label inside the element.
    Heuristic,
    /// The configured placeholder; a UI should prompt for a better one.
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extracted {
    pub floating_id: String,
    pub original_id: String,
    pub title: String,
    pub title_source: TitleSource,
}

/// Outcome of resolving one merge operand.
struct Resolved {
    floating_id: String,
    /// Created just now rather than found live.
    synthesized: bool,
    pending: Option<PendingReference>,
}

/// Whether a live entry is the element a merge operand describes.
fn operand_matches(operand: &OperandRef, live: &FloatingEntry) -> bool {
    match operand {
        OperandRef::Sheet { id, .. } => {
            live.kind == FloatingKind::Extraction && live.original_id.as_deref() == Some(id.as_str())
        }
        OperandRef::Floating { .. } => matches!(
            live.kind,
            FloatingKind::Clone | FloatingKind::Section | FloatingKind::Shape
        ),
        OperandRef::Reference { ref_key, .. } => {
            live.kind == FloatingKind::Reference && live.ref_key.as_deref() == Some(ref_key.as_str())
        }
    }
}

impl PrintSheet {
    // -----------------------
    // Creation
    // -----------------------

    fn register(&mut self, node: NodeId, entry: FloatingEntry, geometry: &SectionGeometry) -> Result<(), LayoutError> {
        if self.id_in_use(&entry.id) {
            self.dom.remove(node);
            return Err(LayoutError::DuplicateId(entry.id));
        }
        let geometry = geometry.clone().with_fallback(&self.config.placement);
        floating::apply_geometry(&mut self.dom, node, &geometry);
        self.place(node)?;
        debug!("created {} `{}`", entry.kind.label(), entry.id);
        self.registry.insert(entry)
    }

    fn fresh_id(&mut self, requested: Option<String>, kind: FloatingKind) -> String {
        requested.unwrap_or_else(|| self.mint_id(kind))
    }

    /// Build a detached floating element whose body holds `html`.
    fn build_with_html(&mut self, id: &str, kind: FloatingKind, title: &str, html: &str) -> Result<NodeId, LayoutError> {
        let node = floating::build(&mut self.dom, id, kind, title)?;
        if let Some(body) = floating::body_of(&self.dom, node) {
            if let Err(err) = self.dom.set_inner_html(body, html) {
                self.dom.remove(node);
                return Err(err.into());
            }
        }
        Ok(node)
    }

    /// Install a built-in section holding `html`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if `id` is already used on the page.
    pub fn install_section(
        &mut self,
        id: &str,
        title: &str,
        html: &str,
        geometry: &SectionGeometry,
    ) -> Result<(), LayoutError> {
        if self.id_in_use(id) {
            return Err(LayoutError::DuplicateId(id.to_owned()));
        }
        let node = self.build_with_html(id, FloatingKind::Section, title, html)?;
        self.register(node, FloatingEntry::new(id, FloatingKind::Section, title), geometry)
    }

    /// Install every configured section that does not exist yet, filling each
    /// from its host region when one is configured and present.
    ///
    /// # Errors
    ///
    /// Returns an error if a section cannot be built or its id is taken.
    pub fn install_default_sections(&mut self) -> Result<Vec<String>, LayoutError> {
        let mut installed = Vec::new();
        for section in self.config.default_sections.clone() {
            if self.registry.contains(&section.id) {
                continue;
            }
            let html = match section.region_id.as_deref() {
                Some(region) => match self.host_element(region) {
                    Ok(node) => self.snapshot_html(node)?,
                    Err(err) => {
                        warn!("section `{}` starts empty: {err}", section.id);
                        String::new()
                    }
                },
                None => String::new(),
            };
            self.install_section(&section.id, &section.title, &html, &section.geometry)?;
            installed.push(section.id);
        }
        Ok(installed)
    }

    /// Create a self-contained clone from already rendered HTML.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` for a taken id, or a DOM error if `html` cannot be parsed.
    pub fn create_clone(
        &mut self,
        id: Option<String>,
        title: &str,
        html: &str,
        geometry: &SectionGeometry,
    ) -> Result<String, LayoutError> {
        let id = self.fresh_id(id, FloatingKind::Clone);
        let node = self.build_with_html(&id, FloatingKind::Clone, title, html)?;
        self.register(node, FloatingEntry::new(&id, FloatingKind::Clone, title), geometry)?;
        Ok(id)
    }

    /// Snapshot a floating element into a new clone, offset from the source.
    /// Merged content is flattened into plain blocks.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `floating_id` is not live.
    pub fn duplicate(&mut self, floating_id: &str) -> Result<String, LayoutError> {
        let node = self.floating_node(floating_id)?;
        let title = self.registry.entry(floating_id)?.title.clone();
        let html = self.sanitized_fragment(&floating::flattened_html(&self.dom, node))?;
        let offset = self.config.cascade_offset.0;
        let source = floating::read_geometry(&self.dom, node);
        let geometry = SectionGeometry {
            left: source.left.map(|left| left.offset(offset)),
            top: source.top.map(|top| top.offset(offset)),
            width: source.width,
            height: source.height,
            ..SectionGeometry::default()
        };
        let id = self.create_clone(None, &title, &html, &geometry)?;
        info!("duplicated `{floating_id}` as `{id}`");
        Ok(id)
    }

    /// Place a decorative image.
    ///
    /// # Errors
    ///
    /// Returns a DOM error if the element cannot be placed.
    pub fn add_shape(&mut self, asset_path: &str, geometry: &SectionGeometry) -> Result<String, LayoutError> {
        self.create_shape(None, asset_path, geometry)
    }

    pub(crate) fn create_shape(
        &mut self,
        id: Option<String>,
        asset_path: &str,
        geometry: &SectionGeometry,
    ) -> Result<String, LayoutError> {
        let id = self.fresh_id(id, FloatingKind::Shape);
        let node = floating::build(&mut self.dom, &id, FloatingKind::Shape, "")?;
        if let Some(body) = floating::body_of(&self.dom, node) {
            let image = self.dom.create_element("img");
            self.dom.set_attr(image, "class", SHAPE_IMAGE_CLASS);
            self.dom.set_attr(image, "src", asset_path);
            self.dom.set_attr(image, "alt", "");
            self.dom.append_child(body, image)?;
        }
        let mut entry = FloatingEntry::new(&id, FloatingKind::Shape, "");
        entry.asset_path = Some(asset_path.to_owned());
        self.register(node, entry, geometry)?;
        Ok(id)
    }

    /// Open a reference-content element in its loading state.
    ///
    /// The returned pending reference is completed by
    /// [`PrintSheet::render_reference`] once the content is fetched.
    ///
    /// # Errors
    ///
    /// Returns a DOM error if the element cannot be placed.
    pub fn open_reference(&mut self, ref_key: &str, geometry: &SectionGeometry) -> Result<PendingReference, LayoutError> {
        self.create_reference(None, ref_key, geometry)
    }

    pub(crate) fn create_reference(
        &mut self,
        id: Option<String>,
        ref_key: &str,
        geometry: &SectionGeometry,
    ) -> Result<PendingReference, LayoutError> {
        let id = self.fresh_id(id, FloatingKind::Reference);
        let node = floating::build(&mut self.dom, &id, FloatingKind::Reference, ref_key)?;
        self.dom.set_attr(node, REF_KEY_ATTR, ref_key);
        if let Some(body) = floating::body_of(&self.dom, node) {
            let slot = self.dom.create_element("div");
            self.dom.set_attr(slot, "id", &reference::slot_id(&id));
            self.dom.set_attr(slot, "class", REF_BODY_CLASS);
            self.dom.set_attr(slot, REF_KEY_ATTR, ref_key);
            self.dom.append_child(body, slot)?;
            reference::render_loading(&mut self.dom, slot, ref_key)?;
        }
        let mut entry = FloatingEntry::new(&id, FloatingKind::Reference, ref_key);
        entry.ref_key = Some(ref_key.to_owned());
        entry.ref_state = Some(ReferenceState::Loading);
        self.register(node, entry, geometry)?;
        Ok(PendingReference {
            floating_id: id,
            ref_key: ref_key.to_owned(),
        })
    }

    /// Put a failed reference element back into its loading state.
    ///
    /// Works on merged-away references too: their slot keeps its id inside
    /// the merge target and carries the key itself.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if no content slot exists for `floating_id`.
    pub fn retry_reference(&mut self, floating_id: &str) -> Result<PendingReference, LayoutError> {
        let slot = self
            .dom
            .element_by_id(&reference::slot_id(floating_id))
            .ok_or_else(|| LayoutError::UnknownElement(reference::slot_id(floating_id)))?;
        let ref_key = self
            .registry
            .get(floating_id)
            .and_then(|entry| entry.ref_key.clone())
            .or_else(|| self.dom.attr(slot, REF_KEY_ATTR).map(str::to_owned))
            .ok_or_else(|| LayoutError::UnknownElement(format!("{floating_id} (not reference content)")))?;
        reference::render_loading(&mut self.dom, slot, &ref_key)?;
        if let Some(entry) = self.registry.get_mut(floating_id) {
            entry.ref_state = Some(ReferenceState::Loading);
        }
        Ok(PendingReference {
            floating_id: floating_id.to_owned(),
            ref_key,
        })
    }

    // -----------------------
    // Extraction
    // -----------------------

    /// Extract a host element into a new floating element.
    ///
    /// # Errors
    ///
    /// - `AlreadyExtracted` if the element is already shown in a floating element
    /// - `OriginalNotFound` if the element is detached or lies inside the layout
    ///   without being a merge wrapper
    pub fn extract(&mut self, element: NodeId, suggested_title: Option<&str>) -> Result<Extracted, LayoutError> {
        self.extract_as(element, None, suggested_title)
    }

    /// Extract the host element with the given id.
    ///
    /// # Errors
    ///
    /// Returns `OriginalNotFound` unless exactly one host element has the id,
    /// and the errors of [`PrintSheet::extract`].
    pub fn extract_by_id(&mut self, original_id: &str, suggested_title: Option<&str>) -> Result<Extracted, LayoutError> {
        let element = self.host_element(original_id)?;
        self.extract_as(element, None, suggested_title)
    }

    pub(crate) fn extract_as(
        &mut self,
        element: NodeId,
        floating_id: Option<String>,
        suggested_title: Option<&str>,
    ) -> Result<Extracted, LayoutError> {
        let html = if self.is_layout_wrapper(element) {
            let flattened = floating::wrapper_html(&self.dom, element);
            self.sanitized_fragment(&flattened)?
        } else {
            self.snapshot_html(element)?
        };
        self.extract_with_html(element, floating_id, suggested_title, &html, &SectionGeometry::default())
    }

    /// Hide `element` and show `html` in its place as a floating extraction.
    pub(crate) fn extract_with_html(
        &mut self,
        element: NodeId,
        floating_id: Option<String>,
        suggested_title: Option<&str>,
        html: &str,
        geometry: &SectionGeometry,
    ) -> Result<Extracted, LayoutError> {
        if !self.dom.is_element(element) || !self.dom.is_attached(element) {
            return Err(LayoutError::OriginalNotFound(String::from("(detached element)")));
        }
        let wrapper = self.is_layout_wrapper(element);
        if self.dom.contains(self.container(), element) && !wrapper {
            return Err(LayoutError::OriginalNotFound(String::from(
                "(element lies inside the print layout)",
            )));
        }
        let original_id = match self.dom.id_of(element) {
            Some(id) => id.to_owned(),
            None => {
                let dom = &self.dom;
                let minted = self
                    .registry
                    .mint_id("ps-orig", |candidate| dom.element_by_id(candidate).is_some());
                self.dom.set_attr(element, "id", &minted);
                warn!("element had no id; `{minted}` only exists until the page is reloaded");
                minted
            }
        };
        if wrapper {
            warn!("extracting merge wrapper `{original_id}`; it is rebuilt without its id on reload");
        }
        if self.registry.original(&original_id).is_some() {
            return Err(LayoutError::AlreadyExtracted(original_id));
        }

        let (title, title_source) = self.resolve_title(element, suggested_title);
        let id = self.fresh_id(floating_id, FloatingKind::Extraction);
        let node = self.build_with_html(&id, FloatingKind::Extraction, &title, html)?;
        self.dom.set_attr(node, ORIGINAL_ATTR, &original_id);
        let mut entry = FloatingEntry::new(&id, FloatingKind::Extraction, &title);
        entry.original_id = Some(original_id.clone());
        self.register(node, entry, geometry)?;

        let prior_display = self.dom.style(element, "display");
        self.registry.mark_extracted(&original_id, &id, prior_display)?;
        self.dom.set_style(element, "display", "none");
        info!("extracted `{original_id}` as `{id}` ({title_source:?} title)");
        Ok(Extracted {
            floating_id: id,
            original_id,
            title,
            title_source,
        })
    }

    /// A merge wrapper living inside the floating container.
    fn is_layout_wrapper(&self, element: NodeId) -> bool {
        self.dom.has_class(element, floating::WRAPPER_CLASS) && self.dom.contains(self.container(), element)
    }

    fn resolve_title(&self, element: NodeId, suggested: Option<&str>) -> (String, TitleSource) {
        if let Some(title) = suggested.map(str::trim).filter(|title| !title.is_empty()) {
            return (title.to_owned(), TitleSource::Suggested);
        }
        let heuristic = self.dom.descendants(element).into_iter().find_map(|node| {
            let is_heading = self
                .dom
                .tag(node)
                .is_some_and(|tag| HEADING_TAGS.contains(&tag));
            let is_label = self
                .config
                .title_classes
                .iter()
                .any(|class| self.dom.has_class(node, class));
            if !(is_heading || is_label) {
                return None;
            }
            let text = self.dom.text_content(node);
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!collapsed.is_empty()).then_some(collapsed)
        });
        heuristic.map_or_else(
            || (self.config.untitled_label.clone(), TitleSource::Fallback),
            |title| (title, TitleSource::Heuristic),
        )
    }

    /// Printable copy of a host element: interactive controls, non-printable
    /// elements and every `id` removed.
    pub(crate) fn snapshot_html(&mut self, element: NodeId) -> Result<String, LayoutError> {
        let copy = self.dom.deep_clone(element)?;
        self.sanitize(copy);
        // the copy must not inherit the hiding applied to its original
        self.dom.remove_style(copy, "display");
        let html = self.dom.outer_html(copy);
        self.dom.remove(copy);
        Ok(html)
    }

    /// Sanitize an HTML fragment the same way as a snapshot.
    fn sanitized_fragment(&mut self, html: &str) -> Result<String, LayoutError> {
        let scratch = self.dom.create_element("div");
        self.dom.append_html(scratch, html)?;
        self.sanitize(scratch);
        let cleaned = self.dom.inner_html(scratch);
        self.dom.remove(scratch);
        Ok(cleaned)
    }

    fn sanitize(&mut self, root: NodeId) {
        let mut doomed = Vec::new();
        for node in self.dom.descendants(root) {
            if doomed.iter().any(|gone: &NodeId| self.dom.contains(*gone, node)) {
                continue;
            }
            let interactive = self
                .dom
                .tag(node)
                .is_some_and(|tag| self.config.interactive_tags.iter().any(|known| known == tag));
            let non_printable = self
                .config
                .non_printable_classes
                .iter()
                .any(|class| self.dom.has_class(node, class));
            if interactive || non_printable {
                doomed.push(node);
            }
        }
        for node in doomed {
            self.dom.remove(node);
        }
        self.dom.remove_attr(root, "id");
        for node in self.dom.descendants(root) {
            self.dom.remove_attr(node, "id");
        }
    }

    // -----------------------
    // Merging
    // -----------------------

    /// Describe a live floating element as a merge operand.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `floating_id` is not live.
    pub fn describe(&self, floating_id: &str) -> Result<OperandRef, LayoutError> {
        let entry = self.registry.entry(floating_id)?;
        Ok(match entry.kind {
            FloatingKind::Extraction => OperandRef::Sheet {
                id: entry.original_id.clone().unwrap_or_default(),
                floating_id: Some(entry.id.clone()),
                title: Some(entry.title.clone()),
            },
            FloatingKind::Reference => OperandRef::Reference {
                id: entry.id.clone(),
                ref_key: entry.ref_key.clone().unwrap_or_default(),
            },
            FloatingKind::Clone => {
                let node = self.floating_node(floating_id)?;
                OperandRef::Floating {
                    id: entry.id.clone(),
                    title: Some(entry.title.clone()),
                    html: Some(floating::own_html(&self.dom, node, floating_id)),
                }
            }
            FloatingKind::Section | FloatingKind::Shape => OperandRef::Floating {
                id: entry.id.clone(),
                title: Some(entry.title.clone()),
                html: None,
            },
        })
    }

    /// Merge one live floating element into another.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` for a missing operand and `InvalidMerge` for a
    /// self-merge, a section source or a shape operand.
    pub fn merge(&mut self, source_id: &str, target_id: &str) -> Result<(), LayoutError> {
        let record = MergeRecord {
            source: self.describe(source_id)?,
            target: self.describe(target_id)?,
        };
        self.merge_resolved(source_id, target_id)?;
        self.registry.record_merge(record);
        Ok(())
    }

    /// Merge two operands, locating each live or re-synthesizing it first.
    ///
    /// Returns the reference elements synthesized along the way; they still
    /// need their content fetched.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand cannot be found or rebuilt, or the merge is
    /// invalid. Anything rebuilt for it is discarded again first.
    pub fn merge_operands(&mut self, source: &OperandRef, target: &OperandRef) -> Result<Vec<PendingReference>, LayoutError> {
        let target_resolved = self.resolve_operand(target)?;
        let source_resolved = match self.resolve_operand(source) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.discard_synthesized(&target_resolved);
                return Err(err);
            }
        };
        if let Err(err) = self.merge_resolved(&source_resolved.floating_id, &target_resolved.floating_id) {
            self.discard_synthesized(&source_resolved);
            self.discard_synthesized(&target_resolved);
            return Err(err);
        }
        self.registry.record_merge(MergeRecord {
            source: source.clone(),
            target: target.clone(),
        });
        // a consumed reference source lives on as a slot inside the target
        Ok([source_resolved, target_resolved]
            .into_iter()
            .filter_map(|resolved| resolved.pending)
            .filter(|pending| {
                self.dom
                    .element_by_id(&reference::slot_id(&pending.floating_id))
                    .is_some()
            })
            .collect())
    }

    fn discard_synthesized(&mut self, resolved: &Resolved) {
        if !resolved.synthesized {
            return;
        }
        if let Err(err) = self.rollback(&resolved.floating_id) {
            debug!("could not discard `{}`: {err}", resolved.floating_id);
        }
    }

    fn resolve_operand(&mut self, operand: &OperandRef) -> Result<Resolved, LayoutError> {
        let floating_id = operand.floating_id().to_owned();
        if let Some(live) = self.registry.get(&floating_id) {
            if !operand_matches(operand, live) {
                return Err(LayoutError::DuplicateId(format!(
                    "{floating_id} (a live {} holds this id)",
                    live.kind.label()
                )));
            }
            return Ok(Resolved {
                floating_id,
                synthesized: false,
                pending: None,
            });
        }
        match operand {
            OperandRef::Sheet { id, title, .. } => {
                if let Some(record) = self.registry.original(id) {
                    return Ok(Resolved {
                        floating_id: record.state.holder().to_owned(),
                        synthesized: false,
                        pending: None,
                    });
                }
                let element = self.host_element(id)?;
                let extracted = self.extract_as(element, Some(floating_id), title.as_deref())?;
                Ok(Resolved {
                    floating_id: extracted.floating_id,
                    synthesized: true,
                    pending: None,
                })
            }
            OperandRef::Floating { id, title, html } => {
                let Some(html) = html else {
                    return Err(LayoutError::UnknownElement(id.clone()));
                };
                let title = title.clone().unwrap_or_else(|| self.config.untitled_label.clone());
                let created = self.create_clone(Some(id.clone()), &title, html, &SectionGeometry::default())?;
                Ok(Resolved {
                    floating_id: created,
                    synthesized: true,
                    pending: None,
                })
            }
            OperandRef::Reference { id, ref_key } => {
                let pending = self.create_reference(Some(id.clone()), ref_key, &SectionGeometry::default())?;
                Ok(Resolved {
                    floating_id: pending.floating_id.clone(),
                    synthesized: true,
                    pending: Some(pending),
                })
            }
        }
    }

    /// Move `source`'s content into `target` and consume `source`.
    fn merge_resolved(&mut self, source_id: &str, target_id: &str) -> Result<(), LayoutError> {
        if source_id == target_id {
            return Err(LayoutError::InvalidMerge(format!("`{source_id}` cannot merge into itself")));
        }
        let source = self.registry.entry(source_id)?.clone();
        let target_kind = self.registry.entry(target_id)?.kind;
        match (source.kind, target_kind) {
            (FloatingKind::Section, _) => {
                return Err(LayoutError::InvalidMerge(format!(
                    "built-in section `{source_id}` cannot be merged away"
                )));
            }
            (FloatingKind::Shape, _) | (_, FloatingKind::Shape) => {
                return Err(LayoutError::InvalidMerge(String::from("shapes carry no content to merge")));
            }
            _ => {}
        }
        let source_node = self.floating_node(source_id)?;
        let target_node = self.floating_node(target_id)?;
        let (Some(source_body), Some(target_body)) = (
            floating::body_of(&self.dom, source_node),
            floating::body_of(&self.dom, target_node),
        ) else {
            return Err(LayoutError::InvalidMerge(String::from("floating element without a body")));
        };

        let wrapper = floating::ensure_wrapper(&mut self.dom, target_body, target_id)?;
        match floating::wrapper_of(&self.dom, source_body) {
            // absorbed blocks move as they are, so wrappers never nest
            Some(source_wrapper) => {
                for block in floating::blocks_of(&self.dom, source_wrapper) {
                    if self.dom.attr(block, floating::BLOCK_OWNER_ATTR) == Some(source_id) {
                        floating::title_block(&mut self.dom, block, &source.title)?;
                    }
                    self.dom.append_child(wrapper, block)?;
                }
            }
            None => {
                let block = floating::new_block(&mut self.dom, source_id, Some(&source.title))?;
                self.dom.move_children(source_body, block)?;
                self.dom.append_child(wrapper, block)?;
            }
        }

        let target = self.registry.entry_mut(target_id)?;
        target.associated.push(Associated {
            floating_id: source.id.clone(),
            original_id: source.original_id.clone(),
        });
        target.associated.extend(source.associated.iter().cloned());
        if let Some(original) = &source.original_id {
            self.registry.mark_merged(original, source_id, target_id);
        }
        for absorbed in &source.associated {
            if let Some(original) = &absorbed.original_id {
                self.registry
                    .mark_merged(original, &absorbed.floating_id, target_id);
            }
        }

        self.dom.remove(source_node);
        self.registry.remove(source_id);
        info!("merged `{source_id}` into `{target_id}`");
        Ok(())
    }

    // -----------------------
    // Rollback
    // -----------------------

    /// Undo a floating element.
    ///
    /// User-created elements unhide their own original and every absorbed
    /// original, then disappear. Built-in sections only release what they
    /// absorbed. Returns the host element ids made visible again.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `floating_id` is not live.
    pub fn rollback(&mut self, floating_id: &str) -> Result<Vec<String>, LayoutError> {
        let entry = self.registry.entry(floating_id)?.clone();
        if entry.kind == FloatingKind::Section {
            return self.release_merges(floating_id);
        }
        let restored = self.restore_originals(&entry.originals());
        self.registry.drop_merges_involving(&entry.family_ids());
        if let Ok(node) = self.floating_node(floating_id) {
            self.dom.remove(node);
        }
        self.registry.remove(floating_id);
        info!("rolled back `{floating_id}` ({} originals restored)", restored.len());
        Ok(restored)
    }

    /// Give back everything a section absorbed, keeping the section itself.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `section_id` is not live.
    pub fn release_merges(&mut self, section_id: &str) -> Result<Vec<String>, LayoutError> {
        let entry = self.registry.entry(section_id)?.clone();
        let restored = self.restore_originals(&entry.originals());
        self.registry.drop_merges_involving(&entry.family_ids());
        let node = self.floating_node(section_id)?;
        if let Some(body) = floating::body_of(&self.dom, node) {
            if let Some(wrapper) = floating::wrapper_of(&self.dom, body) {
                for block in floating::blocks_of(&self.dom, wrapper) {
                    if self.dom.attr(block, floating::BLOCK_OWNER_ATTR) == Some(section_id) {
                        self.dom.move_children(block, body)?;
                    }
                }
                self.dom.remove(wrapper);
            }
        }
        self.registry.entry_mut(section_id)?.associated.clear();
        Ok(restored)
    }

    /// Unhide host elements. Already restored originals are skipped.
    fn restore_originals(&mut self, originals: &[String]) -> Vec<String> {
        let mut restored = Vec::new();
        for original_id in originals {
            let Some(record) = self.registry.release_original(original_id) else {
                continue;
            };
            match self.original_element(original_id) {
                Ok(element) => {
                    match record.prior_display {
                        Some(display) => self.dom.set_style(element, "display", &display),
                        None => {
                            self.dom.remove_style(element, "display");
                        }
                    }
                    restored.push(original_id.clone());
                }
                Err(err) => warn!("cannot unhide `{original_id}`: {err}"),
            }
        }
        restored
    }

    /// Roll back every user-created element, release section merges and
    /// restore the configured section geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM and registry disagree about a live element.
    pub fn reset(&mut self) -> Result<(), LayoutError> {
        for id in self.floating_ids() {
            let Some(kind) = self.kind_of(&id) else {
                continue;
            };
            if kind.is_user_created() {
                self.rollback(&id)?;
            }
        }
        for id in self.registry.ids_of_kind(FloatingKind::Section) {
            self.release_merges(&id)?;
            let node = self.floating_node(&id)?;
            if let Some(default) = self.config.section_default(&id) {
                floating::apply_geometry(&mut self.dom, node, &default.geometry);
            }
            self.apply_border_style(&id, None)?;
            self.apply_inner_widths(&id, &BTreeMap::new(), true)?;
        }
        // anything still hidden belongs to nothing live
        let leftovers: Vec<String> = self.registry.originals().map(|(id, _)| id.clone()).collect();
        self.restore_originals(&leftovers);
        self.registry.clear_merges();
        debug!("reset print layout");
        Ok(())
    }

    // -----------------------
    // Presentation hooks
    // -----------------------

    /// Apply the set fields of `geometry` (position, size, stacking).
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `floating_id` is not live.
    pub fn set_geometry(&mut self, floating_id: &str, geometry: &SectionGeometry) -> Result<(), LayoutError> {
        let node = self.floating_node(floating_id)?;
        floating::apply_geometry(&mut self.dom, node, geometry);
        Ok(())
    }

    /// Set the single border style, or clear it with `None`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` for a style outside the configured set and
    /// `UnknownElement` for a missing element.
    pub fn set_border_style(&mut self, floating_id: &str, style: Option<&str>) -> Result<(), LayoutError> {
        if let Some(name) = style {
            if !self.config.is_border_style(name) {
                return Err(LayoutError::InvalidDocument(format!("unknown border style `{name}`")));
            }
        }
        self.apply_border_style(floating_id, style)
    }

    pub(crate) fn apply_border_style(&mut self, floating_id: &str, style: Option<&str>) -> Result<(), LayoutError> {
        let node = self.floating_node(floating_id)?;
        let prefix = self.config.border_class_prefix.clone();
        self.dom
            .remove_classes_where(node, |class| class.starts_with(&prefix));
        if let Some(name) = style {
            let class = self.config.border_class(name);
            self.dom.add_class(node, &class);
        }
        self.registry.entry_mut(floating_id)?.border_style = style.map(str::to_owned);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `UnknownElement` if `floating_id` is not live.
    pub fn rename(&mut self, floating_id: &str, title: &str) -> Result<(), LayoutError> {
        let node = self.floating_node(floating_id)?;
        floating::set_title(&mut self.dom, node, title)?;
        self.registry.entry_mut(floating_id)?.title = title.to_owned();
        Ok(())
    }

    /// Width of one child of an inner structural container.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if the element or the inner position is missing.
    pub fn set_inner_width(&mut self, floating_id: &str, key: &str, width: Px) -> Result<(), LayoutError> {
        let node = self.floating_node(floating_id)?;
        let target = floating::inner_width_target(&self.dom, node, floating_id, &self.config, key)
            .ok_or_else(|| LayoutError::UnknownElement(format!("{floating_id} inner position {key}")))?;
        self.dom.set_style(target, "width", &width.to_string());
        Ok(())
    }

    /// Apply stored inner widths. With `clear_others`, widths not listed are removed.
    pub(crate) fn apply_inner_widths(
        &mut self,
        floating_id: &str,
        widths: &BTreeMap<String, Px>,
        clear_others: bool,
    ) -> Result<(), LayoutError> {
        let node = self.floating_node(floating_id)?;
        if clear_others {
            for container in floating::structural_containers(&self.dom, node, floating_id, &self.config) {
                for child in self.dom.element_children(container) {
                    self.dom.remove_style(child, "width");
                }
            }
        }
        for (key, width) in widths {
            if self.set_inner_width(floating_id, key, *width).is_err() {
                debug!("`{floating_id}` has no inner position {key}");
            }
        }
        Ok(())
    }

    /// Raise an element above every other one, returning its new z-index.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `floating_id` is not live.
    pub fn bring_to_front(&mut self, floating_id: &str) -> Result<i32, LayoutError> {
        let node = self.floating_node(floating_id)?;
        let current = floating::read_geometry(&self.dom, node).z_index;
        let top = self.top_z_index();
        if current == Some(top) && top > 0 {
            return Ok(top);
        }
        let raised = top.saturating_add(1);
        self.dom.set_style(node, "z-index", &raised.to_string());
        Ok(raised)
    }
}
