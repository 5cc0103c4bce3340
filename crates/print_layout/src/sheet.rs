use anyhow::anyhow;
use html::{Document, NodeId};
use log::{debug, warn};

use crate::config::LayoutConfig;
use crate::error::LayoutError;
use crate::floating::{self, FLOATING_CLASS};
use crate::registry::{ContentRegistry, FloatingKind};

/// The host page together with its floating layer.
///
/// All editing goes through methods on this type so the registry and the DOM
/// never disagree.
#[derive(Debug)]
pub struct PrintSheet {
    pub(crate) dom: Document,
    pub(crate) registry: ContentRegistry,
    pub(crate) config: LayoutConfig,
    container: NodeId,
}

impl PrintSheet {
    /// Wrap a parsed page, creating the floating container under `<body>`.
    ///
    /// A container left over from an earlier session is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the page has no `<body>`.
    pub fn new(mut dom: Document, config: LayoutConfig) -> Result<Self, LayoutError> {
        let body = dom
            .body()
            .ok_or_else(|| anyhow!("page has no <body> to host the print layout"))?;
        for stale in dom.elements_by_id(&config.container_id) {
            warn!("discarding stale print layout container #{}", config.container_id);
            dom.remove(stale);
        }
        let container = dom.create_element("div");
        dom.set_attr(container, "id", &config.container_id);
        dom.set_style(container, "position", "relative");
        dom.append_child(body, container)?;
        Ok(Self {
            dom,
            registry: ContentRegistry::new(),
            config,
            container,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the page cannot be parsed or has no `<body>`.
    pub fn from_html(html: &str, config: LayoutConfig) -> Result<Self, LayoutError> {
        Self::new(Document::parse(html)?, config)
    }

    pub fn dom(&self) -> &Document {
        &self.dom
    }

    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Serialize the whole page, floating layer included.
    pub fn to_html(&self) -> String {
        self.dom.to_html()
    }

    /// Floating element ids in container (paint) order.
    pub fn floating_ids(&self) -> Vec<String> {
        self.dom
            .element_children(self.container)
            .into_iter()
            .filter(|node| self.dom.has_class(*node, FLOATING_CLASS))
            .filter_map(|node| self.dom.id_of(node).map(str::to_owned))
            .collect()
    }

    /// The DOM node of a registered floating element.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `id` is not a live floating element.
    pub fn floating_node(&self, id: &str) -> Result<NodeId, LayoutError> {
        if !self.registry.contains(id) {
            return Err(LayoutError::UnknownElement(id.to_owned()));
        }
        self.dom
            .elements_by_id(id)
            .into_iter()
            .find(|node| self.dom.contains(self.container, *node))
            .ok_or_else(|| LayoutError::UnknownElement(id.to_owned()))
    }

    pub fn kind_of(&self, id: &str) -> Option<FloatingKind> {
        self.registry.get(id).map(|entry| entry.kind)
    }

    /// Whether an id is used anywhere on the page or in the registry.
    pub(crate) fn id_in_use(&self, id: &str) -> bool {
        self.registry.contains(id) || self.dom.element_by_id(id).is_some()
    }

    pub(crate) fn mint_id(&mut self, kind: FloatingKind) -> String {
        let dom = &self.dom;
        self.registry
            .mint_id(kind.id_prefix(), |candidate| dom.element_by_id(candidate).is_some())
    }

    /// Host page element with this id, outside the floating container.
    ///
    /// Exactly one match is required.
    pub(crate) fn host_element(&self, original_id: &str) -> Result<NodeId, LayoutError> {
        let matches: Vec<NodeId> = self
            .dom
            .elements_by_id(original_id)
            .into_iter()
            .filter(|node| !self.dom.contains(self.container, *node))
            .collect();
        match matches.as_slice() {
            [single] => Ok(*single),
            [] => Err(LayoutError::OriginalNotFound(original_id.to_owned())),
            _ => {
                debug!("{} host elements share id `{original_id}`", matches.len());
                Err(LayoutError::OriginalNotFound(format!(
                    "{original_id} (ambiguous: {} matches)",
                    matches.len()
                )))
            }
        }
    }

    /// A tracked original: a host element, or an extracted merge wrapper that
    /// still sits inside its floating element.
    pub(crate) fn original_element(&self, original_id: &str) -> Result<NodeId, LayoutError> {
        self.host_element(original_id).or_else(|err| {
            self.dom
                .elements_by_id(original_id)
                .into_iter()
                .find(|node| {
                    self.dom.contains(self.container, *node)
                        && self.dom.has_class(*node, floating::WRAPPER_CLASS)
                })
                .ok_or(err)
        })
    }

    pub(crate) fn place(&mut self, node: NodeId) -> Result<(), LayoutError> {
        self.dom.append_child(self.container, node)?;
        Ok(())
    }

    /// Highest z-index among floating elements, 0 when none is set.
    pub(crate) fn top_z_index(&self) -> i32 {
        self.dom
            .element_children(self.container)
            .into_iter()
            .filter_map(|node| floating::read_geometry(&self.dom, node).z_index)
            .max()
            .unwrap_or(0)
    }
}
