use anyhow::{Error, anyhow};
use indextree::{Arena, Node, NodeId};
use smallvec::SmallVec;

mod index;
mod printing;
mod style;

use index::IdIndex;

use crate::parser;

#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    #[default]
    Document,
    Element { tag: String },
    Text { text: String },
    Comment { text: String },
}

#[derive(Debug, Clone, Default)]
pub struct DOMNode {
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
}

impl DOMNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A mutable HTML document held in an arena.
///
/// Nodes created with [`Document::create_element`] or [`Document::deep_clone`]
/// start detached; only attached nodes are visible to id lookups.
pub struct Document {
    dom: Arena<DOMNode>,
    root: NodeId,
    index: IdIndex,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the document node.
    pub fn new() -> Self {
        let mut dom = Arena::new();
        Self {
            root: dom.new_node(DOMNode::default()),
            dom,
            index: IdIndex::default(),
        }
    }

    /// Parse a complete HTML page.
    ///
    /// # Errors
    ///
    /// Returns an error if the parser fails to produce a document.
    pub fn parse(html: &str) -> Result<Self, Error> {
        parser::parse_document(html)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<body>` element, if the document has one.
    pub fn body(&self) -> Option<NodeId> {
        self.root
            .descendants(&self.dom)
            .find(|node| self.tag(*node) == Some("body"))
    }

    fn node(&self, node: NodeId) -> Option<&DOMNode> {
        if node.is_removed(&self.dom) {
            return None;
        }
        self.dom.get(node).map(Node::get)
    }

    fn node_mut(&mut self, node: NodeId) -> Option<&mut DOMNode> {
        if node.is_removed(&self.dom) {
            return None;
        }
        self.dom.get_mut(node).map(Node::get_mut)
    }

    /// Whether the node still exists in the arena (attached or not).
    pub fn exists(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.node(node).map(|entry| &entry.kind)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Element { .. }))
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            Some(NodeKind::Element { tag }) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.dom.new_node(DOMNode {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            attrs: SmallVec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.dom.new_node(DOMNode {
            kind: NodeKind::Text {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        })
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.dom.new_node(DOMNode {
            kind: NodeKind::Comment {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        })
    }

    // -----------------------
    // Attributes
    // -----------------------

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)?.attr(&name.to_ascii_lowercase())
    }

    pub fn attrs(&self, node: NodeId) -> Vec<(String, String)> {
        self.node(node)
            .map(|entry| entry.attrs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Set an attribute on an element, keeping the id index current.
    /// Non-element nodes are left untouched.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let name_lc = name.to_ascii_lowercase();
        let previous = self.attr(node, &name_lc).map(str::to_owned);
        let Some(entry) = self.node_mut(node) else {
            return;
        };
        if !matches!(entry.kind, NodeKind::Element { .. }) {
            return;
        }
        if let Some(slot) = entry.attrs.iter_mut().find(|(key, _)| *key == name_lc) {
            value.clone_into(&mut slot.1);
        } else {
            entry.attrs.push((name_lc.clone(), value.to_owned()));
        }
        if name_lc == "id" {
            if let Some(old) = previous {
                self.index.remove(&old, node);
            }
            if !value.is_empty() {
                self.index.insert(value, node);
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Option<String> {
        let name_lc = name.to_ascii_lowercase();
        let entry = self.node_mut(node)?;
        let position = entry.attrs.iter().position(|(key, _)| *key == name_lc)?;
        let (_, value) = entry.attrs.remove(position);
        if name_lc == "id" {
            self.index.remove(&value, node);
        }
        Some(value)
    }

    pub fn id_of(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id").filter(|value| !value.is_empty())
    }

    /// All attached elements carrying the given id (case-sensitive), in no particular order.
    pub fn elements_by_id(&self, id: &str) -> Vec<NodeId> {
        self.index
            .candidates(id)
            .iter()
            .copied()
            .filter(|node| self.id_of(*node) == Some(id) && self.is_attached(*node))
            .collect()
    }

    /// The attached element with the given id, if any.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.elements_by_id(id).into_iter().next()
    }

    // -----------------------
    // Tree structure
    // -----------------------

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        if node.is_removed(&self.dom) {
            return None;
        }
        self.dom.get(node).and_then(Node::parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        if node.is_removed(&self.dom) {
            return Vec::new();
        }
        node.children(&self.dom).collect()
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Descendants in document order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        if node.is_removed(&self.dom) {
            return Vec::new();
        }
        node.descendants(&self.dom).skip(1).collect()
    }

    /// Whether `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if node.is_removed(&self.dom) {
            return false;
        }
        node.ancestors(&self.dom).any(|candidate| candidate == ancestor)
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    /// Append `child` as the last child of `parent`, detaching it from any previous parent.
    ///
    /// # Errors
    ///
    /// Returns an error if `child` is an ancestor of `parent` or either node is gone.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        child.detach(&mut self.dom);
        parent
            .checked_append(child, &mut self.dom)
            .map_err(|err| anyhow!("cannot append node: {err}"))
    }

    /// Insert `new_node` directly before `sibling`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insertion would create a cycle.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) -> Result<(), Error> {
        new_node.detach(&mut self.dom);
        sibling
            .checked_insert_before(new_node, &mut self.dom)
            .map_err(|err| anyhow!("cannot insert node: {err}"))
    }

    /// Detach a node (and its subtree) from its parent without destroying it.
    pub fn detach(&mut self, node: NodeId) {
        if !node.is_removed(&self.dom) {
            node.detach(&mut self.dom);
        }
    }

    /// Destroy a node and its subtree. The document node itself cannot be removed.
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root || node.is_removed(&self.dom) {
            return;
        }
        let doomed: Vec<NodeId> = node.descendants(&self.dom).collect();
        for member in doomed {
            if let Some(id) = self.id_of(member).map(str::to_owned) {
                self.index.remove(&id, member);
            }
        }
        node.remove_subtree(&mut self.dom);
    }

    /// Remove every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        for child in self.children(node) {
            self.remove(child);
        }
    }

    /// Move every child of `from` to the end of `to`, preserving order.
    ///
    /// # Errors
    ///
    /// Returns an error if `to` lies inside `from`.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) -> Result<(), Error> {
        for child in self.children(from) {
            self.append_child(to, child)?;
        }
        Ok(())
    }

    /// Copy a subtree into a new, detached subtree.
    ///
    /// # Errors
    ///
    /// Returns an error if `node` no longer exists.
    pub fn deep_clone(&mut self, node: NodeId) -> Result<NodeId, Error> {
        let source = self
            .node(node)
            .cloned()
            .ok_or_else(|| anyhow!("cannot clone a removed node"))?;
        let id = source.attr("id").map(str::to_owned);
        let copy = self.dom.new_node(source);
        if let Some(id) = id.filter(|value| !value.is_empty()) {
            self.index.insert(&id, copy);
        }
        for child in self.children(node) {
            let child_copy = self.deep_clone(child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Concatenated text of every text node beneath `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeKind::Text { text }) = self.kind(node) {
            out.push_str(text);
        }
        for descendant in self.descendants(node) {
            if let Some(NodeKind::Text { text }) = self.kind(descendant) {
                out.push_str(text);
            }
        }
        out
    }

    /// Replace the children of `node` with the parsed fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the fragment cannot be parsed or attached.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<Vec<NodeId>, Error> {
        self.clear_children(node);
        parser::parse_fragment_into(self, node, html)
    }

    /// Parse a fragment and append it after the existing children of `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the fragment cannot be parsed or attached.
    pub fn append_html(&mut self, node: NodeId, html: &str) -> Result<Vec<NodeId>, Error> {
        parser::parse_fragment_into(self, node, html)
    }

    /// Elements beneath `scope` whose class list contains `class`, in document order.
    pub fn descendants_with_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.has_class(*node, class))
            .collect()
    }

    /// Elements beneath `scope` with the given tag name, in document order.
    pub fn descendants_with_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        let needle = tag.to_ascii_lowercase();
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.tag(*node) == Some(needle.as_str()))
            .collect()
    }

    /// The nearest ancestor (or `node` itself) carrying `class`.
    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        if node.is_removed(&self.dom) {
            return None;
        }
        node.ancestors(&self.dom)
            .find(|candidate| self.has_class(*candidate, class))
    }
}
