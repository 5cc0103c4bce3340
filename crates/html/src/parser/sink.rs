//! A reference-counted html5ever tree sink.
//!
//! html5ever drives the sink through `&self`, so the tree is built with `Rc`
//! handles and interior mutability, then grafted into the arena once parsing
//! has finished.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, ExpandedName, LocalName, Namespace, QualName};
use log::trace;

pub(super) type Handle = Rc<SinkNode>;

pub(super) enum SinkData {
    Document,
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,
        template_contents: Option<Handle>,
    },
    Text {
        contents: RefCell<StrTendril>,
    },
    Comment {
        contents: StrTendril,
    },
    /// Processing instructions; never grafted.
    Skipped,
}

pub(super) struct SinkNode {
    pub(super) data: SinkData,
    parent: RefCell<Option<Weak<SinkNode>>>,
    pub(super) children: RefCell<Vec<Handle>>,
}

impl SinkNode {
    fn new_handle(data: SinkData) -> Handle {
        Rc::new(Self {
            data,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        })
    }

    fn parent(&self) -> Option<Handle> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }
}

fn position_in_parent(parent: &Handle, node: &Handle) -> Option<usize> {
    parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))
}

fn detach(node: &Handle) {
    if let Some(parent) = node.parent() {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    *node.parent.borrow_mut() = None;
}

fn append_node(parent: &Handle, child: Handle) {
    detach(&child);
    *child.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(child);
}

/// Append text, merging into a trailing text node as browsers do.
fn append_text(parent: &Handle, text: &StrTendril) {
    let merged = parent.children.borrow().last().is_some_and(|last| {
        if let SinkData::Text { contents } = &last.data {
            contents.borrow_mut().push_tendril(text);
            true
        } else {
            false
        }
    });
    if !merged {
        append_node(
            parent,
            SinkNode::new_handle(SinkData::Text {
                contents: RefCell::new(text.clone()),
            }),
        );
    }
}

fn insert_before(sibling: &Handle, child: NodeOrText<Handle>) {
    let Some(parent) = sibling.parent() else {
        return;
    };
    let node = match child {
        NodeOrText::AppendNode(node) => node,
        NodeOrText::AppendText(text) => {
            let previous = position_in_parent(&parent, sibling)
                .and_then(|position| position.checked_sub(1))
                .and_then(|position| parent.children.borrow().get(position).cloned());
            if let Some(previous) = previous {
                if let SinkData::Text { contents } = &previous.data {
                    contents.borrow_mut().push_tendril(&text);
                    return;
                }
            }
            SinkNode::new_handle(SinkData::Text {
                contents: RefCell::new(text),
            })
        }
    };
    detach(&node);
    let Some(position) = position_in_parent(&parent, sibling) else {
        return;
    };
    *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
    parent.children.borrow_mut().insert(position, node);
}

pub(super) struct RcSink {
    document: Handle,
    placeholder: QualName,
}

impl Default for RcSink {
    fn default() -> Self {
        Self {
            document: SinkNode::new_handle(SinkData::Document),
            placeholder: QualName::new(None, Namespace::from(""), LocalName::from("")),
        }
    }
}

impl TreeSink for RcSink {
    type Handle = Handle;
    type Output = Handle;
    type ElemName<'name> = ExpandedName<'name>;

    fn finish(self) -> Self::Output {
        self.document
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        trace!("html parse error: {msg}");
    }

    fn get_document(&self) -> Self::Handle {
        Rc::clone(&self.document)
    }

    fn elem_name<'name>(&'name self, target: &'name Self::Handle) -> ExpandedName<'name> {
        match &target.data {
            SinkData::Element { name, .. } => name.expanded(),
            _ => self.placeholder.expanded(),
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> Self::Handle {
        let template_contents = flags
            .template
            .then(|| SinkNode::new_handle(SinkData::Document));
        SinkNode::new_handle(SinkData::Element {
            name,
            attrs: RefCell::new(attrs),
            template_contents,
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        SinkNode::new_handle(SinkData::Comment { contents: text })
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        SinkNode::new_handle(SinkData::Skipped)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => append_node(parent, node),
            NodeOrText::AppendText(text) => append_text(parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if element.parent().is_some() {
            insert_before(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        // Doctype carries nothing the print layout needs
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        match &target.data {
            SinkData::Element {
                template_contents: Some(contents),
                ..
            } => Rc::clone(contents),
            _ => Rc::clone(target),
        }
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        insert_before(sibling, new_node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let SinkData::Element { attrs: present, .. } = &target.data {
            let mut present = present.borrow_mut();
            for attr in attrs {
                if !present.iter().any(|existing| existing.name == attr.name) {
                    present.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let moved: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
        for child in moved {
            *child.parent.borrow_mut() = None;
            append_node(new_parent, child);
        }
    }
}
