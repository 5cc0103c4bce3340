use core::fmt;

use super::{DOMNode, Document, NodeKind};
use indextree::NodeId;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

// -----------------------
// Module-scope helpers
// -----------------------

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn write_html(dom: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    let Some(DOMNode { kind, attrs }) = dom.node(id) else {
        return;
    };
    match kind {
        NodeKind::Document => write_children(dom, id, false, out),
        NodeKind::Element { tag } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs.iter() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            write_children(dom, id, RAW_TEXT_ELEMENTS.contains(&tag.as_str()), out);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeKind::Text { text } => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeKind::Comment { text } => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn write_children(dom: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    for child in dom.children(id) {
        write_html(dom, child, raw_text, out);
    }
}

impl Document {
    /// Serialize a node and its subtree to HTML.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        write_html(self, node, false, &mut out);
        out
    }

    /// Serialize only the children of a node to HTML.
    pub fn inner_html(&self, node: NodeId) -> String {
        let raw_text = self
            .tag(node)
            .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
        let mut out = String::new();
        write_children(self, node, raw_text, &mut out);
        out
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.outer_html(self.root)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
            for _ in 0..depth {
                f.write_str("  ")?;
            }
            Ok(())
        }

        fn fmt_node(
            dom: &Document,
            id: NodeId,
            f: &mut fmt::Formatter<'_>,
            depth: usize,
        ) -> fmt::Result {
            let Some(DOMNode { kind, attrs }) = dom.node(id) else {
                return Ok(());
            };
            match kind {
                NodeKind::Document => {
                    write_indent(f, depth)?;
                    writeln!(f, "#document")?;
                }
                NodeKind::Element { tag } => {
                    write_indent(f, depth)?;
                    write!(f, "<{tag}")?;
                    for (name, value) in attrs.iter() {
                        write!(f, " {name}=\"{}\"", escape_attr(value))?;
                    }
                    writeln!(f, ">")?;
                }
                NodeKind::Text { text } => {
                    // Skip pure-whitespace text nodes in the printer for cleaner output
                    if text.chars().all(char::is_whitespace) {
                        return Ok(());
                    }
                    write_indent(f, depth)?;
                    writeln!(f, "{text:?}")?;
                }
                NodeKind::Comment { text } => {
                    write_indent(f, depth)?;
                    writeln!(f, "<!--{text}-->")?;
                }
            }
            for child in dom.children(id) {
                fmt_node(dom, child, f, depth + 1)?;
            }
            Ok(())
        }

        writeln!(f, "DOM")?;
        fmt_node(self, self.root, f, 0)
    }
}
