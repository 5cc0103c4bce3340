//! In-process HTML document model used as the "live page" of a print sheet.
//!
//! The host page is parsed with html5ever into an `indextree` arena. Snapshot
//! fragments are parsed into the same arena and serialized back out, so every
//! consumer works against one tree with a stable id index.

#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

pub mod dom;
pub mod parser;

pub use dom::{DOMNode, Document, NodeKind};
pub use indextree::NodeId;
