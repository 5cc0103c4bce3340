//! Persistent print layouts for a character sheet.
//!
//! A [`PrintSheet`] pairs the host page DOM with a [`ContentRegistry`] of
//! floating elements (sections, clones, extractions, shapes and reference
//! content). The [`scanner`] turns the live arrangement into a
//! [`LayoutDocument`]; the [`applier`] rebuilds the arrangement from one.
//! [`LayoutService`] ties both to durable storage and the reference cache.

pub mod applier;
pub mod config;
pub mod error;
mod floating;
mod manager;
pub mod model;
pub mod px;
pub mod reference;
pub mod registry;
pub mod scanner;
pub mod service;
pub mod session;
mod sheet;
pub mod version;

pub use applier::{ApplyReport, DroppedEntry, apply};
pub use config::{LayoutConfig, SectionDefault};
pub use error::LayoutError;
pub use manager::{Extracted, TitleSource};
pub use model::{
    CloneRecord, ExtractionRecord, LayoutDocument, MergeRecord, OperandRef, SectionGeometry,
    ShapeRecord, SpellPointer,
};
pub use px::Px;
pub use reference::{PendingReference, ReferenceResolution};
pub use registry::{
    Associated, ContentRegistry, FloatingEntry, FloatingKind, OriginalState,
    ReferenceState,
};
pub use scanner::scan;
pub use service::LayoutService;
pub use session::{DragMode, DragSession, MIN_EDGE};
pub use sheet::PrintSheet;
pub use version::{LAYOUT_SCHEMA_VERSION, SchemaVersion};
