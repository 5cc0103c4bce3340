//! A single drag or resize gesture.
//!
//! Created when the pointer goes down on a floating element and consumed when
//! it comes up. Nothing touches the sheet in between; the presentation layer
//! renders [`DragSession::preview`] itself.

use crate::error::LayoutError;
use crate::floating;
use crate::model::SectionGeometry;
use crate::px::Px;
use crate::sheet::PrintSheet;

/// Resizing never shrinks an element below this edge length.
pub const MIN_EDGE: Px = Px(40.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragMode {
    /// Pointer deltas shift `left`/`top`.
    Move,
    /// Pointer deltas grow `width`/`height` from the bottom-right corner.
    Resize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    floating_id: String,
    mode: DragMode,
    start: SectionGeometry,
}

impl DragSession {
    /// Capture the element's geometry at gesture start.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if `floating_id` is not live.
    pub fn begin(sheet: &PrintSheet, floating_id: &str, mode: DragMode) -> Result<Self, LayoutError> {
        let node = sheet.floating_node(floating_id)?;
        let start = floating::read_geometry(sheet.dom(), node)
            .with_fallback(&sheet.config().placement);
        Ok(Self {
            floating_id: floating_id.to_owned(),
            mode,
            start,
        })
    }

    pub fn floating_id(&self) -> &str {
        &self.floating_id
    }

    pub const fn mode(&self) -> DragMode {
        self.mode
    }

    pub const fn start(&self) -> &SectionGeometry {
        &self.start
    }

    /// Geometry for a pointer displaced by `(dx, dy)` since the gesture began.
    pub fn preview(&self, dx: f64, dy: f64) -> SectionGeometry {
        let shift = |value: Option<Px>, delta: f64| value.map(|length| length.offset(delta));
        let grow = |value: Option<Px>, delta: f64| {
            value.map(|length| Px(length.offset(delta).0.max(MIN_EDGE.0)).rounded())
        };
        match self.mode {
            DragMode::Move => SectionGeometry {
                left: shift(self.start.left, dx),
                top: shift(self.start.top, dy),
                ..SectionGeometry::default()
            },
            DragMode::Resize => SectionGeometry {
                width: grow(self.start.width, dx),
                height: grow(self.start.height, dy),
                ..SectionGeometry::default()
            },
        }
    }

    /// Commit the gesture and raise the element to the front.
    ///
    /// # Errors
    ///
    /// Returns `UnknownElement` if the element vanished during the drag.
    pub fn finish(self, sheet: &mut PrintSheet, dx: f64, dy: f64) -> Result<SectionGeometry, LayoutError> {
        let mut geometry = self.preview(dx, dy);
        sheet.set_geometry(&self.floating_id, &geometry)?;
        geometry.z_index = Some(sheet.bring_to_front(&self.floating_id)?);
        Ok(geometry)
    }

    /// Drop the dragged element onto another one, merging it in.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMerge` for a resize session and the errors of
    /// [`PrintSheet::merge`].
    pub fn drop_onto(self, sheet: &mut PrintSheet, target_id: &str) -> Result<(), LayoutError> {
        if self.mode == DragMode::Resize {
            return Err(LayoutError::InvalidMerge(String::from("a resize gesture cannot merge")));
        }
        sheet.merge(&self.floating_id, target_id)
    }
}
