use crate::annotate::engine::Brush;
use crate::foundation::core::Point;
use crate::foundation::error::ForgeResult;
use crate::geometry::shapes::{segment_path, shape_path};
use crate::model::frame::{Drawing, DrawingFrame};
use crate::render::composite::{CompositeOpts, StrokeOp, composite_frame, draw_layer, stroke_onto};
use crate::render::raster::Raster;

/// What the editor shows while a frame is open.
///
/// `backdrop` holds the base still, the ghosted previous frame and the frame's persisted
/// drawings; it only changes when the frame is reopened. `view` is the backdrop plus pending
/// drawings and is updated incrementally during strokes.
pub struct DisplaySurface {
    backdrop: Raster,
    view: Raster,
    snapshot: Option<Raster>,
}

impl DisplaySurface {
    pub fn build(
        frame: &DrawingFrame,
        previous: Option<&DrawingFrame>,
        opts: CompositeOpts,
    ) -> ForgeResult<Self> {
        let backdrop = composite_frame(frame, previous, &[], opts)?;
        Ok(Self {
            view: backdrop.clone(),
            backdrop,
            snapshot: None,
        })
    }

    pub fn view(&self) -> &Raster {
        &self.view
    }

    /// Full recomposite of the pending layer.
    pub fn redraw(&mut self, pending: &[Drawing]) -> ForgeResult<()> {
        self.view = self.backdrop.clone();
        self.snapshot = None;
        draw_layer(&mut self.view, pending, 1.0)
    }

    /// Draw just the newest pen segment.
    pub fn draw_segment(&mut self, drawing: &Drawing, a: Point, b: Point) -> ForgeResult<()> {
        let op = StrokeOp {
            path: segment_path(a, b),
            color: drawing.color,
            width: drawing.pen_size,
        };
        stroke_onto(&mut self.view, &[op], 1.0)
    }

    pub fn take_snapshot(&mut self) {
        self.snapshot = Some(self.view.clone());
    }

    /// Restore the snapshot and draw a shape preview from `start` to `end`.
    pub fn preview_shape(&mut self, brush: &Brush, start: Point, end: Point) -> ForgeResult<()> {
        if let Some(snapshot) = &self.snapshot {
            self.view.data.copy_from_slice(&snapshot.data);
        }
        let op = StrokeOp {
            path: shape_path(brush.tool, start, end),
            color: brush.color,
            width: brush.pen_size,
        };
        stroke_onto(&mut self.view, &[op], 1.0)
    }

    pub fn drop_snapshot(&mut self) {
        self.snapshot = None;
    }
}
