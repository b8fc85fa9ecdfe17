//! Per-frame drawing state machine with linear undo/redo.

use std::sync::Arc;

use crate::annotate::surface::DisplaySurface;
use crate::config::AnnotationOpts;
use crate::foundation::core::{Point, Rgba8};
use crate::foundation::error::ForgeResult;
use crate::model::frame::{Drawing, DrawingFrame, Tool};
use crate::render::composite::CompositeOpts;
use crate::render::raster::Raster;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Editing,
}

/// Settings applied to the next stroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Brush {
    pub tool: Tool,
    pub color: Rgba8,
    pub pen_size: f64,
}

impl Brush {
    fn drawing(&self, points: Vec<Point>) -> Drawing {
        Drawing::new(self.tool, self.color, self.pen_size, points)
    }
}

enum Stroke {
    /// Index of the open pen drawing in `current_points`.
    Pen(usize),
    Shape { anchor: Point },
}

struct Editing {
    frame: Arc<DrawingFrame>,
    previous: Option<Arc<DrawingFrame>>,
    current_points: Vec<Drawing>,
    // Each entry holds the drawings one action appended to `current_points`.
    history: Vec<Vec<Drawing>>,
    redo: Vec<Vec<Drawing>>,
    stroke: Option<Stroke>,
    surface: DisplaySurface,
}

/// Annotation editor for one frame at a time.
///
/// `open` enters editing; `save`, `discard` and a confirmed `clear` leave it. Strokes land in a
/// pending buffer that is only merged into the frame on `save`.
pub struct AnnotationEngine {
    brush: Brush,
    ghost_opacity: f32,
    editing: Option<Editing>,
}

impl AnnotationEngine {
    pub fn new(opts: &AnnotationOpts) -> Self {
        Self {
            brush: Brush {
                tool: opts.default_tool,
                color: opts.default_color,
                pen_size: opts.default_pen_size,
            },
            ghost_opacity: opts.ghost_opacity,
            editing: None,
        }
    }

    pub fn state(&self) -> EngineState {
        if self.editing.is_some() {
            EngineState::Editing
        } else {
            EngineState::Idle
        }
    }

    pub fn brush(&self) -> Brush {
        self.brush
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.brush.tool = tool;
    }

    pub fn set_color(&mut self, color: Rgba8) {
        self.brush.color = color;
    }

    pub fn set_pen_size(&mut self, pen_size: f64) {
        if pen_size.is_finite() && pen_size > 0.0 {
            self.brush.pen_size = pen_size;
        }
    }

    /// Id of the frame being edited.
    pub fn frame_id(&self) -> Option<u32> {
        self.editing.as_ref().map(|e| e.frame.id)
    }

    /// Pending drawings, including an open pen stroke.
    pub fn current_points(&self) -> &[Drawing] {
        self.editing
            .as_ref()
            .map(|e| e.current_points.as_slice())
            .unwrap_or_default()
    }

    pub fn can_undo(&self) -> bool {
        self.editing.as_ref().is_some_and(|e| !e.history.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        self.editing.as_ref().is_some_and(|e| !e.redo.is_empty())
    }

    pub fn is_stroking(&self) -> bool {
        self.editing.as_ref().is_some_and(|e| e.stroke.is_some())
    }

    /// Current display raster while editing.
    pub fn display(&self) -> Option<&Raster> {
        self.editing.as_ref().map(|e| e.surface.view())
    }

    /// Start editing `frame`; `previous` is shown ghosted and feeds `copy_from_previous`.
    ///
    /// Reopening while editing discards the pending state of the old frame.
    pub fn open(
        &mut self,
        frame: Arc<DrawingFrame>,
        previous: Option<Arc<DrawingFrame>>,
    ) -> ForgeResult<()> {
        let opts = CompositeOpts {
            ghost_opacity: self.ghost_opacity,
        };
        let surface = DisplaySurface::build(&frame, previous.as_deref(), opts)?;
        self.editing = Some(Editing {
            frame,
            previous,
            current_points: Vec::new(),
            history: Vec::new(),
            redo: Vec::new(),
            stroke: None,
            surface,
        });
        Ok(())
    }

    pub fn start_stroke(&mut self, p: Point) -> ForgeResult<()> {
        let brush = self.brush;
        let Some(ed) = self.editing.as_mut() else {
            return Ok(());
        };
        if ed.stroke.is_some() {
            return Ok(());
        }
        ed.redo.clear();
        if brush.tool.is_shape() {
            ed.surface.take_snapshot();
            ed.stroke = Some(Stroke::Shape { anchor: p });
        } else {
            ed.current_points.push(brush.drawing(vec![p]));
            ed.stroke = Some(Stroke::Pen(ed.current_points.len() - 1));
        }
        Ok(())
    }

    pub fn extend_stroke(&mut self, p: Point) -> ForgeResult<()> {
        let brush = self.brush;
        let Some(ed) = self.editing.as_mut() else {
            return Ok(());
        };
        match ed.stroke {
            Some(Stroke::Pen(idx)) => {
                let drawing = &mut ed.current_points[idx];
                let last = drawing.points.last().copied().unwrap_or(p);
                drawing.points.push(p);
                ed.surface.draw_segment(drawing, last, p)
            }
            Some(Stroke::Shape { anchor }) => ed.surface.preview_shape(&brush, anchor, p),
            None => Ok(()),
        }
    }

    pub fn end_stroke(&mut self, p: Point) -> ForgeResult<()> {
        let brush = self.brush;
        let Some(ed) = self.editing.as_mut() else {
            return Ok(());
        };
        match ed.stroke.take() {
            Some(Stroke::Pen(idx)) => {
                if ed.current_points[idx].points.len() >= 2 {
                    ed.history.push(vec![ed.current_points[idx].clone()]);
                } else {
                    ed.current_points.remove(idx);
                    ed.surface.redraw(&ed.current_points)?;
                }
                Ok(())
            }
            Some(Stroke::Shape { anchor }) => {
                let shape = brush.drawing(vec![anchor, p]);
                ed.current_points.push(shape.clone());
                ed.history.push(vec![shape]);
                ed.surface.drop_snapshot();
                ed.surface.redraw(&ed.current_points)
            }
            None => Ok(()),
        }
    }

    /// Drop the last action. No-op without history or while a stroke is open.
    pub fn undo(&mut self) -> ForgeResult<()> {
        let Some(ed) = self.editing.as_mut() else {
            return Ok(());
        };
        if ed.stroke.is_some() {
            return Ok(());
        }
        let Some(entry) = ed.history.pop() else {
            return Ok(());
        };
        let keep = ed.current_points.len().saturating_sub(entry.len());
        ed.current_points.truncate(keep);
        ed.redo.push(entry);
        ed.surface.redraw(&ed.current_points)
    }

    /// Reapply the last undone action. No-op without redo entries or while a stroke is open.
    pub fn redo(&mut self) -> ForgeResult<()> {
        let Some(ed) = self.editing.as_mut() else {
            return Ok(());
        };
        if ed.stroke.is_some() {
            return Ok(());
        }
        let Some(entry) = ed.redo.pop() else {
            return Ok(());
        };
        ed.current_points.extend(entry.iter().cloned());
        ed.history.push(entry);
        ed.surface.redraw(&ed.current_points)
    }

    /// Append the previous frame's drawings to the pending buffer, one history entry each.
    pub fn copy_from_previous(&mut self) -> ForgeResult<()> {
        let Some(ed) = self.editing.as_mut() else {
            return Ok(());
        };
        if ed.stroke.is_some() {
            return Ok(());
        }
        let Some(prev) = ed.previous.as_ref() else {
            return Ok(());
        };
        if prev.drawings.is_empty() {
            return Ok(());
        }
        for drawing in &prev.drawings {
            ed.current_points.push(drawing.clone());
            ed.history.push(vec![drawing.clone()]);
        }
        ed.redo.clear();
        ed.surface.redraw(&ed.current_points)
    }

    /// Merge pending drawings into a new frame and stop editing.
    ///
    /// Returns `None` and changes nothing when there is nothing pending.
    pub fn save(&mut self) -> Option<DrawingFrame> {
        let ed = self.editing.as_mut()?;
        if let Some(Stroke::Pen(idx)) = ed.stroke.take()
            && ed.current_points[idx].points.len() < 2
        {
            ed.current_points.remove(idx);
        }
        ed.surface.drop_snapshot();
        if ed.current_points.is_empty() {
            return None;
        }
        let ed = self.editing.take()?;
        let mut drawings = ed.frame.drawings.clone();
        drawings.extend(ed.current_points);
        tracing::debug!(frame = ed.frame.id, drawings = drawings.len(), "annotations saved");
        Some(ed.frame.with_drawings(drawings))
    }

    /// Stop editing without persisting anything.
    pub fn discard(&mut self) {
        self.editing = None;
    }

    /// Remove every drawing from the open frame. Needs `confirmed`; otherwise a no-op.
    pub fn clear(&mut self, confirmed: bool) -> Option<DrawingFrame> {
        if !confirmed {
            return None;
        }
        let ed = self.editing.take()?;
        Some(ed.frame.with_drawings(Vec::new()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/annotate/engine.rs"]
mod tests;
