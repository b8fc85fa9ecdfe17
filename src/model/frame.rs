use std::sync::Arc;

use crate::foundation::core::{FrameSize, Point, Rgba8};
use crate::foundation::error::{ForgeError, ForgeResult};

/// Drawing tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Freehand polyline through every point.
    #[default]
    Pen,
    Line,
    Rectangle,
    Circle,
}

impl Tool {
    /// `true` for tools defined by a start and an end point.
    pub fn is_shape(self) -> bool {
        !matches!(self, Tool::Pen)
    }
}

/// One stroke or shape in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Drawing {
    pub points: Vec<Point>,
    pub color: Rgba8,
    pub pen_size: f64,
    pub tool: Tool,
}

impl Drawing {
    pub fn new(tool: Tool, color: Rgba8, pen_size: f64, points: Vec<Point>) -> Self {
        Self {
            points,
            color,
            pen_size,
            tool,
        }
    }

    /// Shape tools need exactly their two anchors; pens need a segment.
    pub fn is_renderable(&self) -> bool {
        self.points.len() >= 2
    }
}

/// A still frame sampled from the source video plus its annotations.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawingFrame {
    /// Position in the extraction, `0..N`.
    pub id: u32,
    /// Encoded still image (PNG), never mutated after extraction.
    pub image_data: Arc<[u8]>,
    pub drawings: Vec<Drawing>,
    pub width: u32,
    pub height: u32,
    /// Source time in seconds.
    pub timestamp: f64,
}

impl DrawingFrame {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn total_points(&self) -> usize {
        self.drawings.iter().map(|d| d.points.len()).sum()
    }

    /// A copy of this frame with `drawings` replaced; the image buffer is shared.
    pub fn with_drawings(&self, drawings: Vec<Drawing>) -> DrawingFrame {
        DrawingFrame {
            id: self.id,
            image_data: Arc::clone(&self.image_data),
            drawings,
            width: self.width,
            height: self.height,
            timestamp: self.timestamp,
        }
    }
}

/// Immutable snapshot of the frame sequence.
///
/// Cloning is cheap. [`FrameSequence::replace`] returns a new snapshot that shares every
/// untouched frame, so readers of an older snapshot never observe a change.
#[derive(Clone, Debug, Default)]
pub struct FrameSequence {
    frames: Arc<Vec<Arc<DrawingFrame>>>,
    version: u64,
}

impl FrameSequence {
    /// Build a sequence; ids must be exactly `0..frames.len()` in order.
    pub fn new(frames: Vec<DrawingFrame>) -> ForgeResult<Self> {
        for (idx, f) in frames.iter().enumerate() {
            if f.id as usize != idx {
                return Err(ForgeError::validation(format!(
                    "frame at position {idx} has id {} (ids must be contiguous from 0)",
                    f.id
                )));
            }
        }
        Ok(Self {
            frames: Arc::new(frames.into_iter().map(Arc::new).collect()),
            version: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bumped on every [`FrameSequence::replace`].
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, id: u32) -> Option<&Arc<DrawingFrame>> {
        self.frames.get(id as usize)
    }

    /// The frame extracted immediately before `id`.
    pub fn previous(&self, id: u32) -> Option<&Arc<DrawingFrame>> {
        id.checked_sub(1).and_then(|p| self.get(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DrawingFrame>> {
        self.frames.iter()
    }

    pub fn first(&self) -> Option<&Arc<DrawingFrame>> {
        self.frames.first()
    }

    /// New snapshot with `frame` swapped in at its id.
    ///
    /// `frame` must share the still of the frame it replaces, so edits made on a frame from an
    /// earlier extraction are refused.
    pub fn replace(&self, frame: DrawingFrame) -> ForgeResult<FrameSequence> {
        let idx = frame.id as usize;
        let Some(old) = self.frames.get(idx) else {
            return Err(ForgeError::validation(format!(
                "frame {} does not exist (sequence has {} frames)",
                frame.id,
                self.frames.len()
            )));
        };
        if old.width != frame.width || old.height != frame.height {
            return Err(ForgeError::validation(
                "replacement frame dimensions must match the extraction",
            ));
        }
        if !Arc::ptr_eq(&old.image_data, &frame.image_data) || old.timestamp != frame.timestamp {
            return Err(ForgeError::validation(format!(
                "frame {} belongs to an earlier extraction",
                frame.id
            )));
        }
        let mut next = Vec::with_capacity(self.frames.len());
        next.extend(self.frames.iter().cloned());
        next[idx] = Arc::new(frame);
        Ok(FrameSequence {
            frames: Arc::new(next),
            version: self.version + 1,
        })
    }

    /// `true` when any frame carries drawings.
    pub fn has_drawings(&self) -> bool {
        self.frames.iter().any(|f| !f.drawings.is_empty())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/frame.rs"]
mod tests;
