use kurbo::{Circle, Shape as _};

use crate::foundation::core::{BezPath, Point, Rect};
use crate::model::frame::{Drawing, Tool};

const PATH_TOLERANCE: f64 = 0.1;

/// Outline of a drawing in frame pixel space, to be stroked with its pen size.
///
/// Returns `None` when the drawing has too few points: a pen needs a segment, shapes need their
/// start and end point.
pub fn drawing_path(drawing: &Drawing) -> Option<BezPath> {
    if !drawing.is_renderable() {
        return None;
    }
    match drawing.tool {
        Tool::Pen => Some(polyline(&drawing.points)),
        tool => {
            let start = drawing.points[0];
            let end = drawing.points[drawing.points.len() - 1];
            Some(shape_path(tool, start, end))
        }
    }
}

/// Preview outline for a shape being dragged from `start` to `end`.
pub fn shape_path(tool: Tool, start: Point, end: Point) -> BezPath {
    match tool {
        Tool::Pen | Tool::Line => segment_path(start, end),
        Tool::Rectangle => Rect::from_points(start, end).to_path(PATH_TOLERANCE),
        // Centered on the start point, passing through the end point.
        Tool::Circle => Circle::new(start, start.distance(end)).to_path(PATH_TOLERANCE),
    }
}

/// A single straight segment, used for incremental pen drawing.
pub fn segment_path(a: Point, b: Point) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(a);
    path.line_to(b);
    path
}

fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(&first) = iter.next() {
        path.move_to(first);
    }
    for &p in iter {
        path.line_to(p);
    }
    path
}
