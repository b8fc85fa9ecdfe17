pub(crate) mod engine;
pub(crate) mod surface;

use kurbo::Size;

use crate::foundation::core::{FrameSize, Point};

/// Map a point on a `display` sized view onto frame pixels.
pub fn frame_point_from_display(point: Point, display: Size, frame: FrameSize) -> Point {
    if display.width <= 0.0 || display.height <= 0.0 {
        return Point::ORIGIN;
    }
    Point::new(
        point.x * f64::from(frame.width) / display.width,
        point.y * f64::from(frame.height) / display.height,
    )
}

/// Map a point given in percent of the view onto frame pixels.
pub fn frame_point_from_percent(x_pct: f64, y_pct: f64, frame: FrameSize) -> Point {
    Point::new(
        x_pct / 100.0 * f64::from(frame.width),
        y_pct / 100.0 * f64::from(frame.height),
    )
}
