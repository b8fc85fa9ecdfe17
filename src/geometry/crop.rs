//! Crop box arithmetic in percent space and its conversion to pixels.

use crate::foundation::error::ForgeResult;
use crate::foundation::math::clamp_f64;
use crate::model::filters::{CropRect, MIN_CROP_PERCENT};

/// A crop box in integer pixels plus the matching transcoder filter expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CropPixels {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// `crop=W:H:X:Y`.
    pub filter: String,
}

/// Convert percent coordinates to pixels for a `video_width x video_height` source.
///
/// Every field is rounded on its own, so `x + width` may differ by one pixel from the rounded
/// right edge.
pub fn crop_percent_to_pixels(coords: &CropRect, video_width: u32, video_height: u32) -> CropPixels {
    let px = |pct: f64, extent: u32| -> u32 {
        (pct / 100.0 * f64::from(extent)).round().max(0.0) as u32
    };
    let x = px(coords.x, video_width);
    let y = px(coords.y, video_height);
    let width = px(coords.width, video_width);
    let height = px(coords.height, video_height);
    CropPixels {
        x,
        y,
        width,
        height,
        filter: format!("crop={width}:{height}:{x}:{y}"),
    }
}

/// Corner grabbed by a resize gesture. The opposite corner stays fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    fn moves_left_edge(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::BottomLeft)
    }

    fn moves_top_edge(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }
}

/// Move the box by `(dx, dy)` percent, clamping its origin so it stays inside the frame.
pub fn drag_crop(rect: &CropRect, dx: f64, dy: f64) -> CropRect {
    let width = clamp_f64(rect.width, MIN_CROP_PERCENT, 100.0);
    let height = clamp_f64(rect.height, MIN_CROP_PERCENT, 100.0);
    CropRect {
        x: clamp_f64(rect.x + dx, 0.0, 100.0 - width),
        y: clamp_f64(rect.y + dy, 0.0, 100.0 - height),
        width,
        height,
    }
}

/// Resize the box by dragging `corner` by `(dx, dy)` percent.
///
/// Width and height stay within `[MIN_CROP_PERCENT, 100]` and within the room left by the
/// fixed corner. With `aspect` (width / height in percent space, see [`percent_aspect`]) the
/// height follows the width, or the width follows the height once the height hits a bound.
pub fn resize_crop(
    rect: &CropRect,
    corner: Corner,
    dx: f64,
    dy: f64,
    aspect: Option<f64>,
) -> CropRect {
    let rect = drag_crop(rect, 0.0, 0.0);
    let (fixed_x, max_w) = if corner.moves_left_edge() {
        (rect.right(), rect.right())
    } else {
        (rect.x, 100.0 - rect.x)
    };
    let (fixed_y, max_h) = if corner.moves_top_edge() {
        (rect.bottom(), rect.bottom())
    } else {
        (rect.y, 100.0 - rect.y)
    };
    let max_w = max_w.min(100.0);
    let max_h = max_h.min(100.0);

    let raw_w = if corner.moves_left_edge() {
        rect.width - dx
    } else {
        rect.width + dx
    };
    let raw_h = if corner.moves_top_edge() {
        rect.height - dy
    } else {
        rect.height + dy
    };

    let mut width = clamp_f64(raw_w, MIN_CROP_PERCENT, max_w);
    let mut height = clamp_f64(raw_h, MIN_CROP_PERCENT, max_h);

    if let Some(a) = aspect.filter(|a| a.is_finite() && *a > 0.0) {
        let derived_h = width / a;
        height = clamp_f64(derived_h, MIN_CROP_PERCENT, max_h);
        if (height - derived_h).abs() > f64::EPSILON {
            width = clamp_f64(height * a, MIN_CROP_PERCENT, max_w);
        }
    }

    let x = if corner.moves_left_edge() {
        (fixed_x - width).max(0.0)
    } else {
        fixed_x
    };
    let y = if corner.moves_top_edge() {
        (fixed_y - height).max(0.0)
    } else {
        fixed_y
    };
    CropRect {
        x,
        y,
        width,
        height,
    }
}

/// Convert a pixel aspect ratio (width / height) into percent space for a given source size.
pub fn percent_aspect(pixel_aspect: f64, video_width: u32, video_height: u32) -> Option<f64> {
    if video_width == 0 || video_height == 0 || !pixel_aspect.is_finite() || pixel_aspect <= 0.0
    {
        return None;
    }
    Some(pixel_aspect * f64::from(video_height) / f64::from(video_width))
}

pub fn validate_crop(rect: &CropRect) -> ForgeResult<()> {
    rect.validate()
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/crop.rs"]
mod tests;
