//! Layered compositing of a frame, its drawings and the ghosted previous frame.

use kurbo::{Cap, Join, PathEl, Stroke, StrokeOpts};

use crate::foundation::core::{BezPath, Rgba8};
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::foundation::math::mul_div255_u16;
use crate::geometry::shapes::drawing_path;
use crate::model::frame::{Drawing, DrawingFrame};
use crate::render::raster::{Raster, decode_still, resize_rgba};

pub type PremulRgba8 = [u8; 4];

const STROKE_TOLERANCE: f64 = 0.1;

/// Layer options for [`composite_frame`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeOpts {
    /// Opacity of the previous frame's drawings. Zero skips the ghost layer.
    pub ghost_opacity: f32,
}

impl Default for CompositeOpts {
    fn default() -> Self {
        Self { ghost_opacity: 0.3 }
    }
}

impl CompositeOpts {
    /// Output frames carry only their own drawings.
    pub fn output() -> Self {
        Self { ghost_opacity: 0.0 }
    }
}

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u16(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;

    let mut out = [0u8; 4];
    out[3] = (sa + mul_div255_u16(u16::from(dst[3]), inv)).min(255) as u8;
    for i in 0..3 {
        let sc = mul_div255_u16(u16::from(src[i]), op);
        let dc = mul_div255_u16(u16::from(dst[i]), inv);
        out[i] = (sc + dc).min(255) as u8;
    }
    out
}

pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> ForgeResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ForgeError::pipeline(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// One stroked outline with its paint.
#[derive(Clone, Debug)]
pub struct StrokeOp {
    pub path: BezPath,
    pub color: Rgba8,
    pub width: f64,
}

impl StrokeOp {
    pub fn from_drawing(drawing: &Drawing) -> Option<Self> {
        drawing_path(drawing).map(|path| Self {
            path,
            color: drawing.color,
            width: drawing.pen_size,
        })
    }
}

/// Rasterize stroke ops into a transparent `width x height` layer.
pub fn rasterize_strokes(ops: &[StrokeOp], width: u32, height: u32) -> ForgeResult<Raster> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ForgeError::pipeline("layer width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ForgeError::pipeline("layer height exceeds u16"))?;

    let mut ctx = vello_cpu::RenderContext::new(w, h);
    for op in ops {
        let style = Stroke::new(op.width.max(0.5))
            .with_caps(Cap::Round)
            .with_join(Join::Round);
        let outline = kurbo::stroke(
            op.path.iter(),
            &style,
            &StrokeOpts::default(),
            STROKE_TOLERANCE,
        );
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            op.color.r, op.color.g, op.color.b, op.color.a,
        ));
        ctx.fill_path(&bezpath_to_cpu(&outline));
    }
    ctx.flush();

    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);
    Ok(Raster {
        width,
        height,
        data: pixmap.data_as_u8_slice().to_vec(),
    })
}

pub fn rasterize_drawings(drawings: &[Drawing], width: u32, height: u32) -> ForgeResult<Raster> {
    let ops: Vec<StrokeOp> = drawings.iter().filter_map(StrokeOp::from_drawing).collect();
    rasterize_strokes(&ops, width, height)
}

/// Stroke `ops` directly onto `dst` at `opacity`.
pub fn stroke_onto(dst: &mut Raster, ops: &[StrokeOp], opacity: f32) -> ForgeResult<()> {
    if ops.is_empty() {
        return Ok(());
    }
    let layer = rasterize_strokes(ops, dst.width, dst.height)?;
    over_in_place(&mut dst.data, &layer.data, opacity)
}

pub fn draw_layer(dst: &mut Raster, drawings: &[Drawing], opacity: f32) -> ForgeResult<()> {
    if drawings.is_empty() || opacity <= 0.0 {
        return Ok(());
    }
    let layer = rasterize_drawings(drawings, dst.width, dst.height)?;
    over_in_place(&mut dst.data, &layer.data, opacity)
}

/// Decode a frame's still, scaled to the frame's recorded size.
pub fn base_raster(frame: &DrawingFrame) -> ForgeResult<Raster> {
    let base = decode_still(&frame.image_data)?;
    if base.width == frame.width && base.height == frame.height {
        return Ok(base);
    }
    let img = resize_rgba(base.to_rgba_image()?, frame.size());
    Ok(Raster::from_rgba_image(img))
}

/// Compose `frame` for display or output.
///
/// Layers bottom to top: the base still, `previous`'s drawings at `opts.ghost_opacity`, the
/// frame's persisted drawings, then `pending` drawings.
pub fn composite_frame(
    frame: &DrawingFrame,
    previous: Option<&DrawingFrame>,
    pending: &[Drawing],
    opts: CompositeOpts,
) -> ForgeResult<Raster> {
    let mut out = base_raster(frame)?;
    if let Some(prev) = previous {
        draw_layer(&mut out, &prev.drawings, opts.ghost_opacity)?;
    }
    draw_layer(&mut out, &frame.drawings, 1.0)?;
    draw_layer(&mut out, pending, 1.0)?;
    Ok(out)
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
