use std::sync::Arc;

use super::*;
use crate::foundation::core::Point;
use crate::model::frame::Tool;
use crate::render::raster::encode_rgba_png;

fn white_frame(w: u32, h: u32) -> DrawingFrame {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
    DrawingFrame {
        id: 0,
        image_data: Arc::from(encode_rgba_png(&img).unwrap()),
        drawings: Vec::new(),
        width: w,
        height: h,
        timestamp: 0.0,
    }
}

fn hline(color: Rgba8, y: f64) -> Drawing {
    Drawing::new(
        Tool::Line,
        color,
        3.0,
        vec![Point::new(0.0, y), Point::new(16.0, y)],
    )
}

#[test]
fn over_opacity_0_is_noop() {
    let dst = [10, 20, 30, 40];
    assert_eq!(over(dst, [255, 255, 255, 255], 0.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    assert_eq!(over([1, 2, 3, 255], [9, 8, 7, 255], 1.0), [9, 8, 7, 255]);
}

#[test]
fn over_in_place_rejects_mismatched_buffers() {
    let mut dst = vec![0u8; 8];
    assert!(over_in_place(&mut dst, &[0u8; 4], 1.0).is_err());
}

#[test]
fn frame_drawings_are_painted_over_the_base() {
    let mut frame = white_frame(16, 16);
    frame.drawings = vec![hline(Rgba8::rgb(0, 0, 0), 8.0)];

    let out = composite_frame(&frame, None, &[], CompositeOpts::output()).unwrap();
    assert_eq!(out.size(), frame.size());
    let on_line = out.pixel(8, 8).unwrap();
    assert!(on_line[0] < 40, "expected dark pixel, got {on_line:?}");
    assert_eq!(out.pixel(8, 1), Some([255, 255, 255, 255]));
}

#[test]
fn previous_frame_is_ghosted() {
    let frame = white_frame(16, 16);
    let mut prev = white_frame(16, 16);
    prev.drawings = vec![hline(Rgba8::rgb(255, 0, 0), 8.0)];

    let out = composite_frame(&frame, Some(&prev), &[], CompositeOpts { ghost_opacity: 0.3 })
        .unwrap();
    let px = out.pixel(8, 8).unwrap();
    assert_eq!(px[0], 255);
    assert!(px[1] > 150 && px[1] < 210, "expected a faint tint, got {px:?}");

    let hidden = composite_frame(&frame, Some(&prev), &[], CompositeOpts::output()).unwrap();
    assert_eq!(hidden.pixel(8, 8), Some([255, 255, 255, 255]));
}

#[test]
fn pending_drawings_are_topmost() {
    let mut frame = white_frame(16, 16);
    frame.drawings = vec![hline(Rgba8::rgb(255, 0, 0), 8.0)];
    let pending = vec![hline(Rgba8::rgb(0, 0, 255), 8.0)];

    let out = composite_frame(&frame, None, &pending, CompositeOpts::default()).unwrap();
    let px = out.pixel(8, 8).unwrap();
    assert!(px[2] > 200 && px[0] < 60, "expected blue on top, got {px:?}");
}

#[test]
fn incomplete_shapes_are_skipped() {
    let mut frame = white_frame(8, 8);
    frame.drawings = vec![Drawing::new(
        Tool::Rectangle,
        Rgba8::rgb(0, 0, 0),
        2.0,
        vec![Point::new(4.0, 4.0)],
    )];
    let out = composite_frame(&frame, None, &[], CompositeOpts::output()).unwrap();
    assert!(out.data.chunks_exact(4).all(|px| px == [255, 255, 255, 255]));
}

#[test]
fn base_is_scaled_to_frame_size() {
    let mut frame = white_frame(8, 8);
    frame.width = 4;
    frame.height = 4;
    let out = composite_frame(&frame, None, &[], CompositeOpts::output()).unwrap();
    assert_eq!(out.size(), crate::foundation::core::FrameSize::new(4, 4));
}
