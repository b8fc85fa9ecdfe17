use super::*;
use crate::render::raster::encode_rgba_png;

fn frame(id: u32, drawings: Vec<Drawing>) -> Arc<DrawingFrame> {
    let img = image::RgbaImage::from_pixel(24, 16, image::Rgba([255, 255, 255, 255]));
    Arc::new(DrawingFrame {
        id,
        image_data: Arc::from(encode_rgba_png(&img).unwrap()),
        drawings,
        width: 24,
        height: 16,
        timestamp: f64::from(id) * 0.1,
    })
}

fn engine() -> AnnotationEngine {
    AnnotationEngine::new(&AnnotationOpts::default())
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn pen_stroke(e: &mut AnnotationEngine, pts: &[(f64, f64)]) {
    let (first, rest) = pts.split_first().unwrap();
    e.start_stroke(pt(first.0, first.1)).unwrap();
    for &(x, y) in rest {
        e.extend_stroke(pt(x, y)).unwrap();
    }
    let last = pts.last().unwrap();
    e.end_stroke(pt(last.0, last.1)).unwrap();
}

fn stored(color: Rgba8) -> Drawing {
    Drawing::new(Tool::Line, color, 2.0, vec![pt(0.0, 0.0), pt(4.0, 4.0)])
}

#[test]
fn strokes_are_ignored_while_idle() {
    let mut e = engine();
    pen_stroke(&mut e, &[(0.0, 0.0), (5.0, 5.0)]);
    assert_eq!(e.state(), EngineState::Idle);
    assert!(e.current_points().is_empty());
    assert!(e.save().is_none());
}

#[test]
fn pen_stroke_records_all_points() {
    let mut e = engine();
    e.open(frame(0, vec![]), None).unwrap();
    pen_stroke(&mut e, &[(1.0, 1.0), (5.0, 2.0), (9.0, 8.0)]);
    assert_eq!(e.current_points().len(), 1);
    assert_eq!(e.current_points()[0].points.len(), 3);
    assert_eq!(e.current_points()[0].tool, Tool::Pen);
    assert!(e.can_undo());
    let px = e.display().unwrap().pixel(5, 2).unwrap();
    assert_ne!(px, [255, 255, 255, 255], "segment should be drawn on the surface");
}

#[test]
fn single_point_pen_stroke_is_dropped() {
    let mut e = engine();
    e.open(frame(0, vec![]), None).unwrap();
    e.start_stroke(pt(3.0, 3.0)).unwrap();
    assert_eq!(e.current_points().len(), 1);
    e.end_stroke(pt(3.0, 3.0)).unwrap();
    assert!(e.current_points().is_empty());
    assert!(!e.can_undo());
}

#[test]
fn shapes_keep_exactly_start_and_end() {
    let mut e = engine();
    e.set_tool(Tool::Rectangle);
    e.open(frame(0, vec![]), None).unwrap();
    e.start_stroke(pt(2.0, 2.0)).unwrap();
    e.extend_stroke(pt(6.0, 6.0)).unwrap();
    e.extend_stroke(pt(10.0, 8.0)).unwrap();
    assert!(e.current_points().is_empty(), "shape previews are not pending drawings");
    e.end_stroke(pt(12.0, 9.0)).unwrap();

    let d = &e.current_points()[0];
    assert_eq!(d.tool, Tool::Rectangle);
    assert_eq!(d.points, vec![pt(2.0, 2.0), pt(12.0, 9.0)]);
}

#[test]
fn shape_preview_restores_snapshot_between_moves() {
    let mut e = engine();
    e.set_tool(Tool::Line);
    e.open(frame(0, vec![]), None).unwrap();
    e.start_stroke(pt(0.0, 2.0)).unwrap();
    e.extend_stroke(pt(23.0, 2.0)).unwrap();
    assert_ne!(e.display().unwrap().pixel(12, 2), Some([255, 255, 255, 255]));
    e.extend_stroke(pt(0.0, 14.0)).unwrap();
    assert_eq!(e.display().unwrap().pixel(12, 2), Some([255, 255, 255, 255]));
}

#[test]
fn undo_then_redo_restores_pending_drawings() {
    let mut e = engine();
    e.open(frame(0, vec![]), None).unwrap();
    pen_stroke(&mut e, &[(1.0, 1.0), (2.0, 2.0)]);
    e.set_tool(Tool::Circle);
    pen_stroke(&mut e, &[(8.0, 8.0), (10.0, 10.0)]);
    let before = e.current_points().to_vec();

    e.undo().unwrap();
    assert_eq!(e.current_points(), &before[..1]);
    assert!(e.can_redo());
    e.redo().unwrap();
    assert_eq!(e.current_points(), &before[..]);
    assert!(!e.can_redo());

    e.undo().unwrap();
    e.undo().unwrap();
    assert!(e.current_points().is_empty());
    e.undo().unwrap();
    assert!(e.current_points().is_empty());
}

#[test]
fn new_stroke_clears_redo() {
    let mut e = engine();
    e.open(frame(0, vec![]), None).unwrap();
    pen_stroke(&mut e, &[(1.0, 1.0), (2.0, 2.0)]);
    e.undo().unwrap();
    assert!(e.can_redo());
    pen_stroke(&mut e, &[(3.0, 3.0), (4.0, 4.0)]);
    assert!(!e.can_redo());
    e.redo().unwrap();
    assert_eq!(e.current_points().len(), 1);
}

#[test]
fn copy_from_previous_adds_one_history_entry_per_drawing() {
    let prev = frame(0, vec![stored(Rgba8::rgb(0, 255, 0)), stored(Rgba8::rgb(0, 0, 255))]);
    let mut e = engine();
    e.open(frame(1, vec![]), Some(Arc::clone(&prev))).unwrap();
    e.copy_from_previous().unwrap();
    assert_eq!(e.current_points(), &prev.drawings[..]);

    e.undo().unwrap();
    assert_eq!(e.current_points(), &prev.drawings[..1]);
    assert_eq!(prev.drawings.len(), 2, "predecessor is never mutated");
}

#[test]
fn copy_from_previous_without_drawings_is_noop() {
    let mut e = engine();
    e.open(frame(1, vec![]), Some(frame(0, vec![]))).unwrap();
    e.copy_from_previous().unwrap();
    assert!(e.current_points().is_empty());

    e.open(frame(0, vec![]), None).unwrap();
    e.copy_from_previous().unwrap();
    assert!(!e.can_undo());
}

#[test]
fn save_appends_pending_to_persisted() {
    let persisted = stored(Rgba8::rgb(1, 1, 1));
    let mut e = engine();
    e.open(frame(3, vec![persisted.clone()]), None).unwrap();
    pen_stroke(&mut e, &[(1.0, 1.0), (9.0, 9.0)]);

    let saved = e.save().unwrap();
    assert_eq!(saved.id, 3);
    assert_eq!(saved.drawings.len(), 2);
    assert_eq!(saved.drawings[0], persisted);
    assert_eq!(e.state(), EngineState::Idle);
}

#[test]
fn save_without_pending_is_noop() {
    let mut e = engine();
    e.open(frame(0, vec![stored(Rgba8::rgb(1, 1, 1))]), None).unwrap();
    assert!(e.save().is_none());
    assert_eq!(e.state(), EngineState::Editing);
}

#[test]
fn discard_persists_nothing() {
    let mut e = engine();
    e.open(frame(0, vec![]), None).unwrap();
    pen_stroke(&mut e, &[(1.0, 1.0), (9.0, 9.0)]);
    e.discard();
    assert_eq!(e.state(), EngineState::Idle);
    assert!(e.current_points().is_empty());
}

#[test]
fn clear_requires_confirmation() {
    let mut e = engine();
    e.open(frame(2, vec![stored(Rgba8::rgb(1, 1, 1))]), None).unwrap();
    pen_stroke(&mut e, &[(1.0, 1.0), (9.0, 9.0)]);

    assert!(e.clear(false).is_none());
    assert_eq!(e.state(), EngineState::Editing);

    let cleared = e.clear(true).unwrap();
    assert!(cleared.drawings.is_empty());
    assert_eq!(cleared.id, 2);
    assert_eq!(e.state(), EngineState::Idle);
    assert!(e.current_points().is_empty());
}

#[test]
fn undo_is_ignored_mid_stroke() {
    let mut e = engine();
    e.open(frame(0, vec![]), None).unwrap();
    pen_stroke(&mut e, &[(1.0, 1.0), (2.0, 2.0)]);
    e.start_stroke(pt(5.0, 5.0)).unwrap();
    e.undo().unwrap();
    assert_eq!(e.current_points().len(), 2);
    assert!(e.is_stroking());
}
