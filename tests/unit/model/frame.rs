use super::*;

fn frame(id: u32) -> DrawingFrame {
    DrawingFrame {
        id,
        image_data: Arc::from(vec![id as u8; 4]),
        drawings: Vec::new(),
        width: 8,
        height: 6,
        timestamp: f64::from(id) * 0.1,
    }
}

fn pen(points: &[(f64, f64)]) -> Drawing {
    Drawing::new(
        Tool::Pen,
        Rgba8::rgb(0, 0, 0),
        2.0,
        points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
    )
}

#[test]
fn sequence_requires_contiguous_ids() {
    assert!(FrameSequence::new(vec![frame(0), frame(1), frame(2)]).is_ok());
    assert!(FrameSequence::new(vec![frame(0), frame(2)]).is_err());
    assert!(FrameSequence::new(vec![frame(1)]).is_err());
}

#[test]
fn replace_shares_untouched_frames_and_leaves_old_snapshot_intact() {
    let seq = FrameSequence::new(vec![frame(0), frame(1), frame(2)]).unwrap();
    let edited = seq
        .get(1)
        .unwrap()
        .with_drawings(vec![pen(&[(0.0, 0.0), (1.0, 1.0)])]);

    let next = seq.replace(edited).unwrap();
    assert_eq!(next.version(), seq.version() + 1);
    assert!(seq.get(1).unwrap().drawings.is_empty());
    assert_eq!(next.get(1).unwrap().drawings.len(), 1);
    assert!(Arc::ptr_eq(seq.get(0).unwrap(), next.get(0).unwrap()));
    assert!(Arc::ptr_eq(seq.get(2).unwrap(), next.get(2).unwrap()));
    assert!(Arc::ptr_eq(
        &seq.get(1).unwrap().image_data,
        &next.get(1).unwrap().image_data
    ));
    assert!(next.has_drawings());
    assert!(!seq.has_drawings());
}

#[test]
fn replace_rejects_unknown_id_and_size_change() {
    let seq = FrameSequence::new(vec![frame(0)]).unwrap();
    assert!(seq.replace(frame(3)).is_err());

    let mut resized = DrawingFrame::clone(seq.get(0).unwrap());
    resized.width = 100;
    assert!(seq.replace(resized).is_err());
}

#[test]
fn replace_refuses_frames_from_another_extraction() {
    let old = FrameSequence::new(vec![frame(0), frame(1)]).unwrap();
    let mut resampled = vec![frame(0), frame(1)];
    resampled[1].timestamp = 0.75;
    let seq = FrameSequence::new(resampled).unwrap();

    let stale = old.get(1).unwrap().with_drawings(vec![pen(&[(0.0, 0.0), (1.0, 1.0)])]);
    let err = seq.replace(stale).unwrap_err();
    assert!(matches!(err, ForgeError::Validation(_)));

    // Same pixels and time but a different buffer is still a different extraction.
    let lookalike = frame(0);
    assert!(seq.replace(lookalike).is_err());
    assert_eq!(seq.get(1).unwrap().timestamp, 0.75);

    let fresh = seq.get(1).unwrap().with_drawings(vec![pen(&[(0.0, 0.0), (1.0, 1.0)])]);
    assert!(seq.replace(fresh).is_ok());
}

#[test]
fn previous_follows_id_order() {
    let seq = FrameSequence::new(vec![frame(0), frame(1)]).unwrap();
    assert!(seq.previous(0).is_none());
    assert_eq!(seq.previous(1).unwrap().id, 0);
}

#[test]
fn drawing_renderability_and_point_totals() {
    let mut f = frame(0);
    f.drawings = vec![pen(&[(0.0, 0.0)]), pen(&[(0.0, 0.0), (2.0, 2.0), (3.0, 1.0)])];
    assert!(!f.drawings[0].is_renderable());
    assert!(f.drawings[1].is_renderable());
    assert_eq!(f.total_points(), 4);
    assert!(Tool::Circle.is_shape());
    assert!(!Tool::Pen.is_shape());
}

#[test]
fn tool_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Tool::Rectangle).unwrap(), "\"rectangle\"");
    let d: Drawing = serde_json::from_str(
        r##"{"points":[{"x":1.0,"y":2.0},{"x":3.0,"y":4.0}],"color":"#00ff00","pen_size":3.0,"tool":"line"}"##,
    )
    .unwrap();
    assert_eq!(d.tool, Tool::Line);
    assert_eq!(d.points[1], Point::new(3.0, 4.0));
}
