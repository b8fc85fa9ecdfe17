use super::*;
use crate::foundation::core::{Point, Rgba8};

fn frame(id: u32, drawings: Vec<Drawing>) -> DrawingFrame {
    DrawingFrame {
        id,
        image_data: Arc::from(vec![7u8; 16]),
        drawings,
        width: 2,
        height: 2,
        timestamp: 0.0,
    }
}

fn line(color: Rgba8) -> Drawing {
    Drawing::new(
        Tool::Line,
        color,
        2.0,
        vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
    )
}

#[test]
fn counts_mode_misses_recolors_but_content_mode_catches_them() {
    let a = frame(0, vec![line(Rgba8::rgb(255, 0, 0))]);
    let b = frame(0, vec![line(Rgba8::rgb(0, 0, 255))]);

    assert_eq!(
        fingerprint_frame(&a, FingerprintMode::Counts),
        fingerprint_frame(&b, FingerprintMode::Counts)
    );
    assert_ne!(
        fingerprint_frame(&a, FingerprintMode::Content),
        fingerprint_frame(&b, FingerprintMode::Content)
    );
}

#[test]
fn fingerprint_is_stable_across_clones() {
    let a = frame(3, vec![line(Rgba8::rgb(1, 2, 3))]);
    let b = a.clone();
    assert_eq!(
        fingerprint_frame(&a, FingerprintMode::Content),
        fingerprint_frame(&b, FingerprintMode::Content)
    );
    let fp = fingerprint_frame(&a, FingerprintMode::Content);
    assert_eq!((fp.id, fp.drawings, fp.points), (3, 1, 2));
}

#[test]
fn lookup_requires_matching_fingerprint() {
    let mut cache = FrameCache::new(4, FingerprintMode::Content);
    let a = frame(0, vec![line(Rgba8::rgb(255, 0, 0))]);
    let fp = fingerprint_frame(&a, cache.mode());
    cache.insert(fp, Arc::from(vec![1u8]));
    assert!(cache.get(&fp).is_some());

    let edited = frame(0, vec![line(Rgba8::rgb(255, 0, 0)), line(Rgba8::rgb(0, 0, 0))]);
    assert!(cache.get(&fingerprint_frame(&edited, cache.mode())).is_none());
}

#[test]
fn eviction_drops_lowest_ids() {
    let mut cache = FrameCache::new(3, FingerprintMode::Counts);
    for id in [5, 1, 9, 3] {
        let fp = fingerprint_frame(&frame(id, vec![]), cache.mode());
        cache.insert(fp, Arc::from(vec![id as u8]));
    }
    assert_eq!(cache.len(), 3);
    assert!(!cache.contains_id(1));
    assert!(cache.contains_id(3) && cache.contains_id(5) && cache.contains_id(9));
}

#[test]
fn new_extraction_invalidates_entries() {
    let mut cache = FrameCache::new(3, FingerprintMode::Counts);
    cache.begin_extraction(1);
    let fp = fingerprint_frame(&frame(0, vec![]), cache.mode());
    cache.insert(fp, Arc::from(vec![0u8]));
    cache.begin_extraction(1);
    assert_eq!(cache.len(), 1);
    cache.begin_extraction(2);
    assert!(cache.is_empty());
}
