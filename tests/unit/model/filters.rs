use super::*;

#[test]
fn trim_activity_tracks_strict_subset() {
    let t = TrimFilter::new(0.0, 10.0, 10.0).unwrap();
    assert!(!t.is_active);

    let t = TrimFilter::new(0.5, 10.0, 10.0).unwrap();
    assert!(t.is_active);

    let t = TrimFilter::new(0.0, 9.0, 10.0).unwrap();
    assert!(t.is_active);
    assert_eq!(t.len_secs(), 9.0);
}

#[test]
fn trim_rejects_inverted_or_out_of_range_windows() {
    assert!(TrimFilter::new(2.0, 2.0, 10.0).is_err());
    assert!(TrimFilter::new(3.0, 2.0, 10.0).is_err());
    assert!(TrimFilter::new(-0.1, 2.0, 10.0).is_err());
    assert!(TrimFilter::new(0.0, 10.5, 10.0).is_err());
    assert!(TrimFilter::new(0.0, f64::NAN, 10.0).is_err());
}

#[test]
fn trim_end_within_epsilon_is_clamped_to_duration() {
    let t = TrimFilter::new(1.0, 10.000_000_1, 10.0).unwrap();
    assert_eq!(t.end, 10.0);
}

#[test]
fn crop_validation_enforces_bounds_and_min_size() {
    CropRect::FULL.validate().unwrap();
    CropRect::new(20.0, 20.0, 60.0, 60.0).validate().unwrap();
    CropRect::new(90.0, 90.0, 10.0, 10.0).validate().unwrap();

    assert!(CropRect::new(95.0, 0.0, 10.0, 50.0).validate().is_err());
    assert!(CropRect::new(0.0, 0.0, 9.0, 50.0).validate().is_err());
    assert!(CropRect::new(-1.0, 0.0, 50.0, 50.0).validate().is_err());
    assert!(CropRect::new(0.0, 0.0, 50.0, f64::INFINITY).validate().is_err());
}

#[test]
fn filters_start_untrimmed_and_uncropped() {
    let f = VideoFilters::for_duration(4.0);
    assert_eq!(f.trim.start, 0.0);
    assert_eq!(f.trim.end, 4.0);
    assert!(!f.trim.is_active);
    assert!(!f.crop.is_active);
    assert_eq!(f.crop.coordinates, CropRect::FULL);
}
