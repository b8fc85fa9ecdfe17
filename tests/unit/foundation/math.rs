use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(0, 255), 0);
    assert_eq!(mul_div255_u16(128, 128), 64);
    assert_eq!(mul_div255_u8(200, 255), 200);
}

#[test]
fn premultiply_then_unpremultiply_is_stable_for_opaque_and_clear() {
    let mut px = vec![10u8, 20, 30, 255, 90, 80, 70, 0];
    premultiply_rgba8_in_place(&mut px);
    assert_eq!(px, vec![10, 20, 30, 255, 0, 0, 0, 0]);
    unpremultiply_rgba8_in_place(&mut px);
    assert_eq!(px, vec![10, 20, 30, 255, 0, 0, 0, 0]);
}

#[test]
fn unpremultiply_half_alpha_is_close() {
    let mut px = vec![200u8, 100, 50, 128];
    premultiply_rgba8_in_place(&mut px);
    unpremultiply_rgba8_in_place(&mut px);
    assert!((i32::from(px[0]) - 200).abs() <= 2);
    assert!((i32::from(px[1]) - 100).abs() <= 2);
    assert!((i32::from(px[2]) - 50).abs() <= 2);
    assert_eq!(px[3], 128);
}

#[test]
fn clamp_collapses_inverted_range() {
    assert_eq!(clamp_f64(5.0, 0.0, 10.0), 5.0);
    assert_eq!(clamp_f64(-1.0, 0.0, 10.0), 0.0);
    assert_eq!(clamp_f64(3.0, 10.0, 0.0), 10.0);
}
