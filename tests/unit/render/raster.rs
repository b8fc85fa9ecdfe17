use super::*;

#[test]
fn png_roundtrip_preserves_opaque_pixels() {
    let mut img = RgbaImage::new(3, 2);
    img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    img.put_pixel(2, 1, image::Rgba([0, 10, 200, 255]));

    let png = encode_rgba_png(&img).unwrap();
    let raster = decode_still(&png).unwrap();
    assert_eq!(raster.size(), FrameSize::new(3, 2));
    assert_eq!(raster.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(raster.pixel(2, 1), Some([0, 10, 200, 255]));
    assert_eq!(raster.pixel(1, 0), Some([0, 0, 0, 0]));
    assert_eq!(raster.pixel(3, 0), None);
}

#[test]
fn raster_is_premultiplied() {
    let img = RgbaImage::from_pixel(1, 1, image::Rgba([200, 100, 50, 128]));
    let raster = Raster::from_rgba_image(img);
    assert_eq!(raster.pixel(0, 0), Some([100, 50, 25, 128]));
}

#[test]
fn resize_only_when_needed() {
    let img = RgbaImage::new(8, 4);
    assert_eq!(resize_rgba(img.clone(), FrameSize::new(8, 4)).dimensions(), (8, 4));
    assert_eq!(resize_rgba(img, FrameSize::new(4, 2)).dimensions(), (4, 2));
}

#[test]
fn decode_rejects_garbage() {
    assert!(decode_still(b"not an image").is_err());
}
