use anyhow::Context as _;
use image::{ImageEncoder as _, RgbaImage};

use crate::foundation::core::FrameSize;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::foundation::math::{premultiply_rgba8_in_place, unpremultiply_rgba8_in_place};

/// Premultiplied RGBA8 pixels, row-major, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Raster {
    /// Fully transparent raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let mut data = img.into_raw();
        premultiply_rgba8_in_place(&mut data);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn to_rgba_image(&self) -> ForgeResult<RgbaImage> {
        let mut data = self.data.clone();
        unpremultiply_rgba8_in_place(&mut data);
        RgbaImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| ForgeError::pipeline("raster byte length does not match its size"))
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }
}

/// Decode an encoded still (PNG or anything `image` recognizes).
pub fn decode_still(bytes: &[u8]) -> ForgeResult<Raster> {
    let dyn_img = image::load_from_memory(bytes).context("decode still image")?;
    Ok(Raster::from_rgba_image(dyn_img.to_rgba8()))
}

pub fn encode_png(raster: &Raster) -> ForgeResult<Vec<u8>> {
    encode_rgba_png(&raster.to_rgba_image()?)
}

pub fn encode_rgba_png(img: &RgbaImage) -> ForgeResult<Vec<u8>> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .context("encode png")?;
    Ok(out)
}

/// Scale `img` to exactly `size`; returns the input unchanged when it already matches.
pub fn resize_rgba(img: RgbaImage, size: FrameSize) -> RgbaImage {
    if img.dimensions() == (size.width, size.height) {
        return img;
    }
    image::imageops::resize(
        &img,
        size.width,
        size.height,
        image::imageops::FilterType::Triangle,
    )
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
