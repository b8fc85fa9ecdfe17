//! Ordered ffmpeg argument lists for every transcoder job.

use crate::foundation::error::{ForgeError, ForgeResult};
use crate::geometry::crop::CropPixels;
use crate::model::blob::mime_essence;

/// Still-sequence naming used for GIF inputs; `%05d` is the zero-based frame index.
pub const FRAME_PATTERN: &str = "frame_%05d.png";

pub fn frame_file_name(idx: usize) -> String {
    format!("frame_{idx:05}.png")
}

/// Video codec that keeps the container of `mime`.
pub fn codec_for_mime(mime: &str) -> ForgeResult<&'static str> {
    let lower = mime.to_ascii_lowercase();
    match mime_essence(mime).as_str() {
        "video/webm" if lower.contains("vp9") => Ok("libvpx-vp9"),
        "video/webm" => Ok("libvpx"),
        "video/mp4" | "video/quicktime" => Ok("libx264"),
        other => Err(ForgeError::validation(format!(
            "no video codec known for '{other}'"
        ))),
    }
}

/// `-i in -vf crop=W:H:X:Y -an -c:v <codec> out`
pub fn crop_args(input: &str, crop: &CropPixels, codec: &str, output: &str) -> Vec<String> {
    [
        "-i",
        input,
        "-vf",
        crop.filter.as_str(),
        "-an",
        "-c:v",
        codec,
        output,
    ]
    .map(str::to_string)
    .to_vec()
}

/// Re-encode a container into MP4 (H.264).
pub fn convert_args(input: &str, output: &str) -> Vec<String> {
    [
        "-i",
        input,
        "-an",
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        output,
    ]
    .map(str::to_string)
    .to_vec()
}

/// Arguments for turning an image sequence into a GIF.
#[derive(Clone, Debug, PartialEq)]
pub struct GifArgs {
    /// Rate the still sequence was sampled at.
    pub input_fps: f64,
    /// Window relative to the first input frame, in seconds.
    pub trim: Option<(f64, f64)>,
    pub width: u32,
    pub fps: u32,
    pub palette: bool,
    pub output: String,
}

impl GifArgs {
    pub fn filter_chain(&self) -> String {
        let mut chain: Vec<String> = Vec::new();
        if let Some((start, end)) = self.trim {
            chain.push(format!("trim=start={start:.3}:end={end:.3}"));
            chain.push("setpts=PTS-STARTPTS".to_string());
        }
        chain.push(format!("scale={}:-1:flags=lanczos", self.width));
        let mut out = chain.join(",");
        if self.palette {
            out.push_str(",split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse");
        }
        out
    }

    /// input selector, filters (trim, scale, palette), codec, frame rate, output.
    pub fn build(&self) -> Vec<String> {
        vec![
            "-framerate".to_string(),
            format_rate(self.input_fps),
            "-i".to_string(),
            FRAME_PATTERN.to_string(),
            "-vf".to_string(),
            self.filter_chain(),
            "-c:v".to_string(),
            "gif".to_string(),
            "-r".to_string(),
            self.fps.to_string(),
            self.output.clone(),
        ]
    }
}

fn format_rate(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as u64)
    } else {
        format!("{fps:.3}")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transcode/args.rs"]
mod tests;
