//! Seekable video sources.

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;

use crate::foundation::core::FrameSize;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::model::blob::VideoBlob;

/// Seeks never land closer than this to the end of the stream; decoders return nothing there.
const END_GUARD_SECS: f64 = 0.05;

/// A video that can be sampled at arbitrary times.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Natural size of decoded frames.
    fn dimensions(&self) -> FrameSize;

    /// Length in seconds.
    fn duration(&self) -> f64;

    /// Seek to `t` seconds and decode one frame (straight-alpha RGBA).
    async fn frame_at(&self, t: f64) -> ForgeResult<RgbaImage>;
}

/// Turns an encoded blob into a [`VideoSource`].
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self, blob: &VideoBlob) -> ForgeResult<Arc<dyn VideoSource>>;
}

/// Opens blobs with the system `ffprobe` / `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegOpener;

#[async_trait]
impl SourceOpener for FfmpegOpener {
    async fn open(&self, blob: &VideoBlob) -> ForgeResult<Arc<dyn VideoSource>> {
        Ok(Arc::new(FfmpegVideoSource::open(blob).await?))
    }
}

/// Decodes frames with one `ffmpeg` invocation per seek.
///
/// The blob is written to a temporary file that lives as long as the source.
pub struct FfmpegVideoSource {
    file: tempfile::NamedTempFile,
    size: FrameSize,
    duration: f64,
}

impl FfmpegVideoSource {
    pub async fn open(blob: &VideoBlob) -> ForgeResult<Self> {
        let bytes = Arc::clone(&blob.bytes);
        let suffix = format!(".{}", blob.extension());
        let file = tokio::task::spawn_blocking(move || -> ForgeResult<tempfile::NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("gifforge-src-")
                .suffix(&suffix)
                .tempfile()
                .map_err(|e| ForgeError::extraction(format!("create temp video file: {e}")))?;
            file.write_all(&bytes)
                .and_then(|()| file.flush())
                .map_err(|e| ForgeError::extraction(format!("write temp video file: {e}")))?;
            Ok(file)
        })
        .await
        .map_err(|e| ForgeError::extraction(format!("temp file task failed: {e}")))??;

        let (size, duration) = probe(file.path()).await?;
        tracing::debug!(
            width = size.width,
            height = size.height,
            duration,
            "probed video source"
        );
        Ok(Self {
            file,
            size,
            duration,
        })
    }
}

#[async_trait]
impl VideoSource for FfmpegVideoSource {
    fn dimensions(&self) -> FrameSize {
        self.size
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    async fn frame_at(&self, t: f64) -> ForgeResult<RgbaImage> {
        let seek = t.min((self.duration - END_GUARD_SECS).max(0.0)).max(0.0);
        let out = tokio::process::Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{seek:.6}")])
            .arg("-i")
            .arg(self.file.path())
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| tool_error("ffmpeg", e))?;
        if !out.status.success() {
            return Err(ForgeError::extraction(format!(
                "ffmpeg decode at {seek:.3}s failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let expected = self.size.width as usize * self.size.height as usize * 4;
        if out.stdout.len() < expected {
            return Err(ForgeError::extraction(format!(
                "ffmpeg returned {} bytes at {seek:.3}s, expected {expected}",
                out.stdout.len()
            )));
        }
        let mut raw = out.stdout;
        raw.truncate(expected);
        RgbaImage::from_raw(self.size.width, self.size.height, raw)
            .ok_or_else(|| ForgeError::extraction("decoded frame has invalid size"))
    }
}

fn tool_error(tool: &str, e: std::io::Error) -> ForgeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ForgeError::capability(format!("'{tool}' was not found on PATH"))
    } else {
        ForgeError::extraction(format!("failed to run {tool}: {e}"))
    }
}

async fn probe(path: &Path) -> ForgeResult<(FrameSize, f64)> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| tool_error("ffprobe", e))?;
    if !out.status.success() {
        return Err(ForgeError::extraction(format!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ForgeError::extraction(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ForgeError::extraction("no video stream found"))?;
    let size = FrameSize::new(video.width.unwrap_or(0), video.height.unwrap_or(0));

    // Recorded WebM often lacks a stream duration; the container one is authoritative then.
    let duration = parsed
        .format
        .and_then(|f| f.duration)
        .or_else(|| video.duration.clone())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ForgeError::extraction("video duration is unknown"))?;
    Ok((size, duration))
}
