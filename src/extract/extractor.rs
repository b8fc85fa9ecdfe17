//! Batched, cancellable still-frame extraction over a time window.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;

use crate::config::ExtractOpts;
use crate::extract::encode::{EncodePool, StillEncoder};
use crate::extract::source::VideoSource;
use crate::foundation::core::FrameSize;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::model::frame::DrawingFrame;
use crate::render::raster::resize_rgba;

// Absorbs float error in `(end - start) * fps` so exact products are not floored down.
const COUNT_EPS: f64 = 1e-9;

/// Number of frames sampled from `[start, end]` at `fps` (at least one).
pub fn frame_count(start: f64, end: f64, fps: f64) -> usize {
    let n = ((end - start) * fps + COUNT_EPS).floor();
    if n.is_finite() && n >= 1.0 {
        n as usize
    } else {
        1
    }
}

/// Evenly spaced sample times covering `[start, end]` inclusive.
pub fn timestamps(start: f64, end: f64, fps: f64) -> Vec<f64> {
    let n = frame_count(start, end, fps);
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    let mut out: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
    out[n - 1] = end;
    out
}

pub struct FrameExtractor {
    opts: ExtractOpts,
    pool: EncodePool,
}

impl FrameExtractor {
    pub fn new(opts: ExtractOpts) -> Self {
        let pool = EncodePool::new(opts.encode_threads);
        Self { opts, pool }
    }

    pub fn with_encoder(opts: ExtractOpts, encoder: Arc<dyn StillEncoder>) -> Self {
        let pool = EncodePool::with_encoder(opts.encode_threads, encoder);
        Self { opts, pool }
    }

    pub fn opts(&self) -> &ExtractOpts {
        &self.opts
    }

    pub fn pool(&self) -> &EncodePool {
        &self.pool
    }

    pub fn dispose(&self) {
        self.pool.dispose();
    }

    /// Output raster size for a source.
    pub fn canvas_for(&self, source: FrameSize) -> FrameSize {
        source.fit(self.opts.target_width, self.opts.target_height)
    }

    /// Sample `source` over `[start, end]` at `fps`.
    ///
    /// Frames come back with ids `0..N` in timestamp order. `on_progress(done, total)` fires
    /// once per finished frame. A frame that fails inside its batch is retried alone once the
    /// batches are done; only a second failure fails the extraction. Cancelling `cancel` stops at the next seek or batch boundary
    /// with [`ForgeError::Cancelled`].
    #[tracing::instrument(skip_all, fields(start = start, end = end, fps = fps))]
    pub async fn extract<P>(
        &self,
        source: &dyn VideoSource,
        fps: f64,
        start: f64,
        end: f64,
        mut on_progress: P,
        cancel: &CancellationToken,
    ) -> ForgeResult<Vec<DrawingFrame>>
    where
        P: FnMut(usize, usize) + Send,
    {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ForgeError::validation("extraction fps must be finite and > 0"));
        }
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(ForgeError::validation(format!(
                "invalid extraction window [{start}, {end}]"
            )));
        }
        let src_size = source.dimensions();
        if src_size.is_empty() {
            return Err(ForgeError::extraction(format!(
                "video has invalid dimensions {}x{}",
                src_size.width, src_size.height
            )));
        }
        let canvas = self.canvas_for(src_size);
        if canvas.is_empty() {
            return Err(ForgeError::extraction("target canvas has zero size"));
        }

        let times = timestamps(start, end, fps);
        let total = times.len();
        let started = Instant::now();
        let mut slots: Vec<Option<DrawingFrame>> = vec![None; total];
        let mut failed: Vec<usize> = Vec::new();
        let mut done = 0usize;

        for (batch_idx, batch) in times.chunks(self.opts.batch_size.max(1)).enumerate() {
            if cancel.is_cancelled() {
                return Err(ForgeError::Cancelled);
            }
            let base = batch_idx * self.opts.batch_size.max(1);
            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .enumerate()
                .map(|(i, &t)| async move {
                    (base + i, self.extract_one(source, base + i, t, canvas, cancel).await)
                })
                .collect();

            while let Some((idx, result)) = in_flight.next().await {
                match result {
                    Ok(frame) => {
                        slots[idx] = Some(frame);
                        done += 1;
                        on_progress(done, total);
                    }
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        tracing::warn!(idx, error = %e, "frame failed, retrying after the batch");
                        failed.push(idx);
                    }
                }
            }
        }

        // One slow sequential pass over the frames that failed in their batch.
        failed.sort_unstable();
        for idx in failed {
            if cancel.is_cancelled() {
                return Err(ForgeError::Cancelled);
            }
            let frame = self
                .extract_one(source, idx, times[idx], canvas, cancel)
                .await?;
            slots[idx] = Some(frame);
            done += 1;
            on_progress(done, total);
        }

        let frames: Vec<DrawingFrame> = slots.into_iter().flatten().collect();
        if frames.len() != total {
            return Err(ForgeError::extraction(format!(
                "extracted {} of {total} frames",
                frames.len()
            )));
        }
        tracing::info!(
            frames = total,
            width = canvas.width,
            height = canvas.height,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "frames extracted"
        );
        Ok(frames)
    }

    async fn extract_one(
        &self,
        source: &dyn VideoSource,
        idx: usize,
        t: f64,
        canvas: FrameSize,
        cancel: &CancellationToken,
    ) -> ForgeResult<DrawingFrame> {
        let img = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForgeError::Cancelled),
            img = source.frame_at(t) => img?,
        };
        let img = resize_rgba(img, canvas);
        let image_data = self.pool.encode(Arc::new(img)).await?;
        let id = u32::try_from(idx)
            .map_err(|_| ForgeError::extraction("frame index exceeds u32"))?;
        Ok(DrawingFrame {
            id,
            image_data: Arc::from(image_data),
            drawings: Vec::new(),
            width: canvas.width,
            height: canvas.height,
            timestamp: t,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/extract/extractor.rs"]
mod tests;
