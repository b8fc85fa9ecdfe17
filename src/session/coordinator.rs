//! The editing session: single owner of filters, frames, blobs and status.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ForgeConfig;
use crate::extract::extractor::FrameExtractor;
use crate::extract::source::{SourceOpener, VideoSource};
use crate::foundation::core::FrameSize;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::geometry::crop::crop_percent_to_pixels;
use crate::model::blob::{BlobId, VideoBlob};
use crate::model::filters::{CropFilter, CropRect, TrimFilter, VideoFilters};
use crate::model::frame::{DrawingFrame, FrameSequence};
use crate::session::regen::{GifArtifact, RegenContext, RegenRequest, RegenScheduler};
use crate::session::status::{ProcessStatus, StatusBoard, StatusFlag};
use crate::session::upload::{UploadPlan, check_duration, check_upload};
use crate::store::FrameStore;
use crate::transcode::args::{codec_for_mime, convert_args, crop_args};
use crate::transcode::{TranscodeBatch, TranscoderHandle};

/// External services a session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn FrameStore>,
    pub transcoder: TranscoderHandle,
    pub opener: Arc<dyn SourceOpener>,
}

const TIME_EPS: f64 = 1e-6;

/// Progress of the running extraction as `(done, total)`.
pub type Progress = (usize, usize);

struct LoadedVideo {
    base: VideoBlob,
    current: VideoBlob,
    source: Arc<dyn VideoSource>,
    /// Size of the base video; crop percentages refer to it.
    base_size: FrameSize,
}

/// Editing state for one video.
///
/// Every change to trim, crop or frame content bumps the generation and submits a snapshot to
/// the background [`RegenScheduler`]; only the result for the newest generation is published.
pub struct EditSession {
    config: ForgeConfig,
    deps: SessionDeps,
    extractor: FrameExtractor,
    status: StatusBoard,
    scheduler: RegenScheduler,
    cancel: CancellationToken,
    op_cancel: CancellationToken,
    progress: watch::Sender<Progress>,
    video: Option<LoadedVideo>,
    duration: f64,
    filters: VideoFilters,
    frames: FrameSequence,
    window: (f64, f64),
    generation: u64,
    extraction: u64,
}

impl EditSession {
    /// Create a session. Must run inside a tokio runtime.
    pub fn new(config: ForgeConfig, deps: SessionDeps) -> ForgeResult<Self> {
        config.validate()?;
        let status = StatusBoard::new();
        let scheduler = RegenScheduler::spawn(
            RegenContext {
                transcoder: deps.transcoder.clone(),
                gif: config.gif.clone(),
                status: status.clone(),
            },
            &config.debounce,
            &config.cache,
        );
        let cancel = CancellationToken::new();
        let op_cancel = cancel.child_token();
        let (progress, _) = watch::channel((0, 0));
        Ok(Self {
            extractor: FrameExtractor::new(config.extract.clone()),
            config,
            deps,
            status,
            scheduler,
            cancel,
            op_cancel,
            progress,
            video: None,
            duration: 0.0,
            filters: VideoFilters::for_duration(0.0),
            frames: FrameSequence::default(),
            window: (0.0, 0.0),
            generation: 0,
            extraction: 0,
        })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn filters(&self) -> &VideoFilters {
        &self.filters
    }

    pub fn frames(&self) -> &FrameSequence {
        &self.frames
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Window the current frames were sampled from.
    pub fn extracted_window(&self) -> (f64, f64) {
        self.window
    }

    pub fn base_blob(&self) -> Option<&VideoBlob> {
        self.video.as_ref().map(|v| &v.base)
    }

    pub fn current_blob(&self) -> Option<&VideoBlob> {
        self.video.as_ref().map(|v| &v.current)
    }

    /// Size of the video frames are currently extracted from.
    pub fn video_size(&self) -> Option<FrameSize> {
        self.video.as_ref().map(|v| v.source.dimensions())
    }

    pub fn status(&self) -> ProcessStatus {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ProcessStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn artifact(&self) -> Option<Arc<GifArtifact>> {
        self.scheduler.artifact()
    }

    pub fn subscribe_artifact(&self) -> watch::Receiver<Option<Arc<GifArtifact>>> {
        self.scheduler.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.scheduler.last_error()
    }

    pub fn scheduler(&self) -> &RegenScheduler {
        &self.scheduler
    }

    /// Token that cancels the running extraction or crop when triggered from another task.
    pub fn canceller(&mut self) -> CancellationToken {
        self.fresh_op_token()
    }

    fn fresh_op_token(&mut self) -> CancellationToken {
        if self.op_cancel.is_cancelled() && !self.cancel.is_cancelled() {
            self.op_cancel = self.cancel.child_token();
        }
        self.op_cancel.clone()
    }

    fn loaded(&self) -> ForgeResult<&LoadedVideo> {
        self.video
            .as_ref()
            .ok_or_else(|| ForgeError::validation("no video is loaded"))
    }

    /// Validate, convert if needed, persist and extract a new video.
    #[tracing::instrument(skip_all, fields(mime = %blob.mime, bytes = blob.len()))]
    pub async fn load_video(&mut self, blob: VideoBlob) -> ForgeResult<()> {
        let plan = check_upload(&blob, &self.config.upload)?;
        let blob = match plan {
            UploadPlan::Native => blob,
            UploadPlan::Convert => {
                let _status = self.status.raise(StatusFlag::Converting);
                let input = format!("upload.{}", blob.extension());
                let bytes = self
                    .deps
                    .transcoder
                    .run(TranscodeBatch {
                        inputs: vec![(input.clone(), Arc::clone(&blob.bytes))],
                        argv: convert_args(&input, "converted.mp4"),
                        output: "converted.mp4".to_string(),
                    })
                    .await?;
                tracing::info!(from = %blob.mime, bytes = bytes.len(), "video converted to mp4");
                VideoBlob::new(bytes, "video/mp4")
            }
        };

        let source = self.deps.opener.open(&blob).await?;
        let duration = source.duration();
        check_duration(duration, &self.config.upload)?;
        let size = source.dimensions();
        if size.is_empty() {
            return Err(ForgeError::validation("video has no picture"));
        }

        let filters = VideoFilters::for_duration(duration);
        let token = self.fresh_op_token();
        let frames = self.sample(source.as_ref(), filters.trim, &token).await?;

        self.deps.store.save_blob(BlobId::BaseVideo, &blob).await?;
        self.deps.store.save_blob(BlobId::CurrentVideo, &blob).await?;
        self.persist_frames(&frames).await?;
        self.video = Some(LoadedVideo {
            base: blob.clone(),
            current: blob,
            source,
            base_size: size,
        });
        self.duration = duration;
        self.filters = filters;
        self.install_frames(frames, filters.trim);
        self.bump();
        Ok(())
    }

    /// Change the trim window.
    ///
    /// A window inside the one the frames were sampled from only changes the GIF filter chain.
    /// A window reaching past it re-samples the frames first, which drops their drawings.
    pub async fn set_trim(&mut self, start: f64, end: f64) -> ForgeResult<()> {
        let source = Arc::clone(&self.loaded()?.source);
        let _status = self.status.raise(StatusFlag::Trimming);
        let trim = TrimFilter::new(start, end, self.duration)?;
        if trim == self.filters.trim {
            return Ok(());
        }
        if !self.window_covers(&trim) {
            let token = self.fresh_op_token();
            let frames = self.sample(source.as_ref(), trim, &token).await?;
            self.persist_frames(&frames).await?;
            self.install_frames(frames, trim);
            tracing::info!(start, end, "trim left the sampled window, frames re-sampled");
        }
        self.filters.trim = trim;
        tracing::debug!(start, end, active = trim.is_active, "trim updated");
        self.bump();
        Ok(())
    }

    fn window_covers(&self, trim: &TrimFilter) -> bool {
        !self.frames.is_empty()
            && trim.start >= self.window.0 - TIME_EPS
            && trim.end <= self.window.1 + TIME_EPS
    }

    /// Re-extract frames over the current trim window.
    pub async fn refresh_frames(&mut self) -> ForgeResult<()> {
        let source = Arc::clone(&self.loaded()?.source);
        let trim = self.filters.trim;
        let token = self.fresh_op_token();
        let frames = self.sample(source.as_ref(), trim, &token).await?;
        self.persist_frames(&frames).await?;
        self.install_frames(frames, trim);
        self.bump();
        Ok(())
    }

    pub fn set_crop_mode(&mut self, on: bool) {
        self.filters.crop.is_crop_mode = on;
    }

    /// Crop the base video into a new current video and re-extract from it.
    ///
    /// Nothing changes unless the crop, the re-extraction and the store writes all succeed.
    #[tracing::instrument(skip_all, fields(x = coords.x, y = coords.y, w = coords.width, h = coords.height))]
    pub async fn apply_crop(&mut self, coords: CropRect) -> ForgeResult<()> {
        coords.validate()?;
        let (base, base_size) = {
            let v = self.loaded()?;
            (v.base.clone(), v.base_size)
        };
        let codec = codec_for_mime(&base.mime)?;
        let token = self.fresh_op_token();
        let _status = self.status.raise(StatusFlag::Cropping);

        let pixels = crop_percent_to_pixels(&coords, base_size.width, base_size.height);
        if pixels.width == 0 || pixels.height == 0 {
            return Err(ForgeError::validation("crop box is empty at this resolution"));
        }
        let input = format!("input.{}", base.extension());
        let output = format!("cropped.{}", base.extension());
        // The batch runs to completion so its files are always cleaned up.
        let bytes = self
            .deps
            .transcoder
            .run(TranscodeBatch {
                inputs: vec![(input.clone(), Arc::clone(&base.bytes))],
                argv: crop_args(&input, &pixels, codec, &output),
                output: output.clone(),
            })
            .await?;
        if token.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }
        let cropped = VideoBlob::new(bytes, base.mime.clone());

        let source = self.deps.opener.open(&cropped).await?;
        let trim = fit_trim(self.filters.trim, self.duration, source.duration());
        let frames = self.sample(source.as_ref(), trim, &token).await?;

        self.deps
            .store
            .save_blob(BlobId::CurrentVideo, &cropped)
            .await?;
        self.persist_frames(&frames).await?;
        self.install_video(cropped, source, trim);
        self.filters.crop = CropFilter {
            coordinates: coords,
            is_active: true,
            is_crop_mode: false,
        };
        self.install_frames(frames, trim);
        tracing::info!(filter = %pixels.filter, "crop applied");
        self.bump();
        Ok(())
    }

    /// Make the base video current again and re-extract.
    pub async fn reset_crop(&mut self) -> ForgeResult<()> {
        let base = self.loaded()?.base.clone();
        let token = self.fresh_op_token();
        let _status = self.status.raise(StatusFlag::Cropping);

        let source = self.deps.opener.open(&base).await?;
        let trim = fit_trim(self.filters.trim, self.duration, source.duration());
        let frames = self.sample(source.as_ref(), trim, &token).await?;

        self.deps.store.save_blob(BlobId::CurrentVideo, &base).await?;
        self.persist_frames(&frames).await?;
        self.install_video(base, source, trim);
        self.filters.crop = CropFilter::default();
        self.install_frames(frames, trim);
        tracing::info!("crop reset");
        self.bump();
        Ok(())
    }

    fn install_video(&mut self, blob: VideoBlob, source: Arc<dyn VideoSource>, trim: TrimFilter) {
        let duration = source.duration();
        if let Some(v) = self.video.as_mut() {
            v.current = blob;
            v.source = source;
        }
        if duration_drifted(self.duration, duration) {
            self.duration = duration;
        }
        self.filters.trim = trim;
    }

    /// The frame with `id` and the one before it, for the annotation engine.
    pub fn frame_with_previous(
        &self,
        id: u32,
    ) -> Option<(Arc<DrawingFrame>, Option<Arc<DrawingFrame>>)> {
        let frame = Arc::clone(self.frames.get(id)?);
        Some((frame, self.frames.previous(id).cloned()))
    }

    /// Store an annotated frame returned by the annotation engine.
    ///
    /// The frame must come from the current extraction; one opened before a re-extraction is
    /// rejected.
    pub async fn commit_frame(&mut self, frame: DrawingFrame) -> ForgeResult<()> {
        let next = self.frames.replace(frame.clone())?;
        self.deps.store.save_frame(&frame).await?;
        self.frames = next;
        self.bump();
        Ok(())
    }

    /// Build the GIF for the current state immediately.
    pub async fn regenerate_now(&mut self) -> ForgeResult<Arc<GifArtifact>> {
        if self.frames.is_empty() {
            return Err(ForgeError::validation("no frames to render"));
        }
        self.generation += 1;
        self.scheduler.regenerate_now(self.request()).await
    }

    /// Rebuild the session from the store. Returns `false` when nothing was stored.
    ///
    /// Frames are read in pages of `store.hydrate_batch`; `on_page(loaded, total)` fires after
    /// each page.
    pub async fn restore<P>(&mut self, mut on_page: P) -> ForgeResult<bool>
    where
        P: FnMut(usize, usize) + Send,
    {
        let store = Arc::clone(&self.deps.store);
        let Some(base) = store.get_blob(BlobId::BaseVideo).await? else {
            return Ok(false);
        };
        let current = store
            .get_blob(BlobId::CurrentVideo)
            .await?
            .unwrap_or_else(|| base.clone());
        let cropped = base.bytes != current.bytes;
        let current = if cropped { current } else { base.clone() };

        let source = self.deps.opener.open(&current).await?;
        let base_size = if cropped {
            self.deps.opener.open(&base).await?.dimensions()
        } else {
            source.dimensions()
        };
        let duration = source.duration();

        let total = store.frame_count().await?;
        let page = self.config.store.hydrate_batch.max(1);
        let mut frames = Vec::with_capacity(total);
        while frames.len() < total {
            let batch = store.frames_batch(frames.len(), page).await?;
            if batch.is_empty() {
                break;
            }
            frames.extend(batch);
            on_page(frames.len(), total);
        }
        let window = match (frames.first(), frames.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp.max(first.timestamp)),
            _ => (0.0, duration),
        };

        self.video = Some(LoadedVideo {
            base,
            current,
            source,
            base_size,
        });
        self.duration = duration;
        self.filters = VideoFilters::for_duration(duration);
        if let Ok(trim) = TrimFilter::new(window.0, window.1, duration) {
            self.filters.trim = trim;
        }
        self.filters.crop.is_active = cropped;
        self.frames = FrameSequence::new(frames)?;
        self.window = window;
        self.extraction += 1;
        tracing::info!(frames = self.frames.len(), cropped, "session restored");
        if !self.frames.is_empty() {
            self.bump();
        }
        Ok(true)
    }

    /// Cancel in-flight work, stop regeneration, release workers and delete stored data.
    pub async fn teardown(&mut self) -> ForgeResult<()> {
        self.cancel.cancel();
        self.scheduler.shutdown().await;
        self.extractor.dispose();
        self.video = None;
        self.frames = FrameSequence::default();
        self.deps.store.delete_all().await?;
        tracing::info!("session torn down");
        Ok(())
    }

    /// Sample `source` over `trim` without touching session state.
    async fn sample(
        &self,
        source: &dyn VideoSource,
        trim: TrimFilter,
        token: &CancellationToken,
    ) -> ForgeResult<FrameSequence> {
        let _status = self.status.raise(StatusFlag::FrameExtracting);
        let progress = &self.progress;
        progress.send_replace((0, 0));

        let frames = self
            .extractor
            .extract(
                source,
                self.config.extract.fps,
                trim.start,
                trim.end,
                |done, total| {
                    progress.send_replace((done, total));
                },
                token,
            )
            .await?;
        FrameSequence::new(frames)
    }

    async fn persist_frames(&self, frames: &FrameSequence) -> ForgeResult<()> {
        let stored: Vec<Arc<DrawingFrame>> = frames.iter().cloned().collect();
        self.deps.store.save_frames(&stored).await
    }

    fn install_frames(&mut self, frames: FrameSequence, trim: TrimFilter) {
        self.frames = frames;
        self.window = (trim.start, trim.end);
        self.extraction += 1;
    }

    fn request(&self) -> RegenRequest {
        RegenRequest {
            generation: self.generation,
            extraction: self.extraction,
            frames: self.frames.clone(),
            filters: self.filters,
            window: self.window,
            input_fps: self.config.extract.fps,
        }
    }

    fn bump(&mut self) {
        self.generation += 1;
        if !self.frames.is_empty() {
            self.scheduler.submit(self.request());
        }
    }
}

/// Re-encoding can shift the duration slightly.
fn duration_drifted(old: f64, new: f64) -> bool {
    new.is_finite() && new > 0.0 && (new - old).abs() > TIME_EPS
}

/// Keep `trim` inside a re-encoded video of duration `new`.
fn fit_trim(trim: TrimFilter, old: f64, new: f64) -> TrimFilter {
    if !duration_drifted(old, new) {
        return trim;
    }
    if !trim.is_active {
        return TrimFilter::full(new);
    }
    let end = trim.end.min(new);
    let start = trim.start.min(end * 0.999);
    TrimFilter::new(start, end, new).unwrap_or(TrimFilter::full(new))
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
