//! Debounced, cancellable GIF regeneration.
//!
//! [`RegenScheduler`] owns a background task that receives immutable [`RegenRequest`] snapshots,
//! waits out the debounce window, then composites and transcodes the newest one. The task owns
//! the [`FrameCache`].
//!
//! A request arriving while a job runs cancels that job, unless the job was started because the
//! max-wait bound expired: such a job runs to completion so a steady stream of edits still
//! yields previews. Publication is monotonic. A cancelled job never publishes, and a result
//! older than the published artifact is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant as StdInstant;

use rayon::prelude::*;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{CacheOpts, DebounceOpts, GifOpts};
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::model::filters::VideoFilters;
use crate::model::frame::{DrawingFrame, FrameSequence};
use crate::render::composite::{CompositeOpts, composite_frame};
use crate::render::raster::encode_png;
use crate::session::cache::{FrameCache, FrameFingerprint, fingerprint_frame};
use crate::session::debounce::Debounce;
use crate::session::status::{StatusBoard, StatusFlag};
use crate::transcode::args::{GifArgs, frame_file_name};
use crate::transcode::{TranscodeBatch, TranscoderHandle};

const TIME_EPS: f64 = 1e-6;
const OUTPUT_NAME: &str = "output.gif";

/// Everything one regeneration needs, captured at submit time.
#[derive(Clone, Debug)]
pub struct RegenRequest {
    pub generation: u64,
    /// Bumped whenever frames are re-extracted; cached composites never cross extractions.
    pub extraction: u64,
    pub frames: FrameSequence,
    pub filters: VideoFilters,
    /// Source window `[start, end]` the frames were sampled from.
    pub window: (f64, f64),
    /// Rate the frames were sampled at.
    pub input_fps: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegenStats {
    pub frames_total: usize,
    /// Frames with drawings that had to be composited.
    pub frames_composited: usize,
    /// Frames with drawings served from the cache.
    pub frames_cached: usize,
    /// Frames without drawings, passed through as extracted.
    pub frames_passthrough: usize,
}

/// An encoded GIF and the request generation it was built from.
#[derive(Clone, Debug)]
pub struct GifArtifact {
    pub generation: u64,
    pub bytes: Arc<[u8]>,
    pub stats: RegenStats,
}

#[derive(Clone)]
pub struct RegenContext {
    pub transcoder: TranscoderHandle,
    pub gif: GifOpts,
    pub status: StatusBoard,
}

/// Trim relative to the first extracted frame, or `None` when the frames already match it.
pub fn relative_trim(filters: &VideoFilters, window: (f64, f64)) -> Option<(f64, f64)> {
    let (w_start, w_end) = window;
    let start = filters.trim.start.max(w_start);
    let end = filters.trim.end.min(w_end);
    let narrower = start > w_start + TIME_EPS || end < w_end - TIME_EPS;
    if !narrower || end <= start {
        return None;
    }
    Some((start - w_start, end - w_start))
}

/// Build the GIF for `req`, reusing and refreshing `cache`.
#[tracing::instrument(skip_all, fields(generation = req.generation, frames = req.frames.len()))]
pub async fn regenerate(
    ctx: &RegenContext,
    cache: &mut FrameCache,
    req: &RegenRequest,
    cancel: &CancellationToken,
) -> ForgeResult<GifArtifact> {
    if req.frames.is_empty() {
        return Err(ForgeError::pipeline("no frames to encode"));
    }
    let started = StdInstant::now();
    cache.begin_extraction(req.extraction);

    let mut stats = RegenStats {
        frames_total: req.frames.len(),
        ..RegenStats::default()
    };
    let mut encoded: Vec<Option<Arc<[u8]>>> = vec![None; req.frames.len()];
    let mut misses: Vec<(usize, Arc<DrawingFrame>, FrameFingerprint)> = Vec::new();
    for (idx, frame) in req.frames.iter().enumerate() {
        if frame.drawings.is_empty() {
            encoded[idx] = Some(Arc::clone(&frame.image_data));
            stats.frames_passthrough += 1;
            continue;
        }
        let fp = fingerprint_frame(frame, cache.mode());
        match cache.get(&fp) {
            Some(png) => {
                encoded[idx] = Some(png);
                stats.frames_cached += 1;
            }
            None => misses.push((idx, Arc::clone(frame), fp)),
        }
    }

    if cancel.is_cancelled() {
        return Err(ForgeError::Cancelled);
    }

    if !misses.is_empty() {
        stats.frames_composited = misses.len();
        let jobs: Vec<Arc<DrawingFrame>> = misses.iter().map(|(_, f, _)| Arc::clone(f)).collect();
        let work = tokio::task::spawn_blocking(move || {
            jobs.par_iter()
                .map(|f| {
                    let raster = composite_frame(f, None, &[], CompositeOpts::output())?;
                    encode_png(&raster)
                })
                .collect::<Vec<ForgeResult<Vec<u8>>>>()
        });
        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForgeError::Cancelled),
            r = work => r.map_err(|e| ForgeError::pipeline(format!("composite task failed: {e}")))?,
        };
        for ((idx, _, fp), result) in misses.into_iter().zip(results) {
            let png: Arc<[u8]> = Arc::from(result?);
            cache.insert(fp, Arc::clone(&png));
            encoded[idx] = Some(png);
        }
    }

    if cancel.is_cancelled() {
        return Err(ForgeError::Cancelled);
    }

    let inputs = encoded
        .into_iter()
        .enumerate()
        .map(|(idx, png)| {
            png.map(|png| (frame_file_name(idx), png))
                .ok_or_else(|| ForgeError::pipeline(format!("frame {idx} was not encoded")))
        })
        .collect::<ForgeResult<Vec<_>>>()?;
    let args = GifArgs {
        input_fps: req.input_fps,
        trim: relative_trim(&req.filters, req.window),
        width: ctx.gif.width,
        fps: ctx.gif.fps,
        palette: ctx.gif.palette,
        output: OUTPUT_NAME.to_string(),
    };
    // The transcoder batch is never abandoned halfway; its cleanup must run.
    let bytes = ctx
        .transcoder
        .run(TranscodeBatch {
            inputs,
            argv: args.build(),
            output: OUTPUT_NAME.to_string(),
        })
        .await?;

    tracing::info!(
        bytes = bytes.len(),
        composited = stats.frames_composited,
        cached = stats.frames_cached,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "gif regenerated"
    );
    Ok(GifArtifact {
        generation: req.generation,
        bytes: Arc::from(bytes),
        stats,
    })
}

type Reply = oneshot::Sender<ForgeResult<Arc<GifArtifact>>>;

enum Command {
    Submit(RegenRequest),
    Now(RegenRequest, Reply),
    Shutdown,
}

struct Job {
    handle: JoinHandle<(FrameCache, u64, ForgeResult<GifArtifact>)>,
    cancel: CancellationToken,
    waiters: Vec<Reply>,
    /// Started by the max-wait bound; newer submits do not cancel it.
    forced: bool,
}

struct Shared {
    latest: AtomicU64,
    runs: AtomicU64,
}

/// Handle to the background regeneration task.
pub struct RegenScheduler {
    tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    artifact: watch::Receiver<Option<Arc<GifArtifact>>>,
    errors: watch::Receiver<Option<String>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RegenScheduler {
    /// Start the task on the current tokio runtime.
    pub fn spawn(ctx: RegenContext, debounce: &DebounceOpts, cache: &CacheOpts) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (artifact_tx, artifact) = watch::channel(None);
        let (error_tx, errors) = watch::channel(None);
        let shared = Arc::new(Shared {
            latest: AtomicU64::new(0),
            runs: AtomicU64::new(0),
        });
        let cancel = CancellationToken::new();
        let worker = Worker {
            ctx,
            cache_opts: cache.clone(),
            cache: Some(FrameCache::new(cache.capacity, cache.fingerprint)),
            debounce: Debounce::new(debounce.window(), debounce.max_wait()),
            shared: Arc::clone(&shared),
            artifact_tx,
            error_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run(rx));
        Self {
            tx,
            shared,
            artifact,
            errors,
            cancel,
            task: Some(task),
        }
    }

    /// Queue `req` behind the debounce window. Newer generations supersede older ones.
    pub fn submit(&self, req: RegenRequest) {
        self.shared.latest.fetch_max(req.generation, Ordering::SeqCst);
        if self.tx.send(Command::Submit(req)).is_err() {
            tracing::debug!("regeneration task is gone, request dropped");
        }
    }

    /// Skip the debounce window and wait for the result.
    pub async fn regenerate_now(&self, req: RegenRequest) -> ForgeResult<Arc<GifArtifact>> {
        self.shared.latest.fetch_max(req.generation, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Now(req, reply))
            .map_err(|_| ForgeError::pipeline("regeneration task is not running"))?;
        rx.await.map_err(|_| ForgeError::Cancelled)?
    }

    /// Latest published artifact.
    pub fn artifact(&self) -> Option<Arc<GifArtifact>> {
        self.artifact.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<GifArtifact>>> {
        self.artifact.clone()
    }

    /// Message of the most recent failed regeneration; cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.errors.borrow().clone()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<String>> {
        self.errors.clone()
    }

    /// Regenerations that ran to completion, published or not.
    pub fn runs(&self) -> u64 {
        self.shared.runs.load(Ordering::SeqCst)
    }

    pub fn latest_generation(&self) -> u64 {
        self.shared.latest.load(Ordering::SeqCst)
    }

    /// Stop the task, cancelling any running job.
    pub async fn shutdown(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "regeneration task ended abnormally");
        }
    }
}

impl Drop for RegenScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    ctx: RegenContext,
    cache_opts: CacheOpts,
    cache: Option<FrameCache>,
    debounce: Debounce,
    shared: Arc<Shared>,
    artifact_tx: watch::Sender<Option<Arc<GifArtifact>>>,
    error_tx: watch::Sender<Option<String>>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut pending: Option<RegenRequest> = None;
        let mut waiters: Vec<Reply> = Vec::new();
        let mut immediate = false;
        let mut job: Option<Job> = None;

        loop {
            let deadline = match (&job, &pending) {
                (None, Some(_)) if immediate => Some(Instant::now()),
                (None, Some(_)) => self.debounce.deadline(),
                _ => None,
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    None | Some(Command::Shutdown) => break,
                    Some(Command::Submit(req)) => {
                        if let Some(j) = job.as_ref().filter(|j| !j.forced) {
                            j.cancel.cancel();
                        }
                        pending = Some(req);
                        self.debounce.touch(Instant::now());
                    }
                    Some(Command::Now(req, reply)) => {
                        if let Some(j) = &job {
                            j.cancel.cancel();
                        }
                        pending = Some(req);
                        waiters.push(reply);
                        immediate = true;
                    }
                },
                joined = join(&mut job), if job.is_some() => {
                    let (job_waiters, cancelled) = job
                        .take()
                        .map(|j| (j.waiters, j.cancel.is_cancelled()))
                        .unwrap_or_default();
                    self.finish(joined, job_waiters, cancelled, pending.is_some(), &mut waiters);
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    if let Some(req) = pending.take() {
                        let forced = !immediate && self.debounce.is_capped();
                        self.debounce.reset();
                        immediate = false;
                        job = Some(self.start(req, std::mem::take(&mut waiters), forced));
                    }
                }
            }
        }

        if let Some(j) = job {
            j.cancel.cancel();
            j.handle.abort();
        }
        tracing::debug!("regeneration task stopped");
    }

    fn start(&mut self, req: RegenRequest, waiters: Vec<Reply>, forced: bool) -> Job {
        if forced {
            tracing::debug!(generation = req.generation, "max wait reached, regenerating");
        }
        let cancel = self.cancel.child_token();
        let job_cancel = cancel.clone();
        let mut cache = self
            .cache
            .take()
            .unwrap_or_else(|| FrameCache::new(self.cache_opts.capacity, self.cache_opts.fingerprint));
        let ctx = self.ctx.clone();
        let handle = tokio::spawn(async move {
            let _status = ctx.status.raise(StatusFlag::GeneratingGif);
            let result = regenerate(&ctx, &mut cache, &req, &job_cancel).await;
            (cache, req.generation, result)
        });
        Job {
            handle,
            cancel,
            waiters,
            forced,
        }
    }

    fn finish(
        &mut self,
        joined: Result<(FrameCache, u64, ForgeResult<GifArtifact>), tokio::task::JoinError>,
        job_waiters: Vec<Reply>,
        cancelled: bool,
        superseded: bool,
        pending_waiters: &mut Vec<Reply>,
    ) {
        let (cache, generation, result) = match joined {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(error = %e, "regeneration job aborted");
                self.cache = Some(FrameCache::new(
                    self.cache_opts.capacity,
                    self.cache_opts.fingerprint,
                ));
                let msg = format!("regeneration job aborted: {e}");
                self.error_tx.send_replace(Some(msg.clone()));
                for w in job_waiters {
                    let _ = w.send(Err(ForgeError::pipeline(msg.clone())));
                }
                return;
            }
        };
        self.cache = Some(cache);

        match result {
            Ok(_) if cancelled && superseded => {
                self.shared.runs.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(generation, "superseded regeneration result discarded");
                pending_waiters.extend(job_waiters);
            }
            Ok(artifact) => {
                self.shared.runs.fetch_add(1, Ordering::SeqCst);
                let artifact = Arc::new(artifact);
                let published = self
                    .artifact_tx
                    .borrow()
                    .as_ref()
                    .map_or(0, |a| a.generation);
                if generation > published {
                    self.artifact_tx.send_replace(Some(Arc::clone(&artifact)));
                    self.error_tx.send_replace(None);
                } else {
                    tracing::debug!(generation, published, "stale regeneration result discarded");
                }
                for w in job_waiters {
                    let _ = w.send(Ok(Arc::clone(&artifact)));
                }
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(generation, "regeneration cancelled");
                if superseded {
                    pending_waiters.extend(job_waiters);
                } else {
                    for w in job_waiters {
                        let _ = w.send(Err(ForgeError::Cancelled));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "regeneration failed");
                let msg = e.to_string();
                self.error_tx.send_replace(Some(msg.clone()));
                let mut first = Some(e);
                for w in job_waiters {
                    let err = first
                        .take()
                        .unwrap_or_else(|| ForgeError::pipeline(msg.clone()));
                    let _ = w.send(Err(err));
                }
            }
        }
    }
}

async fn join(
    job: &mut Option<Job>,
) -> Result<(FrameCache, u64, ForgeResult<GifArtifact>), tokio::task::JoinError> {
    match job.as_mut() {
        Some(j) => (&mut j.handle).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/regen.rs"]
mod tests;
