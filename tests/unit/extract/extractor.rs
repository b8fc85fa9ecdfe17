use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::RgbaImage;

use super::*;
use crate::render::raster::decode_still;

struct ColorRamp {
    size: FrameSize,
    duration: f64,
    seeks: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
    /// Seeks to this time fail this many times before succeeding.
    flaky_at: Option<(f64, AtomicUsize)>,
}

impl ColorRamp {
    fn new(width: u32, height: u32, duration: f64) -> Self {
        Self {
            size: FrameSize::new(width, height),
            duration,
            seeks: AtomicUsize::new(0),
            cancel_after: None,
            flaky_at: None,
        }
    }
}

#[async_trait]
impl VideoSource for ColorRamp {
    fn dimensions(&self) -> FrameSize {
        self.size
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    async fn frame_at(&self, t: f64) -> ForgeResult<RgbaImage> {
        let n = self.seeks.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after
            && n >= *after
        {
            token.cancel();
        }
        tokio::task::yield_now().await;
        if let Some((at, left)) = &self.flaky_at
            && (t - at).abs() < 1e-9
            && left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(ForgeError::extraction(format!("seek to {t} failed")));
        }
        let level = ((t / self.duration) * 255.0).round() as u8;
        Ok(RgbaImage::from_pixel(
            self.size.width,
            self.size.height,
            image::Rgba([level, 0, 0, 255]),
        ))
    }
}

fn opts() -> ExtractOpts {
    ExtractOpts::default()
}

#[test]
fn frame_count_floors_and_clamps() {
    assert_eq!(frame_count(2.0, 4.0, 30.0), 60);
    assert_eq!(frame_count(0.0, 1.0, 10.0), 10);
    assert_eq!(frame_count(0.0, 0.05, 10.0), 1);
    assert_eq!(frame_count(0.0, 0.1, 10.0), 1);
    assert_eq!(frame_count(0.0, 0.35, 10.0), 3);
}

#[test]
fn timestamps_span_the_window() {
    let ts = timestamps(2.0, 4.0, 30.0);
    assert_eq!(ts.len(), 60);
    assert_eq!(ts[0], 2.0);
    assert_eq!(ts[59], 4.0);
    assert!(ts.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(timestamps(1.5, 1.55, 10.0), vec![1.5]);
}

#[tokio::test]
async fn extracts_sixty_ordered_frames() {
    let source = ColorRamp::new(8, 6, 5.0);
    let extractor = FrameExtractor::new(opts());
    let mut progress = Vec::new();
    let frames = extractor
        .extract(
            &source,
            30.0,
            2.0,
            4.0,
            |done, total| progress.push((done, total)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(frames.len(), 60);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(f.id as usize, i);
        assert_eq!((f.width, f.height), (8, 6));
        assert!(f.drawings.is_empty());
    }
    assert_eq!(frames[0].timestamp, 2.0);
    assert_eq!(frames[59].timestamp, 4.0);
    assert!(frames.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    assert_eq!(progress.len(), 60);
    assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(progress.last(), Some(&(60, 60)));
    assert_eq!(source.seeks.load(Ordering::SeqCst), 60);
}

#[tokio::test]
async fn frames_decode_to_the_sampled_content() {
    let source = ColorRamp::new(4, 4, 1.0);
    let extractor = FrameExtractor::new(opts());
    let frames = extractor
        .extract(&source, 2.0, 0.0, 1.0, |_, _| {}, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(frames.len(), 2);
    let first = decode_still(&frames[0].image_data).unwrap();
    let last = decode_still(&frames[1].image_data).unwrap();
    assert_eq!(first.pixel(0, 0), Some([0, 0, 0, 255]));
    assert_eq!(last.pixel(0, 0), Some([255, 0, 0, 255]));
}

#[tokio::test]
async fn target_width_keeps_aspect() {
    let source = ColorRamp::new(64, 48, 1.0);
    let extractor = FrameExtractor::new(ExtractOpts {
        target_width: Some(32),
        ..opts()
    });
    let frames = extractor
        .extract(&source, 1.0, 0.0, 1.0, |_, _| {}, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!((frames[0].width, frames[0].height), (32, 24));
    let raster = decode_still(&frames[0].image_data).unwrap();
    assert_eq!((raster.width, raster.height), (32, 24));
}

#[tokio::test]
async fn zero_dimension_source_fails_before_seeking() {
    let source = ColorRamp::new(0, 10, 1.0);
    let extractor = FrameExtractor::new(opts());
    let err = extractor
        .extract(&source, 10.0, 0.0, 1.0, |_, _| {}, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Extraction(_)));
    assert_eq!(source.seeks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_window_is_rejected() {
    let source = ColorRamp::new(4, 4, 1.0);
    let extractor = FrameExtractor::new(opts());
    let token = CancellationToken::new();
    for (start, end, fps) in [(1.0, 1.0, 10.0), (-1.0, 1.0, 10.0), (0.0, 1.0, 0.0)] {
        let err = extractor
            .extract(&source, fps, start, end, |_, _| {}, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Validation(_)), "{start} {end} {fps}");
    }
}

#[tokio::test]
async fn cancellation_stops_further_batches() {
    let token = CancellationToken::new();
    let mut source = ColorRamp::new(4, 4, 10.0);
    source.cancel_after = Some((2, token.clone()));
    let extractor = FrameExtractor::new(opts());
    let calls = Mutex::new(0usize);

    let err = extractor
        .extract(
            &source,
            10.0,
            0.0,
            10.0,
            |_, _| *calls.lock().unwrap() += 1,
            &token,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    // Only the first batch was ever started.
    assert!(source.seeks.load(Ordering::SeqCst) <= opts().batch_size);
    assert!(*calls.lock().unwrap() < 100);
}

#[tokio::test]
async fn failing_worker_encoder_still_yields_every_frame() {
    struct AlwaysFails;
    impl StillEncoder for AlwaysFails {
        fn encode(&self, _img: &RgbaImage) -> ForgeResult<Vec<u8>> {
            Err(ForgeError::extraction("worker down"))
        }
    }

    let source = ColorRamp::new(4, 4, 1.0);
    let extractor = FrameExtractor::with_encoder(opts(), Arc::new(AlwaysFails));
    let frames = extractor
        .extract(&source, 5.0, 0.0, 1.0, |_, _| {}, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|f| decode_still(&f.image_data).is_ok()));
}

#[tokio::test]
async fn a_frame_that_fails_once_is_retried_alone() {
    let mut source = ColorRamp::new(4, 4, 1.0);
    source.flaky_at = Some((0.5, AtomicUsize::new(1)));
    let extractor = FrameExtractor::new(opts());
    let mut progress = Vec::new();
    let frames = extractor
        .extract(
            &source,
            3.0,
            0.0,
            1.0,
            |done, total| progress.push((done, total)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1].timestamp, 0.5);
    assert!(frames.iter().enumerate().all(|(i, f)| f.id as usize == i));
    assert_eq!(source.seeks.load(Ordering::SeqCst), 4);
    assert_eq!(progress.last(), Some(&(3, 3)));
}

#[tokio::test]
async fn a_frame_that_keeps_failing_fails_the_extraction() {
    let mut source = ColorRamp::new(4, 4, 1.0);
    source.flaky_at = Some((0.5, AtomicUsize::new(2)));
    let extractor = FrameExtractor::new(opts());
    let err = extractor
        .extract(&source, 3.0, 0.0, 1.0, |_, _| {}, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Extraction(_)));
}
