use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use crate::foundation::error::{ForgeError, ForgeResult};
use crate::render::raster::encode_rgba_png;

/// Encodes a decoded frame into the bytes stored as `DrawingFrame::image_data`.
pub trait StillEncoder: Send + Sync {
    fn encode(&self, img: &RgbaImage) -> ForgeResult<Vec<u8>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PngStillEncoder;

impl StillEncoder for PngStillEncoder {
    fn encode(&self, img: &RgbaImage) -> ForgeResult<Vec<u8>> {
        encode_rgba_png(img)
    }
}

/// Background encode workers.
///
/// The rayon pool is built on first use and torn down by [`EncodePool::dispose`] (or drop).
/// A frame whose worker fails or panics is re-encoded with [`PngStillEncoder`] on a blocking
/// thread, so one bad worker never fails an extraction.
pub struct EncodePool {
    threads: usize,
    encoder: Arc<dyn StillEncoder>,
    pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
}

impl EncodePool {
    pub fn new(threads: usize) -> Self {
        Self::with_encoder(threads, Arc::new(PngStillEncoder))
    }

    pub fn with_encoder(threads: usize, encoder: Arc<dyn StillEncoder>) -> Self {
        Self {
            threads: threads.max(1),
            encoder,
            pool: Mutex::new(None),
        }
    }

    /// `true` while worker threads exist.
    pub fn is_active(&self) -> bool {
        self.pool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn dispose(&self) {
        let pool = self.pool.lock().unwrap_or_else(|e| e.into_inner()).take();
        if pool.is_some() {
            tracing::debug!("encode pool disposed");
        }
    }

    fn get_or_build(&self) -> Option<Arc<rayon::ThreadPool>> {
        let mut guard = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pool) = guard.as_ref() {
            return Some(Arc::clone(pool));
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("gifforge-encode-{i}"))
            .build()
        {
            Ok(pool) => {
                let pool = Arc::new(pool);
                *guard = Some(Arc::clone(&pool));
                Some(pool)
            }
            Err(e) => {
                tracing::warn!(error = %e, "encode pool unavailable, encoding inline");
                None
            }
        }
    }

    pub async fn encode(&self, img: Arc<RgbaImage>) -> ForgeResult<Vec<u8>> {
        let Some(pool) = self.get_or_build() else {
            return encode_inline(img).await;
        };

        let (tx, rx) = tokio::sync::oneshot::channel();
        let encoder = Arc::clone(&self.encoder);
        let job_img = Arc::clone(&img);
        pool.spawn(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| encoder.encode(&job_img)))
                .unwrap_or_else(|_| Err(ForgeError::extraction("encode worker panicked")));
            let _ = tx.send(result);
        });

        match rx.await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "worker encode failed, encoding inline");
                encode_inline(img).await
            }
            Err(_) => {
                tracing::warn!("encode worker dropped its job, encoding inline");
                encode_inline(img).await
            }
        }
    }
}

/// PNG encode on tokio's blocking threads, off the async workers.
async fn encode_inline(img: Arc<RgbaImage>) -> ForgeResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || PngStillEncoder.encode(&img))
        .await
        .map_err(|e| ForgeError::extraction(format!("inline encode failed: {e}")))?
}

impl Drop for EncodePool {
    fn drop(&mut self) {
        self.dispose();
    }
}
