//! External transcoder access.
//!
//! A [`Transcoder`] is a small virtual filesystem plus an `exec` entry point. Jobs go through a
//! [`TranscoderHandle`], which runs one [`TranscodeBatch`] at a time so the write, exec, read
//! and delete steps of two jobs never interleave.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::foundation::error::ForgeResult;

pub(crate) mod args;
pub(crate) mod ffmpeg;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Make the transcoder ready. Calling it again is a no-op.
    async fn load(&self) -> ForgeResult<()>;

    async fn write_file(&self, name: &str, bytes: &[u8]) -> ForgeResult<()>;

    async fn exec(&self, argv: &[String]) -> ForgeResult<()>;

    async fn read_file(&self, name: &str) -> ForgeResult<Vec<u8>>;

    async fn delete_file(&self, name: &str) -> ForgeResult<()>;
}

/// Input files, the argument list, and the file to read back afterwards.
#[derive(Clone, Debug)]
pub struct TranscodeBatch {
    pub inputs: Vec<(String, Arc<[u8]>)>,
    pub argv: Vec<String>,
    pub output: String,
}

#[derive(Clone)]
pub struct TranscoderHandle {
    inner: Arc<dyn Transcoder>,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl TranscoderHandle {
    pub fn new(inner: Arc<dyn Transcoder>) -> Self {
        Self {
            inner,
            lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.inner
    }

    /// Run `batch` and return the output file's bytes.
    ///
    /// Every file the batch wrote is deleted afterwards, also when a step fails.
    #[tracing::instrument(skip_all, fields(inputs = batch.inputs.len(), output = %batch.output))]
    pub async fn run(&self, batch: TranscodeBatch) -> ForgeResult<Vec<u8>> {
        let _guard = self.lock.lock().await;
        let started = Instant::now();
        self.inner.load().await?;

        let result = self.run_locked(&batch).await;

        for (name, _) in &batch.inputs {
            if let Err(e) = self.inner.delete_file(name).await {
                tracing::debug!(file = %name, error = %e, "transcoder cleanup failed");
            }
        }
        if let Err(e) = self.inner.delete_file(&batch.output).await {
            tracing::debug!(file = %batch.output, error = %e, "transcoder cleanup failed");
        }

        if let Ok(bytes) = &result {
            tracing::debug!(
                bytes = bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "transcode finished"
            );
        }
        result
    }

    async fn run_locked(&self, batch: &TranscodeBatch) -> ForgeResult<Vec<u8>> {
        for (name, bytes) in &batch.inputs {
            self.inner.write_file(name, bytes).await?;
        }
        self.inner.exec(&batch.argv).await?;
        self.inner.read_file(&batch.output).await
    }
}

pub use ffmpeg::FfmpegTranscoder;
