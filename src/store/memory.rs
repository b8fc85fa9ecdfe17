use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::foundation::error::{ForgeError, ForgeResult};
use crate::model::blob::{BlobId, VideoBlob};
use crate::model::frame::DrawingFrame;
use crate::store::FrameStore;

/// In-process store; blobs are kept by reference, so a stored blob shares its buffer.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<BlobId, VideoBlob>>,
    frames: RwLock<Vec<Arc<DrawingFrame>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FrameStore for MemoryStore {
    async fn save_blob(&self, id: BlobId, blob: &VideoBlob) -> ForgeResult<()> {
        self.blobs.write().await.insert(id, blob.clone());
        Ok(())
    }

    async fn get_blob(&self, id: BlobId) -> ForgeResult<Option<VideoBlob>> {
        Ok(self.blobs.read().await.get(&id).cloned())
    }

    async fn save_frames(&self, frames: &[Arc<DrawingFrame>]) -> ForgeResult<()> {
        *self.frames.write().await = frames.to_vec();
        Ok(())
    }

    async fn save_frame(&self, frame: &DrawingFrame) -> ForgeResult<()> {
        let mut frames = self.frames.write().await;
        let slot = frames
            .get_mut(frame.id as usize)
            .ok_or_else(|| ForgeError::store(format!("frame {} is not stored", frame.id)))?;
        *slot = Arc::new(frame.clone());
        Ok(())
    }

    async fn frame_count(&self) -> ForgeResult<usize> {
        Ok(self.frames.read().await.len())
    }

    async fn frames_batch(&self, start: usize, count: usize) -> ForgeResult<Vec<DrawingFrame>> {
        let frames = self.frames.read().await;
        Ok(frames
            .iter()
            .skip(start)
            .take(count)
            .map(|f| DrawingFrame::clone(f))
            .collect())
    }

    async fn delete_all(&self) -> ForgeResult<()> {
        self.blobs.write().await.clear();
        self.frames.write().await.clear();
        Ok(())
    }
}
