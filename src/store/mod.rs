//! Persistence of video blobs and extracted frames.

use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::ForgeResult;
use crate::model::blob::{BlobId, VideoBlob};
use crate::model::frame::DrawingFrame;

pub(crate) mod dir;
pub(crate) mod memory;

/// Key-value storage for blobs plus an ordered frame table.
///
/// Saving a blob replaces the previous value under the same id. `save_frames` replaces the
/// whole frame table; `frames_batch` pages through it in id order.
#[async_trait]
pub trait FrameStore: Send + Sync {
    async fn save_blob(&self, id: BlobId, blob: &VideoBlob) -> ForgeResult<()>;

    async fn get_blob(&self, id: BlobId) -> ForgeResult<Option<VideoBlob>>;

    async fn save_frames(&self, frames: &[Arc<DrawingFrame>]) -> ForgeResult<()>;

    /// Replace one stored frame (matched by id).
    async fn save_frame(&self, frame: &DrawingFrame) -> ForgeResult<()>;

    async fn frame_count(&self) -> ForgeResult<usize>;

    /// Up to `count` frames starting at position `start`, in id order.
    async fn frames_batch(&self, start: usize, count: usize) -> ForgeResult<Vec<DrawingFrame>>;

    async fn first_frame(&self) -> ForgeResult<Option<DrawingFrame>> {
        Ok(self.frames_batch(0, 1).await?.into_iter().next())
    }

    /// Remove every blob and frame.
    async fn delete_all(&self) -> ForgeResult<()>;
}

pub use dir::DirStore;
pub use memory::MemoryStore;
