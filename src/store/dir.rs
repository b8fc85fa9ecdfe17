use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::{ForgeError, ForgeResult};
use crate::model::blob::{BlobId, VideoBlob};
use crate::model::frame::{Drawing, DrawingFrame};
use crate::store::FrameStore;

#[derive(serde::Serialize, serde::Deserialize)]
struct BlobMeta {
    mime: String,
    len: usize,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct FrameIndex {
    count: usize,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct FrameRecord {
    id: u32,
    width: u32,
    height: u32,
    timestamp: f64,
    drawings: Vec<Drawing>,
}

/// Store rooted at one directory.
///
/// ```text
/// <root>/blobs/<id>.bin      encoded video
/// <root>/blobs/<id>.json     {"mime", "len"}
/// <root>/frames/index.json   {"count"}
/// <root>/frames/<n>.png      still image
/// <root>/frames/<n>.json     id, size, timestamp, drawings
/// ```
pub struct DirStore {
    root: PathBuf,
    // Serializes writers so a frame table replace never interleaves with a single-frame save.
    write_lock: tokio::sync::Mutex<()>,
}

impl DirStore {
    pub async fn open(root: impl Into<PathBuf>) -> ForgeResult<Self> {
        let root = root.into();
        for dir in [root.join("blobs"), root.join("frames")] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| io_error("create", &dir, e))?;
        }
        Ok(Self {
            root,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: BlobId, ext: &str) -> PathBuf {
        self.root.join("blobs").join(format!("{id}.{ext}"))
    }

    fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    fn frame_path(&self, id: u32, ext: &str) -> PathBuf {
        self.frames_dir().join(format!("{id}.{ext}"))
    }

    async fn write_frame(&self, frame: &DrawingFrame) -> ForgeResult<()> {
        let png = self.frame_path(frame.id, "png");
        tokio::fs::write(&png, &frame.image_data[..])
            .await
            .map_err(|e| io_error("write", &png, e))?;
        let record = FrameRecord {
            id: frame.id,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            drawings: frame.drawings.clone(),
        };
        write_json(&self.frame_path(frame.id, "json"), &record).await
    }

    async fn read_frame(&self, id: u32) -> ForgeResult<DrawingFrame> {
        let record: FrameRecord = read_json(&self.frame_path(id, "json")).await?;
        let png = self.frame_path(id, "png");
        let image = tokio::fs::read(&png)
            .await
            .map_err(|e| io_error("read", &png, e))?;
        Ok(DrawingFrame {
            id: record.id,
            image_data: Arc::from(image),
            drawings: record.drawings,
            width: record.width,
            height: record.height,
            timestamp: record.timestamp,
        })
    }

    async fn read_index(&self) -> ForgeResult<FrameIndex> {
        let path = self.frames_dir().join("index.json");
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(FrameIndex { count: 0 });
        }
        read_json(&path).await
    }
}

#[async_trait]
impl FrameStore for DirStore {
    async fn save_blob(&self, id: BlobId, blob: &VideoBlob) -> ForgeResult<()> {
        let _guard = self.write_lock.lock().await;
        let bin = self.blob_path(id, "bin");
        tokio::fs::write(&bin, &blob.bytes[..])
            .await
            .map_err(|e| io_error("write", &bin, e))?;
        let meta = BlobMeta {
            mime: blob.mime.clone(),
            len: blob.len(),
        };
        write_json(&self.blob_path(id, "json"), &meta).await
    }

    async fn get_blob(&self, id: BlobId) -> ForgeResult<Option<VideoBlob>> {
        let meta_path = self.blob_path(id, "json");
        if !tokio::fs::try_exists(&meta_path).await.unwrap_or(false) {
            return Ok(None);
        }
        let meta: BlobMeta = read_json(&meta_path).await?;
        let bin = self.blob_path(id, "bin");
        let bytes = tokio::fs::read(&bin)
            .await
            .map_err(|e| io_error("read", &bin, e))?;
        if bytes.len() != meta.len {
            return Err(ForgeError::store(format!(
                "blob '{id}' is truncated: {} of {} bytes",
                bytes.len(),
                meta.len
            )));
        }
        Ok(Some(VideoBlob::new(bytes, meta.mime)))
    }

    async fn save_frames(&self, frames: &[Arc<DrawingFrame>]) -> ForgeResult<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.frames_dir();
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| io_error("remove", &dir, e))?;
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error("create", &dir, e))?;
        for frame in frames {
            self.write_frame(frame).await?;
        }
        write_json(
            &dir.join("index.json"),
            &FrameIndex {
                count: frames.len(),
            },
        )
        .await?;
        tracing::debug!(frames = frames.len(), root = %self.root.display(), "frames saved");
        Ok(())
    }

    async fn save_frame(&self, frame: &DrawingFrame) -> ForgeResult<()> {
        let _guard = self.write_lock.lock().await;
        let index = self.read_index().await?;
        if frame.id as usize >= index.count {
            return Err(ForgeError::store(format!("frame {} is not stored", frame.id)));
        }
        self.write_frame(frame).await
    }

    async fn frame_count(&self) -> ForgeResult<usize> {
        Ok(self.read_index().await?.count)
    }

    async fn frames_batch(&self, start: usize, count: usize) -> ForgeResult<Vec<DrawingFrame>> {
        let total = self.read_index().await?.count;
        let end = start.saturating_add(count).min(total);
        let mut out = Vec::with_capacity(end.saturating_sub(start));
        for id in start..end {
            let id = u32::try_from(id).map_err(|_| ForgeError::store("frame id exceeds u32"))?;
            out.push(self.read_frame(id).await?);
        }
        Ok(out)
    }

    async fn delete_all(&self) -> ForgeResult<()> {
        let _guard = self.write_lock.lock().await;
        for dir in [self.root.join("blobs"), self.frames_dir()] {
            if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                tokio::fs::remove_dir_all(&dir)
                    .await
                    .map_err(|e| io_error("remove", &dir, e))?;
            }
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| io_error("create", &dir, e))?;
        }
        Ok(())
    }
}

fn io_error(op: &str, path: &Path, e: std::io::Error) -> ForgeError {
    ForgeError::store(format!("{op} '{}': {e}", path.display()))
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> ForgeResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| io_error("write", path, e))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ForgeResult<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| io_error("read", path, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ForgeError::store(format!("parse '{}': {e}", path.display())))
}
