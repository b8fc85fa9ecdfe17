use std::fmt;
use std::sync::Arc;

/// Logical storage slot for a video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobId {
    /// The video as uploaded or recorded (after container conversion).
    BaseVideo,
    /// The video frames are extracted from; equals the base until a crop is applied.
    CurrentVideo,
}

impl BlobId {
    pub fn as_str(self) -> &'static str {
        match self {
            BlobId::BaseVideo => "base_video",
            BlobId::CurrentVideo => "current_video",
        }
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded video bytes plus their MIME type.
///
/// Cloning shares the buffer. Two blobs are the "same video" when they share the buffer, see
/// [`VideoBlob::same_buffer`].
#[derive(Clone)]
pub struct VideoBlob {
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

impl VideoBlob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn same_buffer(&self, other: &VideoBlob) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// MIME type without parameters, lowercased (`video/webm;codecs=vp9` -> `video/webm`).
    pub fn essence(&self) -> String {
        mime_essence(&self.mime)
    }

    /// Container file extension ffmpeg understands for this blob.
    pub fn extension(&self) -> &'static str {
        match self.essence().as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            "image/gif" => "gif",
            _ => "mp4",
        }
    }
}

impl fmt::Debug for VideoBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoBlob")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub(crate) fn mime_essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
