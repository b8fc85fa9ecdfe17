//! gifforge is the frame pipeline and editing-state engine of a GIF creation tool.
//!
//! A session takes a short video, extracts still frames from it, lets the user trim, crop and
//! draw on those frames, and keeps an animated GIF of the result up to date:
//!
//! - Load a [`VideoBlob`] into an [`EditSession`]
//! - Edit frames with an [`AnnotationEngine`] and commit them back
//! - Observe the regenerated [`GifArtifact`] through a `watch` channel
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod annotate;
pub(crate) mod config;
pub(crate) mod extract;
pub(crate) mod geometry;
pub(crate) mod model;
pub(crate) mod render;
pub(crate) mod session;
pub(crate) mod store;
pub(crate) mod transcode;

pub use crate::foundation::core::{BezPath, FrameSize, Point, Rect, Rgba8, Vec2};
pub use crate::foundation::error::{ForgeError, ForgeResult};

pub use crate::config::{
    AnnotationOpts, CacheOpts, DebounceOpts, ExtractOpts, ForgeConfig, GifOpts, StoreOpts,
    UploadPolicy,
};
pub use crate::model::blob::{BlobId, VideoBlob};
pub use crate::model::filters::{
    CropFilter, CropRect, MIN_CROP_PERCENT, TrimFilter, VideoFilters,
};
pub use crate::model::frame::{Drawing, DrawingFrame, FrameSequence, Tool};

pub use crate::geometry::crop::{
    Corner, CropPixels, crop_percent_to_pixels, drag_crop, percent_aspect, resize_crop,
    validate_crop,
};
pub use crate::geometry::shapes::{drawing_path, segment_path, shape_path};
pub use crate::render::composite::{
    CompositeOpts, StrokeOp, composite_frame, over, rasterize_drawings,
};
pub use crate::render::raster::{Raster, decode_still, encode_png, encode_rgba_png};

pub use crate::extract::encode::{EncodePool, PngStillEncoder, StillEncoder};
pub use crate::extract::extractor::{FrameExtractor, frame_count, timestamps};
pub use crate::extract::source::{FfmpegOpener, FfmpegVideoSource, SourceOpener, VideoSource};

pub use crate::store::{DirStore, FrameStore, MemoryStore};

pub use crate::annotate::engine::{AnnotationEngine, Brush, EngineState};
pub use crate::annotate::{frame_point_from_display, frame_point_from_percent};

pub use crate::transcode::args::{
    FRAME_PATTERN, GifArgs, codec_for_mime, convert_args, crop_args, frame_file_name,
};
pub use crate::transcode::{FfmpegTranscoder, TranscodeBatch, Transcoder, TranscoderHandle};

pub use crate::session::cache::{FingerprintMode, FrameCache, FrameFingerprint, fingerprint_frame};
pub use crate::session::coordinator::{EditSession, Progress, SessionDeps};
pub use crate::session::regen::{
    GifArtifact, RegenContext, RegenRequest, RegenScheduler, RegenStats, regenerate,
    relative_trim,
};
pub use crate::session::status::{ProcessStatus, StatusBoard, StatusFlag, StatusGuard};
pub use crate::session::upload::{UploadPlan, check_duration, check_upload};
