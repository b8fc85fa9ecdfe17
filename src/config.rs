//! Typed configuration for every pipeline stage.
//!
//! All fields have defaults, so a config file only needs the keys it changes. Values are loaded
//! from JSON with [`ForgeConfig::from_json_file`] and then overridden by `GIFFORGE_*` environment
//! variables with [`ForgeConfig::apply_env`].

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::core::Rgba8;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::model::frame::Tool;
use crate::session::cache::FingerprintMode;

/// Frame extraction settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtractOpts {
    /// Frames sampled per second of source video.
    pub fps: f64,
    /// Seeks in flight at once.
    pub batch_size: usize,
    /// Output raster width; height follows the source aspect when only this is set.
    pub target_width: Option<u32>,
    /// Output raster height; width follows the source aspect when only this is set.
    pub target_height: Option<u32>,
    /// Background encode workers.
    pub encode_threads: usize,
}

impl Default for ExtractOpts {
    fn default() -> Self {
        Self {
            fps: 10.0,
            batch_size: 4,
            target_width: None,
            target_height: None,
            encode_threads: 1,
        }
    }
}

/// Output GIF settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GifOpts {
    /// Target width in pixels; height is scaled to keep the aspect ratio.
    pub width: u32,
    /// Output frame rate.
    pub fps: u32,
    /// Generate a per-GIF palette instead of the default 256-color one.
    pub palette: bool,
}

impl Default for GifOpts {
    fn default() -> Self {
        Self {
            width: 480,
            fps: 10,
            palette: true,
        }
    }
}

/// Regeneration debounce settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DebounceOpts {
    /// Quiet period after the last edit before regenerating.
    pub window_ms: u64,
    /// Upper bound between the first edit of a burst and regeneration.
    pub max_wait_ms: u64,
}

impl DebounceOpts {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms.max(self.window_ms))
    }
}

impl Default for DebounceOpts {
    fn default() -> Self {
        Self {
            window_ms: 300,
            max_wait_ms: 2000,
        }
    }
}

/// Per-frame regeneration cache settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheOpts {
    /// Maximum retained entries; the lowest frame ids are evicted first.
    pub capacity: usize,
    /// How frame content is fingerprinted.
    pub fingerprint: FingerprintMode,
}

impl Default for CacheOpts {
    fn default() -> Self {
        Self {
            capacity: 50,
            fingerprint: FingerprintMode::Content,
        }
    }
}

/// Annotation display and brush defaults.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnnotationOpts {
    /// Opacity of the previous frame's drawings while editing.
    pub ghost_opacity: f32,
    pub default_tool: Tool,
    pub default_color: Rgba8,
    pub default_pen_size: f64,
}

impl Default for AnnotationOpts {
    fn default() -> Self {
        Self {
            ghost_opacity: 0.3,
            default_tool: Tool::Pen,
            default_color: Rgba8::rgb(255, 0, 0),
            default_pen_size: 4.0,
        }
    }
}

/// Limits applied to uploaded or recorded videos before any processing.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub max_duration_secs: f64,
    /// MIME types accepted at all (parameters such as `codecs=` are ignored).
    pub allowed_mime: Vec<String>,
    /// MIME types used as-is; other allowed types are converted first.
    pub native_mime: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 200 * 1024 * 1024,
            max_duration_secs: 60.0,
            allowed_mime: vec![
                "video/webm".to_string(),
                "video/mp4".to_string(),
                "video/quicktime".to_string(),
            ],
            native_mime: vec!["video/webm".to_string(), "video/mp4".to_string()],
        }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StoreOpts {
    /// Frames read per page when hydrating a session from the store.
    pub hydrate_batch: usize,
}

impl Default for StoreOpts {
    fn default() -> Self {
        Self { hydrate_batch: 24 }
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub extract: ExtractOpts,
    pub gif: GifOpts,
    pub debounce: DebounceOpts,
    pub cache: CacheOpts,
    pub annotation: AnnotationOpts,
    pub upload: UploadPolicy,
    pub store: StoreOpts,
}

impl ForgeConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> ForgeResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON config file, then apply environment overrides.
    pub fn from_json_file(path: &Path) -> ForgeResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let mut cfg: ForgeConfig = serde_json::from_slice(&bytes)
            .map_err(|e| ForgeError::serde(format!("config '{}': {e}", path.display())))?;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Override fields from `GIFFORGE_*` variables. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse::<f64>("GIFFORGE_EXTRACT_FPS") {
            self.extract.fps = v;
        }
        if let Some(v) = env_parse::<usize>("GIFFORGE_ENCODE_THREADS") {
            self.extract.encode_threads = v;
        }
        if let Some(v) = env_parse::<u32>("GIFFORGE_GIF_WIDTH") {
            self.gif.width = v;
        }
        if let Some(v) = env_parse::<u32>("GIFFORGE_GIF_FPS") {
            self.gif.fps = v;
        }
        if let Some(v) = env_parse::<u64>("GIFFORGE_DEBOUNCE_MS") {
            self.debounce.window_ms = v;
        }
        if let Some(v) = env_parse::<usize>("GIFFORGE_CACHE_CAPACITY") {
            self.cache.capacity = v;
        }
    }

    pub fn validate(&self) -> ForgeResult<()> {
        if !self.extract.fps.is_finite() || self.extract.fps <= 0.0 {
            return Err(ForgeError::validation("extract.fps must be finite and > 0"));
        }
        if self.extract.batch_size == 0 {
            return Err(ForgeError::validation("extract.batch_size must be >= 1"));
        }
        if self.extract.encode_threads == 0 {
            return Err(ForgeError::validation("extract.encode_threads must be >= 1"));
        }
        if matches!(self.extract.target_width, Some(0))
            || matches!(self.extract.target_height, Some(0))
        {
            return Err(ForgeError::validation(
                "extract target dimensions must be non-zero when set",
            ));
        }
        if self.gif.width == 0 || self.gif.fps == 0 {
            return Err(ForgeError::validation("gif.width and gif.fps must be non-zero"));
        }
        if self.cache.capacity == 0 {
            return Err(ForgeError::validation("cache.capacity must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.annotation.ghost_opacity) {
            return Err(ForgeError::validation(
                "annotation.ghost_opacity must be within [0, 1]",
            ));
        }
        if self.store.hydrate_batch == 0 {
            return Err(ForgeError::validation("store.hydrate_batch must be >= 1"));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
