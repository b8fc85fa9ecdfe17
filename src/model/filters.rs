use crate::foundation::error::{ForgeError, ForgeResult};

/// Smallest crop box side, in percent of the frame.
pub const MIN_CROP_PERCENT: f64 = 10.0;

const TIME_EPS: f64 = 1e-6;
const PERCENT_EPS: f64 = 1e-9;

/// Trim window in seconds of source time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrimFilter {
    pub start: f64,
    pub end: f64,
    /// `true` iff the window is a strict subset of `[0, duration]`.
    pub is_active: bool,
}

impl TrimFilter {
    /// The untrimmed window `[0, duration]`.
    pub fn full(duration: f64) -> Self {
        Self {
            start: 0.0,
            end: duration.max(0.0),
            is_active: false,
        }
    }

    /// Validate `0 <= start < end <= duration` and derive `is_active`.
    pub fn new(start: f64, end: f64, duration: f64) -> ForgeResult<Self> {
        if !start.is_finite() || !end.is_finite() || !duration.is_finite() {
            return Err(ForgeError::validation("trim bounds must be finite"));
        }
        if start < 0.0 {
            return Err(ForgeError::validation("trim start must be >= 0"));
        }
        if start >= end {
            return Err(ForgeError::validation("trim start must be before trim end"));
        }
        if end > duration + TIME_EPS {
            return Err(ForgeError::validation(format!(
                "trim end {end:.3}s exceeds video duration {duration:.3}s"
            )));
        }
        let end = end.min(duration);
        Ok(Self {
            start,
            end,
            is_active: start > TIME_EPS || end < duration - TIME_EPS,
        })
    }

    pub fn len_secs(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Crop rectangle in percent of the frame dimensions.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub const FULL: CropRect = CropRect {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 100.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check `0 <= x`, `0 <= y`, `x + width <= 100`, `y + height <= 100` and the minimum size.
    pub fn validate(&self) -> ForgeResult<()> {
        let vals = [self.x, self.y, self.width, self.height];
        if vals.iter().any(|v| !v.is_finite()) {
            return Err(ForgeError::validation("crop coordinates must be finite"));
        }
        if self.x < -PERCENT_EPS || self.y < -PERCENT_EPS {
            return Err(ForgeError::validation("crop origin must be >= 0"));
        }
        if self.width < MIN_CROP_PERCENT - PERCENT_EPS
            || self.height < MIN_CROP_PERCENT - PERCENT_EPS
        {
            return Err(ForgeError::validation(format!(
                "crop width and height must be >= {MIN_CROP_PERCENT}%"
            )));
        }
        if self.right() > 100.0 + PERCENT_EPS || self.bottom() > 100.0 + PERCENT_EPS {
            return Err(ForgeError::validation("crop box must stay within the frame"));
        }
        Ok(())
    }
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CropFilter {
    pub coordinates: CropRect,
    /// A crop has been applied to the current video.
    pub is_active: bool,
    /// The crop box is being edited.
    pub is_crop_mode: bool,
}

/// All editing parameters that feed regeneration.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoFilters {
    pub trim: TrimFilter,
    pub crop: CropFilter,
}

impl VideoFilters {
    pub fn for_duration(duration: f64) -> Self {
        Self {
            trim: TrimFilter::full(duration),
            crop: CropFilter::default(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/filters.rs"]
mod tests;
