/// Convenience result type used across gifforge.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum ForgeError {
    /// Invalid user-provided input, detected before any processing starts.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required tool, codec or device is unavailable.
    #[error("capability error: {0}")]
    Capability(String),

    /// Errors while seeking, decoding or encoding source frames.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Errors from the transcoder or the regeneration pipeline.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Errors reading or writing persisted session data.
    #[error("store error: {0}")]
    Store(String),

    /// The operation was abandoned through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForgeError {
    /// Build a [`ForgeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ForgeError::Capability`] value.
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    /// Build a [`ForgeError::Extraction`] value.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Build a [`ForgeError::Pipeline`] value.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Build a [`ForgeError::Store`] value.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Build a [`ForgeError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for [`ForgeError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short message suitable for showing to an end user.
    ///
    /// Internal detail (tool stderr, paths) is kept out; callers that want it log the
    /// `Display` form instead.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Capability(msg) => format!("This feature is unavailable: {msg}"),
            Self::Extraction(_) => "Could not read frames from this video.".to_string(),
            Self::Pipeline(_) => "Processing the video failed. Please try again.".to_string(),
            Self::Store(_) => "Could not save or load session data.".to_string(),
            Self::Cancelled => "The operation was cancelled.".to_string(),
            Self::Serde(_) | Self::Other(_) => "Something went wrong.".to_string(),
        }
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
