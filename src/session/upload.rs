use crate::config::UploadPolicy;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::model::blob::VideoBlob;

/// What loading a validated blob requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadPlan {
    /// The container is used as-is.
    Native,
    /// The container must be converted to MP4 first.
    Convert,
}

/// Type and size checks, done before any decoding.
pub fn check_upload(blob: &VideoBlob, policy: &UploadPolicy) -> ForgeResult<UploadPlan> {
    if blob.is_empty() {
        return Err(ForgeError::validation("video is empty"));
    }
    let essence = blob.essence();
    let listed = |list: &[String]| list.iter().any(|m| m.eq_ignore_ascii_case(&essence));
    if !listed(&policy.allowed_mime) {
        return Err(ForgeError::validation(format!(
            "unsupported video type '{}'",
            blob.mime
        )));
    }
    if blob.len() as u64 > policy.max_bytes {
        return Err(ForgeError::validation(format!(
            "video is {} bytes, the limit is {}",
            blob.len(),
            policy.max_bytes
        )));
    }
    if listed(&policy.native_mime) {
        Ok(UploadPlan::Native)
    } else {
        Ok(UploadPlan::Convert)
    }
}

/// Duration check, done once the video has been probed.
pub fn check_duration(duration: f64, policy: &UploadPolicy) -> ForgeResult<()> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ForgeError::validation("video duration is unknown"));
    }
    if duration > policy.max_duration_secs {
        return Err(ForgeError::validation(format!(
            "video is {duration:.1}s long, the limit is {:.0}s",
            policy.max_duration_secs
        )));
    }
    Ok(())
}
