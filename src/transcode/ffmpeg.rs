use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::foundation::error::{ForgeError, ForgeResult};
use crate::transcode::Transcoder;

/// Runs the system `ffmpeg` inside a private working directory.
///
/// File names are plain names inside that directory; anything with a path separator or a
/// parent reference is rejected.
pub struct FfmpegTranscoder {
    workdir: tempfile::TempDir,
    loaded: OnceCell<()>,
}

impl FfmpegTranscoder {
    pub fn new() -> ForgeResult<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("gifforge-ffmpeg-")
            .tempdir()
            .map_err(|e| ForgeError::pipeline(format!("create transcoder workdir: {e}")))?;
        Ok(Self {
            workdir,
            loaded: OnceCell::new(),
        })
    }

    /// `true` when `ffmpeg -version` runs.
    pub async fn is_available() -> bool {
        tokio::process::Command::new("ffmpeg")
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn path_for(&self, name: &str) -> ForgeResult<PathBuf> {
        let ok = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !ok {
            return Err(ForgeError::validation(format!(
                "transcoder file name '{name}' must be a plain file name"
            )));
        }
        Ok(self.workdir.path().join(name))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn load(&self) -> ForgeResult<()> {
        self.loaded
            .get_or_try_init(|| async {
                let out = tokio::process::Command::new("ffmpeg")
                    .arg("-version")
                    .output()
                    .await
                    .map_err(spawn_error)?;
                if !out.status.success() {
                    return Err(ForgeError::capability("'ffmpeg -version' failed"));
                }
                let banner = String::from_utf8_lossy(&out.stdout);
                tracing::info!(
                    version = banner.lines().next().unwrap_or_default(),
                    "transcoder loaded"
                );
                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn write_file(&self, name: &str, bytes: &[u8]) -> ForgeResult<()> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ForgeError::pipeline(format!("write '{name}': {e}")))
    }

    async fn exec(&self, argv: &[String]) -> ForgeResult<()> {
        tracing::debug!(argv = %argv.join(" "), "ffmpeg exec");
        let out = tokio::process::Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(argv)
            .current_dir(self.workdir.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(spawn_error)?;
        if !out.status.success() {
            return Err(ForgeError::pipeline(format!(
                "ffmpeg exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn read_file(&self, name: &str) -> ForgeResult<Vec<u8>> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| ForgeError::pipeline(format!("read '{name}': {e}")))
    }

    async fn delete_file(&self, name: &str) -> ForgeResult<()> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ForgeError::pipeline(format!("delete '{name}': {e}"))),
        }
    }
}

fn spawn_error(e: std::io::Error) -> ForgeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ForgeError::capability("'ffmpeg' was not found on PATH")
    } else {
        ForgeError::pipeline(format!("failed to run ffmpeg: {e}"))
    }
}
