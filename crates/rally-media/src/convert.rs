//! Browser-compatible re-encoding of the annotated video.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Converts the raw annotated video into its final, web-playable form.
#[async_trait]
pub trait VideoConverter: Send + Sync {
    /// Convert `raw` into `output` and return the output path.
    async fn convert(&self, raw: &Path, output: &Path) -> MediaResult<PathBuf>;
}

/// H.264 + yuv420p + faststart via FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    crf: u8,
    preset: String,
    timeout: Option<Duration>,
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "veryfast".to_string(),
            timeout: None,
        }
    }
}

impl FfmpegConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The FFmpeg invocation used for `raw` -> `output`.
    pub fn command(&self, raw: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(raw, output)
            .video_codec("libx264")
            .preset(self.preset.clone())
            .crf(self.crf)
            .pixel_format("yuv420p")
            .faststart()
            .no_audio()
    }
}

#[async_trait]
impl VideoConverter for FfmpegConverter {
    async fn convert(&self, raw: &Path, output: &Path) -> MediaResult<PathBuf> {
        if !raw.exists() {
            return Err(MediaError::InvalidVideo(format!(
                "Raw video not found: {}",
                raw.display()
            )));
        }

        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }

        runner.run(&self.command(raw, output)).await?;

        let size = tokio::fs::metadata(output).await?.len();
        info!(output = %output.display(), size_bytes = size, "Converted annotated video");
        Ok(output.to_path_buf())
    }
}
