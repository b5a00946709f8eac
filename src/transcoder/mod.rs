use async_trait::async_trait;
use std::path::Path;

use crate::process::{run_logged, ToolCommand};
use crate::Result;

/// Converts a local media file into an MP3 file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// ffmpeg subprocess, libmp3lame at VBR quality 0, audio stream only
pub struct FfmpegTranscoder {
    tool: ToolCommand,
    strict_exit_codes: bool,
}

impl FfmpegTranscoder {
    pub fn new(tool: ToolCommand, strict_exit_codes: bool) -> Self {
        Self {
            tool,
            strict_exit_codes,
        }
    }

    fn args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-q:a".to_string(),
            "0".to_string(),
            "-map".to_string(),
            "a".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        tracing::debug!("Converting {} to MP3", input.display());

        // Both streams are logged under one label, ffmpeg writes its progress to stderr
        let result = run_logged(&self.tool, &Self::args(input, output), "FFMPEG").await?;

        if !result.success() {
            if self.strict_exit_codes {
                anyhow::bail!("ffmpeg exited with {}: {}", result.status, result.stderr_tail(3));
            }
            tracing::warn!("ffmpeg exited with {}, continuing with {}", result.status, output.display());
        }

        Ok(())
    }
}
