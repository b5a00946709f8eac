use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::AudioExtractor;
use crate::process::{run_logged, ProcessOutput, ToolCommand};
use crate::Result;

/// Output template handed to the downloader, yields `<title>.<ext>`
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// yt-dlp / youtube-dl driven end to end: resolve, download, extract MP3
pub struct ExternalDownloader {
    tool: ToolCommand,
}

impl ExternalDownloader {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }

    fn base_args(locator: &str, output: &str) -> Vec<String> {
        [
            locator,
            "--no-playlist",
            "-f",
            "bestaudio",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "0",
            "-o",
            output,
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }

    /// Non-zero exit is fatal; stderr with a clean exit is only a warning
    fn check_output(&self, output: &ProcessOutput, action: &str) -> Result<()> {
        if !output.success() {
            anyhow::bail!(
                "{} {} failed with {}: {}",
                self.tool.program,
                action,
                output.status,
                output.stderr_tail(3)
            );
        }

        if !output.stderr.is_empty() {
            tracing::warn!(
                "{} reported {} stderr line(s) during {}",
                self.tool.program,
                output.stderr.len(),
                action
            );
        }

        Ok(())
    }
}

/// Swap the extension of the name the tool reported for `mp3`
pub fn mp3_filename(reported: &str) -> Result<String> {
    let reported = reported.trim();
    let (stem, _ext) = reported
        .rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .with_context(|| format!("Downloader reported an unusable filename: {reported:?}"))?;

    Ok(format!("{stem}.mp3"))
}

#[async_trait]
impl AudioExtractor for ExternalDownloader {
    async fn output_filename(&self, locator: &str) -> Result<String> {
        let mut args = Self::base_args(locator, OUTPUT_TEMPLATE);
        args.push("--get-filename".to_string());

        let output = run_logged(&self.tool, &args, "DOWNLOADER").await?;
        self.check_output(&output, "filename lookup")?;

        let reported: String = output.stdout.iter().map(|line| line.trim()).collect();
        let filename = mp3_filename(&reported)?;
        tracing::info!("MP3 file name: {}", filename);

        Ok(filename)
    }

    async fn extract_audio(&self, locator: &str, dir: &Path, filename: &str) -> Result<PathBuf> {
        let template = dir.join(OUTPUT_TEMPLATE);
        let args = Self::base_args(locator, &template.to_string_lossy());

        let output = run_logged(&self.tool, &args, "DOWNLOADER").await?;
        self.check_output(&output, "download")?;

        let mp3_path = dir.join(filename);
        let produced = tokio::fs::try_exists(&mp3_path)
            .await
            .with_context(|| format!("Failed to check for {}", mp3_path.display()))?;
        if !produced {
            anyhow::bail!("Downloader finished but {} was not produced", mp3_path.display());
        }

        Ok(mp3_path)
    }
}
