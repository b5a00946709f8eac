use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{ResolvedStream, Resolution, StreamResolver};
use crate::process::{run_logged, ToolCommand};
use crate::Result;

/// Resolver backed by `yt-dlp --dump-json`, returning direct stream URLs
pub struct YtDlpResolver {
    tool: ToolCommand,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    protocol: Option<String>,
}

impl YtDlpResolver {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }

    /// Turn the tool's JSON into a resolution, best formats first
    fn parse_video_info(json: &str) -> Result<Resolution> {
        let info: VideoInfo = serde_json::from_str(json).context("Failed to parse yt-dlp output")?;
        let title = info.title.unwrap_or_else(|| "audio".to_string());

        // yt-dlp lists formats worst to best
        let candidates = info
            .formats
            .into_iter()
            .rev()
            .filter(|format| format.acodec.as_deref() != Some("none"))
            .filter(|format| {
                format
                    .protocol
                    .as_deref()
                    .map_or(true, |protocol| protocol == "http" || protocol == "https")
            })
            .filter_map(|format| {
                let url = format.url?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return None;
                }
                Some(ResolvedStream {
                    title: title.clone(),
                    url,
                    format: format.ext.unwrap_or_else(|| "bin".to_string()),
                })
            })
            .collect();

        Ok(Resolution { title, candidates })
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, locator: &str) -> Result<Resolution> {
        tracing::debug!("Extracting video info for: {}", locator);

        let args = vec!["--dump-json".to_string(), "--no-playlist".to_string(), locator.to_string()];
        let output = run_logged(&self.tool, &args, "yt-dlp")
            .await
            .context("Unable to get video download link")?;

        if !output.success() {
            anyhow::bail!("Unable to get video download link: {}", output.stderr_tail(3));
        }

        Self::parse_video_info(&output.stdout.join("\n"))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
