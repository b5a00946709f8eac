use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::FetchConfig;
use crate::utils::format_file_size;

/// Streams a resolved URL into a local file
pub struct StreamFetcher {
    client: Client,
    buffer_size: usize,
    retries: u32,
    backoff: Duration,
}

impl StreamFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            client: Client::new(),
            buffer_size: config.buffer_size.max(1),
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Download `url` to `dest`, retrying with exponential backoff if configured
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut delay = self.backoff;
        let mut attempt = 0;

        loop {
            match self.fetch_once(url, dest).await {
                Ok(written) => return Ok(written),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Download attempt {} of {} failed: {:#}; retrying in {:?}",
                        attempt,
                        self.retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> Result<u64> {
        tracing::info!("Downloading to [{}] from URL [{}]", dest.display(), url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to connect to stream URL")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download stream: HTTP {}", response.status());
        }

        let file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);

        // Declared after the writer so it is dropped first on every path
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read stream body")?;
            writer
                .write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            written += chunk.len() as u64;
        }

        drop(stream);
        writer
            .flush()
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;

        tracing::info!("Downloaded {} to {}", format_file_size(written), dest.display());

        Ok(written)
    }
}
