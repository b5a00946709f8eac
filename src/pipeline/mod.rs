use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::fetcher::StreamFetcher;
use crate::process::ToolCommand;
use crate::publisher::{ObjectStore, Publisher, S3Store};
use crate::resolver::{select_candidate, AudioExtractor, ExternalDownloader, StreamResolver, YtDlpResolver};
use crate::transcoder::{FfmpegTranscoder, MediaTranscoder};
use crate::utils::{sanitize_filename, validate_url};
use crate::workdir::WorkDir;
use crate::{PipelineError, Stage};

/// How a locator is turned into a local MP3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// The downloader resolves, downloads and extracts MP3 itself
    ExternalTool,
    /// Resolve direct stream URLs, download them and transcode with ffmpeg
    DirectLink,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStrategy::ExternalTool => write!(f, "external-tool"),
            ResolutionStrategy::DirectLink => write!(f, "direct-link"),
        }
    }
}

/// Collaborators the pipeline drives
pub struct PipelineParts {
    pub resolver: Arc<dyn StreamResolver>,
    pub extractor: Arc<dyn AudioExtractor>,
    pub transcoder: Arc<dyn MediaTranscoder>,
    pub store: Arc<dyn ObjectStore>,
}

/// Locator in, public MP3 link out
pub struct Pipeline {
    config: Config,
    resolver: Arc<dyn StreamResolver>,
    extractor: Arc<dyn AudioExtractor>,
    transcoder: Arc<dyn MediaTranscoder>,
    fetcher: StreamFetcher,
    publisher: Publisher,
    permits: Semaphore,
}

impl Pipeline {
    /// Create a pipeline backed by yt-dlp, ffmpeg and S3
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let downloader = ToolCommand::with_args(
            config.tools.downloader.clone(),
            config.tools.downloader_args.clone(),
        );
        let ffmpeg = ToolCommand::new(config.tools.ffmpeg.clone());

        let parts = PipelineParts {
            resolver: Arc::new(YtDlpResolver::new(downloader.clone())),
            extractor: Arc::new(ExternalDownloader::new(downloader)),
            transcoder: Arc::new(FfmpegTranscoder::new(ffmpeg, config.tools.strict_exit_codes)),
            store: Arc::new(S3Store::new(&config).await),
        };

        Ok(Self::from_parts(config, parts))
    }

    pub fn from_parts(config: Config, parts: PipelineParts) -> Self {
        let permits = Semaphore::new(config.app.max_concurrent_runs.max(1));

        Self {
            fetcher: StreamFetcher::new(&config.fetch),
            publisher: Publisher::new(parts.store, config.storage.key_prefix.clone()),
            resolver: parts.resolver,
            extractor: parts.extractor,
            transcoder: parts.transcoder,
            permits,
            config,
        }
    }

    /// Let the external downloader produce the MP3, then publish it
    pub async fn link_from_video(&self, locator: &str) -> Result<String, PipelineError> {
        self.run(locator, ResolutionStrategy::ExternalTool).await
    }

    /// Resolve a direct stream, download and transcode it, then publish the MP3
    pub async fn mp3_link_from_video(&self, locator: &str) -> Result<String, PipelineError> {
        self.run(locator, ResolutionStrategy::DirectLink).await
    }

    /// Run the whole pipeline for one locator.
    ///
    /// Waits for a free slot when `max_concurrent_runs` runs are already in flight. The
    /// run's working directory is removed when this returns, whatever the outcome.
    pub async fn run(&self, locator: &str, strategy: ResolutionStrategy) -> Result<String, PipelineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::Resolution("Pipeline is shutting down".to_string()))?;

        let started = Instant::now();
        tracing::info!("Starting {} run for {}", strategy, locator);

        let result = self.run_with_work_dir(locator, strategy).await;

        match &result {
            Ok(link) => tracing::info!(
                "Published {} in {:.1}s: {}",
                locator,
                started.elapsed().as_secs_f64(),
                link
            ),
            Err(e) => tracing::error!("Run for {} failed at {}: {}", locator, e.stage(), e),
        }

        result
    }

    async fn run_with_work_dir(&self, locator: &str, strategy: ResolutionStrategy) -> Result<String, PipelineError> {
        validate_url(locator).map_err(|e| PipelineError::from_stage(Stage::Resolve, e))?;

        let work_dir = WorkDir::create(self.config.app.work_dir.as_deref(), self.config.app.keep_work_dir)
            .await
            .map_err(|e| PipelineError::from_stage(Stage::Fetch, e))?;

        let result = match strategy {
            ResolutionStrategy::ExternalTool => self.external_tool_run(locator, &work_dir).await,
            ResolutionStrategy::DirectLink => self.direct_link_run(locator, &work_dir).await,
        };

        work_dir.close().await;
        result
    }

    async fn external_tool_run(&self, locator: &str, work_dir: &WorkDir) -> Result<String, PipelineError> {
        let timeouts = &self.config.timeouts;

        let filename = run_stage(
            Stage::Resolve,
            timeouts.resolve(),
            self.extractor.output_filename(locator),
        )
        .await?;

        let mp3_path = run_stage(
            Stage::Resolve,
            timeouts.extract(),
            self.extractor.extract_audio(locator, work_dir.path(), &filename),
        )
        .await?;

        run_stage(
            Stage::Publish,
            timeouts.publish(),
            self.publisher.publish(&mp3_path, &filename),
        )
        .await
    }

    async fn direct_link_run(&self, locator: &str, work_dir: &WorkDir) -> Result<String, PipelineError> {
        let timeouts = &self.config.timeouts;

        tracing::info!("Resolving {} with {}", locator, self.resolver.name());
        let resolution = run_stage(Stage::Resolve, timeouts.resolve(), self.resolver.resolve(locator)).await?;

        let stream = select_candidate(&resolution.candidates).ok_or_else(|| {
            PipelineError::Resolution(format!("No downloadable streams found for {}", locator))
        })?;
        tracing::debug!("Selected {} stream {}", stream.format, stream.url);

        let title = sanitize_filename(&resolution.title);
        let format = sanitize_filename(&stream.format);
        // Never let ffmpeg read and write the same path
        let source_name = if format == "mp3" {
            format!("{}.source.mp3", title)
        } else {
            format!("{}.{}", title, format)
        };
        let source_path = work_dir.join(&source_name);

        run_stage(
            Stage::Fetch,
            timeouts.fetch(),
            self.fetcher.fetch(&stream.url, &source_path),
        )
        .await?;

        let mp3_name = format!("{}.mp3", title);
        let mp3_path = work_dir.join(&mp3_name);

        run_stage(
            Stage::Transcode,
            timeouts.transcode(),
            self.transcoder.transcode(&source_path, &mp3_path),
        )
        .await?;

        run_stage(
            Stage::Publish,
            timeouts.publish(),
            self.publisher.publish(&mp3_path, &mp3_name),
        )
        .await
    }
}

/// Await one stage, mapping its error and enforcing its timeout.
///
/// A timed-out future is dropped, which kills any child process it spawned.
async fn run_stage<T, F>(stage: Stage, limit: Option<Duration>, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tracing::debug!("Entering stage {}", stage);

    let outcome = match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| PipelineError::Timeout { stage, after })?,
        None => fut.await,
    };

    outcome.map_err(|e| PipelineError::from_stage(stage, e))
}
