use anyhow::{Context, Result};
use aws_config::Region;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::ResolutionStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Object storage the MP3 files are published to
    pub storage: StorageConfig,

    /// Application settings
    pub app: AppConfig,

    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Stream download settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Per-stage timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// AWS region
    pub region: String,

    /// Bucket the MP3 files are uploaded to
    pub bucket: String,

    /// Optional key prefix
    pub key_prefix: Option<String>,

    /// Base URL used for returned links instead of the bucket's S3 URL
    pub public_base_url: Option<String>,

    /// Custom endpoint for S3-compatible stores (path-style addressing)
    pub endpoint_url: Option<String>,

    /// Upload objects with the public-read canned ACL
    #[serde(default)]
    pub public_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root for per-run working directories (system temp dir if not set)
    pub work_dir: Option<PathBuf>,

    /// Keep working directories after a run finishes
    pub keep_work_dir: bool,

    /// Strategy used when the command line does not pick one
    pub default_strategy: ResolutionStrategy,

    /// Maximum number of pipeline runs in flight
    pub max_concurrent_runs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// yt-dlp (or youtube-dl) executable
    pub downloader: String,

    /// Arguments placed before the generated ones, e.g. `["-m", "yt_dlp"]` with `python3`
    pub downloader_args: Vec<String>,

    /// ffmpeg executable
    pub ffmpeg: String,

    /// Fail the run when ffmpeg exits non-zero
    pub strict_exit_codes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Copy buffer size in bytes
    pub buffer_size: usize,

    /// Extra attempts after a failed download (0 disables retrying)
    pub retries: u32,

    /// First retry delay, doubled on every further attempt
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub resolve_secs: Option<u64>,
    pub extract_secs: Option<u64>,
    pub fetch_secs: Option<u64>,
    pub transcode_secs: Option<u64>,
    pub publish_secs: Option<u64>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader: "yt-dlp".to_string(),
            downloader_args: Vec::new(),
            ffmpeg: "ffmpeg".to_string(),
            strict_exit_codes: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            retries: 0,
            backoff_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn resolve(&self) -> Option<Duration> {
        self.resolve_secs.map(Duration::from_secs)
    }

    pub fn extract(&self) -> Option<Duration> {
        self.extract_secs.map(Duration::from_secs)
    }

    pub fn fetch(&self) -> Option<Duration> {
        self.fetch_secs.map(Duration::from_secs)
    }

    pub fn transcode(&self) -> Option<Duration> {
        self.transcode_secs.map(Duration::from_secs)
    }

    pub fn publish(&self) -> Option<Duration> {
        self.publish_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                region: "us-east-1".to_string(),
                bucket: "".to_string(),
                key_prefix: Some("audio-relay/".to_string()),
                public_base_url: None,
                endpoint_url: None,
                public_read: false,
            },
            app: AppConfig {
                work_dir: None,
                keep_work_dir: false,
                default_strategy: ResolutionStrategy::ExternalTool,
                max_concurrent_runs: 3,
            },
            tools: ToolsConfig::default(),
            fetch: FetchConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the given file, the default locations, or create a default one
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            Self::from_file(&config_path)
        } else if explicit.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        serde_yaml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to the given path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("audio-relay").join("config.yaml"))
    }

    /// Validate configuration before running the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.is_empty() {
            anyhow::bail!("Storage bucket must be configured");
        }

        if self.app.max_concurrent_runs == 0 {
            anyhow::bail!("app.max_concurrent_runs must be at least 1");
        }

        if self.fetch.buffer_size == 0 {
            anyhow::bail!("fetch.buffer_size must be greater than zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Region: {}", self.storage.region);
        println!("  Bucket: {}", self.storage.bucket);
        if let Some(prefix) = &self.storage.key_prefix {
            println!("  Key Prefix: {}", prefix);
        }
        if let Some(base) = &self.storage.public_base_url {
            println!("  Public Base URL: {}", base);
        }
        match &self.app.work_dir {
            Some(dir) => println!("  Work Dir: {}", dir.display()),
            None => println!("  Work Dir: (system temp)"),
        }
        println!("  Keep Work Dir: {}", self.app.keep_work_dir);
        println!("  Default Strategy: {}", self.app.default_strategy);
        println!("  Max Concurrent Runs: {}", self.app.max_concurrent_runs);
        println!("  Downloader: {}", self.tools.downloader);
        println!("  FFmpeg: {}", self.tools.ffmpeg);
    }

    /// Get AWS region
    pub fn aws_region(&self) -> Region {
        Region::new(self.storage.region.clone())
    }
}
