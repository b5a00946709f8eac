//! Audio Relay - turns a video link into a published MP3
//!
//! The crate resolves a downloadable stream for a video URL, fetches it, transcodes it to
//! MP3 with ffmpeg and uploads the result to object storage, returning a public link.
//! Two resolution strategies are available, see [`ResolutionStrategy`].

use std::fmt;
use std::time::Duration;

pub mod cli;
pub mod config;
pub mod fetcher;
pub mod pipeline;
pub mod process;
pub mod publisher;
pub mod resolver;
pub mod transcoder;
pub mod utils;
pub mod workdir;

#[cfg(test)]
pub(crate) mod test_support;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{Pipeline, PipelineParts, ResolutionStrategy};
pub use resolver::{ResolvedStream, Resolution, StreamResolver};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Fetch,
    Transcode,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Resolve => write!(f, "resolve"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Transcode => write!(f, "transcode"),
            Stage::Publish => write!(f, "publish"),
        }
    }
}

/// Failure of a single pipeline run. Every variant is fatal to the run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Stream resolution failed: {0}")]
    Resolution(String),

    #[error("Stream transfer failed: {0}")]
    Transfer(String),

    #[error("Transcoding failed: {0}")]
    Transcode(String),

    #[error("Publishing failed: {0}")]
    Publish(String),

    #[error("Stage {stage} timed out after {}s", after.as_secs_f64())]
    Timeout { stage: Stage, after: Duration },
}

impl PipelineError {
    /// Wrap a component error for the given stage, keeping the whole cause chain
    pub fn from_stage(stage: Stage, err: anyhow::Error) -> Self {
        let message = format!("{err:#}");
        match stage {
            Stage::Resolve => PipelineError::Resolution(message),
            Stage::Fetch => PipelineError::Transfer(message),
            Stage::Transcode => PipelineError::Transcode(message),
            Stage::Publish => PipelineError::Publish(message),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Resolution(_) => Stage::Resolve,
            PipelineError::Transfer(_) => Stage::Fetch,
            PipelineError::Transcode(_) => Stage::Transcode,
            PipelineError::Publish(_) => Stage::Publish,
            PipelineError::Timeout { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_keep_cause_chain() {
        let err = anyhow::anyhow!("connection reset").context("Failed to read stream body");
        let err = PipelineError::from_stage(Stage::Fetch, err);

        assert_eq!(err.stage(), Stage::Fetch);
        assert_eq!(
            err.to_string(),
            "Stream transfer failed: Failed to read stream body: connection reset"
        );
    }

    #[test]
    fn timeout_reports_its_stage() {
        let err = PipelineError::Timeout {
            stage: Stage::Transcode,
            after: Duration::from_secs(30),
        };
        assert_eq!(err.stage(), Stage::Transcode);
        assert_eq!(err.to_string(), "Stage transcode timed out after 30s");
    }
}
