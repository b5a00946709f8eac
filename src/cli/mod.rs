use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::ResolutionStrategy;

#[derive(Parser)]
#[command(
    name = "audio-relay",
    about = "Audio Relay - turn video links into published MP3 files",
    version,
    long_about = "Resolves a downloadable stream for a video URL, converts it to MP3 with yt-dlp or ffmpeg, uploads the result to S3 and prints a public link."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, env = "AUDIO_RELAY_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert one or more video URLs and print the published links
    Convert {
        /// Video URLs to convert
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,

        /// How to obtain the audio (defaults to app.default_strategy)
        #[arg(short, long, value_enum)]
        strategy: Option<ResolutionStrategy>,

        /// Keep the per-run working directories
        #[arg(long)]
        keep_work_dir: bool,
    },

    /// Show or locate the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that the external tools can be started
    Check,
}
