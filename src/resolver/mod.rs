use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod external;
pub mod ytdlp;

pub use external::ExternalDownloader;
pub use ytdlp::YtDlpResolver;

use crate::Result;

/// Container preferred when picking among candidate streams
pub const PREFERRED_FORMAT: &str = "mp4";

/// A concrete downloadable stream for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    /// Title of the source video
    pub title: String,

    /// Direct download URL
    pub url: String,

    /// Container/codec tag, e.g. "mp4" or "webm"
    pub format: String,
}

/// Everything the resolver library reports for one locator
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Canonical title of the video
    pub title: String,

    /// Candidate streams in resolver order
    pub candidates: Vec<ResolvedStream>,
}

/// Resolver library: turns a locator into raw candidate streams
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve candidate streams, or fail with the resolver's error message
    async fn resolve(&self, locator: &str) -> Result<Resolution>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// External tool that resolves, downloads and extracts MP3 in one go
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Learn the MP3 filename the tool will produce, without downloading
    async fn output_filename(&self, locator: &str) -> Result<String>;

    /// Download and extract audio into `dir`, returning the MP3 path
    async fn extract_audio(&self, locator: &str, dir: &Path, filename: &str) -> Result<PathBuf>;
}

/// Pick the stream to download: first "mp4" candidate, else the first one.
///
/// The list is never re-sorted, so the same list always gives the same pick.
pub fn select_candidate(candidates: &[ResolvedStream]) -> Option<&ResolvedStream> {
    candidates
        .iter()
        .find(|candidate| candidate.format == PREFERRED_FORMAT)
        .or_else(|| candidates.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(format: &str, url: &str) -> ResolvedStream {
        ResolvedStream {
            title: "Song".to_string(),
            url: url.to_string(),
            format: format.to_string(),
        }
    }

    #[test]
    fn prefers_mp4_regardless_of_position() {
        let candidates = vec![stream("webm", "https://a"), stream("mp4", "https://b")];
        let chosen = select_candidate(&candidates).unwrap();

        assert_eq!(chosen.format, "mp4");
        assert_eq!(chosen.url, "https://b");
    }

    #[test]
    fn falls_back_to_first_without_mp4() {
        let candidates = vec![stream("webm", "https://a"), stream("flv", "https://b")];
        let chosen = select_candidate(&candidates).unwrap();

        assert_eq!(chosen.format, "webm");
    }

    #[test]
    fn takes_first_of_several_mp4() {
        let candidates = vec![
            stream("flv", "https://a"),
            stream("mp4", "https://b"),
            stream("mp4", "https://c"),
        ];

        assert_eq!(select_candidate(&candidates).unwrap().url, "https://b");
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates = vec![
            stream("webm", "https://a"),
            stream("m4a", "https://b"),
            stream("mp4", "https://c"),
        ];

        assert_eq!(select_candidate(&candidates), select_candidate(&candidates));
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert!(select_candidate(&[]).is_none());
    }
}
