use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Private scratch directory for one pipeline run.
///
/// Created as `<root>/audio-relay-<uuid>` so concurrent runs never share files. Callers
/// finish with [`WorkDir::close`]; if the value is dropped instead (panic, cancelled
/// run) the directory is removed synchronously as a fallback. Nothing is removed when
/// the caller asked to keep it.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    keep: bool,
    closed: bool,
}

impl WorkDir {
    /// Create a fresh run directory under `root`, or under the system temp dir
    pub async fn create(root: Option<&Path>, keep: bool) -> Result<Self> {
        let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let path = root.join(format!("audio-relay-{}", Uuid::new_v4()));

        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create working directory {}", path.display()))?;

        tracing::debug!("Created working directory {}", path.display());

        Ok(Self {
            path,
            keep,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// Remove the directory without blocking the runtime
    pub async fn close(mut self) {
        self.closed = true;

        if self.keep {
            tracing::info!("Keeping working directory {}", self.path.display());
            return;
        }

        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            tracing::warn!("Failed to remove working directory {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        if self.keep {
            tracing::info!("Keeping working directory {}", self.path.display());
            return;
        }

        if let Err(e) = fs_err::remove_dir_all(&self.path) {
            tracing::warn!("Failed to remove working directory: {}", e);
        }
    }
}
