use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CaptureError, CaptureResult};

/// A recorded movie file
///
/// The path is fixed before the first frame is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Directory recordings are written to
///
/// There is no index; artifacts are found by listing the directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// `<documents>/VideoRecorder`, or `./recordings` without a home directory
    pub fn default_dir() -> PathBuf {
        dirs::document_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join("VideoRecorder"))
            .unwrap_or_else(|| PathBuf::from("recordings"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Allocate a fresh timestamp-named artifact
    pub async fn new_artifact(&self) -> CaptureResult<RecordingArtifact> {
        self.ensure_dir().await?;

        let created_at = Utc::now();
        let stem = artifact_stem(created_at);
        let mut path = self.dir.join(format!("{}.{}", stem, self.extension));

        // Two recordings within the same second
        let mut attempt = 1;
        while tokio::fs::try_exists(&path).await.unwrap_or(false) {
            path = self
                .dir
                .join(format!("{}_{:02}.{}", stem, attempt, self.extension));
            attempt += 1;
        }

        debug!("Allocated artifact {}", path.display());
        Ok(RecordingArtifact { path, created_at })
    }

    /// Artifact at a caller-chosen path; relative paths land in the store
    pub async fn artifact_at(&self, path: impl AsRef<Path>) -> CaptureResult<RecordingArtifact> {
        let path = path.as_ref();
        let path = if path.is_relative() {
            self.ensure_dir().await?;
            self.dir.join(path)
        } else {
            path.to_path_buf()
        };

        Ok(RecordingArtifact {
            path,
            created_at: Utc::now(),
        })
    }

    async fn ensure_dir(&self) -> CaptureResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CaptureError::io(&self.dir, e))
    }
}

/// ISO-8601 UTC, to the second
pub fn artifact_stem(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
