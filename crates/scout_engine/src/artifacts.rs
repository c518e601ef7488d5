use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifacts directory missing or not writable: {0}")]
    Dir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("screenshot is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Ensure the artifacts directory exists and accepts new files.
pub fn ensure_artifact_dir(dir: &Path) -> Result<(), ArtifactError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| ArtifactError::Dir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(ArtifactError::Dir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| ArtifactError::Dir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| ArtifactError::Dir(e.to_string()))?;
    Ok(())
}

/// Per-row screenshots kept for later inspection, one subdirectory per job.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `{dir}/{job_id}/row-{row}-{label}.jpg` through a temp file and
    /// rename, replacing an earlier capture of the same name.
    pub fn write_screenshot(
        &self,
        job_id: &str,
        row: usize,
        label: &str,
        jpeg_base64: &str,
    ) -> Result<PathBuf, ArtifactError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(jpeg_base64.trim())?;
        let job_dir = self.dir.join(sanitize(job_id));
        ensure_artifact_dir(&job_dir)?;

        let target = job_dir.join(format!("row-{row}-{}.jpg", sanitize(label)));
        let mut tmp = NamedTempFile::new_in(&job_dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| ArtifactError::Io(e.error))?;
        Ok(target)
    }
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}
