//! Scratch-space layout for uploads and conversion results.
//!
//! Every request gets its own directory, named by a UUID, under both the
//! upload folder and the output folder.

use std::io;
use std::path::PathBuf;

use uuid::Uuid;

use crate::types::{ConvertedFile, UploadedFile};

const FALLBACK_FILENAME: &str = "upload";

#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl Storage {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await
    }

    /// Allocates the scratch directories for one request. Nothing is created
    /// on disk until the first file is saved.
    pub fn job(&self) -> JobFiles {
        let id = Uuid::new_v4();
        let name = id.to_string();
        JobFiles {
            id,
            upload_dir: self.upload_dir.join(&name),
            output_dir: self.output_dir.join(&name),
        }
    }
}

#[derive(Debug)]
pub struct JobFiles {
    id: Uuid,
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl JobFiles {
    /// Writes an upload as `<index>_<filename>` so repeated names in one
    /// request do not collide.
    pub async fn save_upload(&self, index: usize, file: &UploadedFile) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(format!("{index}_{}", file.filename));
        tokio::fs::write(&path, &file.content).await?;
        log::debug!("job {}: saved upload {} ({} bytes)", self.id, path.display(), file.content.len());
        Ok(())
    }

    pub async fn save_output(&self, file: &ConvertedFile) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&file.name);
        tokio::fs::write(&path, &file.content).await?;
        log::debug!("job {}: saved output {} ({} bytes)", self.id, path.display(), file.content.len());
        Ok(())
    }

    pub async fn cleanup(&self) {
        for dir in [&self.upload_dir, &self.output_dir] {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("job {}: failed to remove {}: {}", self.id, dir.display(), e),
            }
        }
    }
}

/// Reduces a client-supplied filename to a safe final path component.
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}
